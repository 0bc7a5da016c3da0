use clap::{Args, Subcommand};
use serde_json::Value;
use std::io::{self, Write};

use super::OutputFormat;
use coursedeck::config::Config;
use coursedeck::db::DraftRepository;
use coursedeck::models::{Body, SectionType};
use coursedeck::sync::{HttpSectionStore, LessonEditor, SectionRef};

#[derive(Args)]
pub struct SectionCommand {
    #[command(subcommand)]
    pub command: SectionSubcommand,
}

#[derive(Subcommand)]
pub enum SectionSubcommand {
    /// Fetch a lesson's sections from the server into a local draft
    Pull {
        /// Lesson ID
        lesson: String,

        /// Discard unsaved local edits
        #[arg(long, short)]
        force: bool,
    },

    /// List the sections of a draft
    List {
        /// Lesson ID
        lesson: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a section's details
    Show {
        /// Lesson ID
        lesson: String,

        /// Section ID, or position written as #N
        section: SectionRef,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a new section to a draft
    Add {
        /// Lesson ID
        lesson: String,

        /// Section type (text, video, audio, image, quiz, exercise)
        #[arg(long = "type", value_name = "TYPE")]
        section_type: SectionType,

        /// Text body, media URL, or intro text
        #[arg(long)]
        content: Option<String>,

        /// Attributes as a JSON object
        #[arg(long, value_name = "JSON")]
        body: Option<String>,

        /// Set one attribute (can be repeated)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Insert at this position (1-based, defaults to the end)
        #[arg(long)]
        position: Option<usize>,
    },

    /// Edit a section in a draft
    Edit {
        /// Lesson ID
        lesson: String,

        /// Section ID, or position written as #N
        section: SectionRef,

        /// New content
        #[arg(long)]
        content: Option<String>,

        /// Replace all attributes with this JSON object
        #[arg(long, value_name = "JSON")]
        body: Option<String>,

        /// Set one attribute (can be repeated)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Change the section type
        #[arg(long = "type", value_name = "TYPE")]
        section_type: Option<SectionType>,
    },

    /// Move a section to a new position
    Move {
        /// Lesson ID
        lesson: String,

        /// Section ID, or position written as #N
        section: SectionRef,

        /// Target position (1-based)
        #[arg(long)]
        to: usize,
    },

    /// Remove a section from a draft
    Remove {
        /// Lesson ID
        lesson: String,

        /// Section ID, or position written as #N
        section: SectionRef,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Show what saving would send to the server
    Status {
        /// Lesson ID
        lesson: String,
    },

    /// Push a draft's changes to the server
    Save {
        /// Lesson ID
        lesson: String,
    },

    /// Drop unsaved edits from a draft
    Discard {
        /// Lesson ID
        lesson: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// List local drafts
    Drafts {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl SectionCommand {
    pub async fn run(
        &self,
        repo: &DraftRepository,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            SectionSubcommand::Pull { lesson, force } => {
                if let Some(existing) = repo.load(lesson).await? {
                    if existing.is_dirty() && !force {
                        return Err(format!(
                            "Lesson {} has unsaved edits. Save them first or use --force to discard them.",
                            lesson
                        )
                        .into());
                    }
                }

                let store = HttpSectionStore::from_config(&config.api)?;
                let editor = LessonEditor::load(&store, lesson).await?;

                repo.delete(lesson).await?;
                repo.save(&editor).await?;
                println!(
                    "Pulled {} section(s) for lesson {}",
                    editor.sections().len(),
                    lesson
                );
                Ok(())
            }

            SectionSubcommand::List { lesson, format } => {
                let editor = load_draft(repo, lesson).await?;
                let sections = editor.sections();

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(sections)?);
                    }
                    OutputFormat::Text => {
                        if sections.is_empty() {
                            println!("No sections in lesson {}", lesson);
                            return Ok(());
                        }

                        println!("{:<4}  {:<36}  {:<9}  SUMMARY", "#", "ID", "TYPE");
                        println!("{}", "-".repeat(100));
                        for (index, section) in sections.iter().enumerate() {
                            println!(
                                "{:<4}  {:<36}  {:<9}  {}",
                                index + 1,
                                section.id.to_string(),
                                section.section_type.to_string(),
                                section.summary()
                            );
                        }
                        println!("\nTotal: {} section(s)", sections.len());
                        if editor.is_dirty() {
                            println!("Unsaved changes. Run 'section status {}' to review.", lesson);
                        }
                    }
                }
                Ok(())
            }

            SectionSubcommand::Show {
                lesson,
                section,
                format,
            } => {
                let editor = load_draft(repo, lesson).await?;
                let id = editor.resolve(section)?;
                let section = editor
                    .get(&id)
                    .ok_or_else(|| format!("Section not found: {}", id))?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(section)?);
                    }
                    OutputFormat::Text => {
                        print!("{}", section);
                    }
                }
                Ok(())
            }

            SectionSubcommand::Add {
                lesson,
                section_type,
                content,
                body,
                set,
                position,
            } => {
                let mut editor = load_draft(repo, lesson).await?;
                let body = build_body(Body::new(), body.as_deref(), set)?;

                let id = editor.add(
                    *section_type,
                    content.clone().unwrap_or_default(),
                    body,
                    *position,
                )?;
                repo.save(&editor).await?;

                if let Some(section) = editor.get(&id) {
                    println!("Added section:");
                    print!("{}", section);
                }
                Ok(())
            }

            SectionSubcommand::Edit {
                lesson,
                section,
                content,
                body,
                set,
                section_type,
            } => {
                let has_updates = content.is_some()
                    || body.is_some()
                    || !set.is_empty()
                    || section_type.is_some();

                if !has_updates {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let mut editor = load_draft(repo, lesson).await?;
                let id = editor.resolve(section)?;

                if let Some(section_type) = section_type {
                    editor.set_type(&id, *section_type)?;
                }

                let new_body = if body.is_some() || !set.is_empty() {
                    let base = editor.get(&id).map(|s| s.body.clone()).unwrap_or_default();
                    Some(build_body(base, body.as_deref(), set)?)
                } else {
                    None
                };
                editor.edit(&id, content.clone(), new_body)?;
                repo.save(&editor).await?;

                if let Some(section) = editor.get(&id) {
                    println!("Updated section:");
                    print!("{}", section);
                }
                Ok(())
            }

            SectionSubcommand::Move {
                lesson,
                section,
                to,
            } => {
                let mut editor = load_draft(repo, lesson).await?;
                let id = editor.resolve(section)?;
                editor.move_to(&id, *to)?;
                repo.save(&editor).await?;

                println!("Moved section {} to #{}", id, to);
                Ok(())
            }

            SectionSubcommand::Remove {
                lesson,
                section,
                force,
            } => {
                let mut editor = load_draft(repo, lesson).await?;
                let id = editor.resolve(section)?;

                if !force && !confirm(&format!("Remove section {}?", id))? {
                    println!("Removal cancelled.");
                    return Ok(());
                }

                let removed = editor.remove(&id)?;
                repo.save(&editor).await?;
                println!(
                    "Removed {} section: {}",
                    removed.section_type,
                    removed.summary()
                );
                Ok(())
            }

            SectionSubcommand::Status { lesson } => {
                let editor = load_draft(repo, lesson).await?;
                let plan = editor.plan()?;
                print!("{}", plan);
                Ok(())
            }

            SectionSubcommand::Save { lesson } => {
                let mut editor = load_draft(repo, lesson).await?;
                let plan = editor.plan()?;
                if plan.is_empty() {
                    // Positions already match the server, drop stale order fields
                    editor.normalize();
                    repo.save(&editor).await?;
                    println!("Nothing to save for lesson {}", lesson);
                    return Ok(());
                }

                let store = HttpSectionStore::from_config(&config.api)?;
                let result = editor.save(&store).await.map(|sections| sections.len());

                // Keep whatever the server confirmed, even on failure
                repo.save(&editor).await?;

                match result {
                    Ok(count) => {
                        println!(
                            "Saved {} operation(s). Lesson {} has {} section(s).",
                            plan.operation_count(),
                            lesson,
                            count
                        );
                        Ok(())
                    }
                    Err(e) => {
                        if e.applied().is_some() {
                            eprintln!(
                                "Draft kept. Run 'section save {}' again to send the remaining changes.",
                                lesson
                            );
                        }
                        Err(e.into())
                    }
                }
            }

            SectionSubcommand::Discard { lesson, force } => {
                let mut editor = load_draft(repo, lesson).await?;
                if !editor.is_dirty() {
                    println!("No unsaved edits for lesson {}", lesson);
                    return Ok(());
                }

                if !force && !confirm(&format!("Discard unsaved edits for lesson {}?", lesson))? {
                    println!("Discard cancelled.");
                    return Ok(());
                }

                editor.revert();
                repo.save(&editor).await?;
                println!("Discarded unsaved edits for lesson {}", lesson);
                Ok(())
            }

            SectionSubcommand::Drafts { format } => {
                let drafts = repo.list().await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&drafts)?);
                    }
                    OutputFormat::Text => {
                        if drafts.is_empty() {
                            println!("No drafts found");
                            return Ok(());
                        }

                        println!(
                            "{:<36}  {:<8}  {:<7}  UPDATED",
                            "LESSON", "SECTIONS", "PENDING"
                        );
                        println!("{}", "-".repeat(80));
                        for draft in &drafts {
                            println!(
                                "{:<36}  {:<8}  {:<7}  {}",
                                draft.lesson_id,
                                draft.section_count,
                                draft.pending_operations,
                                draft.updated_at.format("%Y-%m-%d %H:%M")
                            );
                        }
                        println!("\nTotal: {} draft(s)", drafts.len());
                    }
                }
                Ok(())
            }
        }
    }
}

async fn load_draft(
    repo: &DraftRepository,
    lesson: &str,
) -> Result<LessonEditor, Box<dyn std::error::Error>> {
    repo.load(lesson).await?.ok_or_else(|| {
        format!(
            "No draft for lesson {}. Run 'section pull {}' first.",
            lesson, lesson
        )
        .into()
    })
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Merge `--body` and `--set` flags onto `base`.
///
/// `--body` replaces the attributes wholesale; `--set` entries are applied
/// afterwards in order.
fn build_body(base: Body, json: Option<&str>, sets: &[String]) -> Result<Body, String> {
    let mut body = match json {
        Some(json) => match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err("--body must be a JSON object".to_string()),
            Err(e) => return Err(format!("Invalid --body JSON: {}", e)),
        },
        None => base,
    };

    for assignment in sets {
        let (key, value) = parse_assignment(assignment)?;
        body.insert(key, value);
    }
    Ok(body)
}

/// Parse `key=value`. The value is read as JSON when it parses, otherwise
/// kept as a string, so `duration=90` is a number and `alt=A cat` a string.
fn parse_assignment(assignment: &str) -> Result<(String, Value), String> {
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| format!("Invalid --set '{}'. Use KEY=VALUE", assignment))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Invalid --set '{}': empty key", assignment));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

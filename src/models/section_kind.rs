//! Typed view over a section's `content` and open `body` attributes.
//!
//! Sections are stored and transferred generically, but every section type
//! has its own required fields. `SectionKind::parse` checks them with one
//! exhaustive match so adding a type forces a validation rule for it.

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::section_type::SectionType;

/// Open attribute bag attached to a section
pub type Body = Map<String, Value>;

const SUMMARY_WIDTH: usize = 48;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} section content cannot be empty")]
    EmptyContent(SectionType),

    #[error("Invalid URL in {field}: '{value}' (expected an absolute http or https URL)")]
    InvalidUrl { field: &'static str, value: String },

    #[error("Invalid media source: '{0}' (expected an http(s) URL, a /path or embed markup)")]
    InvalidMediaSource(String),

    #[error("{section_type} section requires '{field}'")]
    MissingField {
        section_type: SectionType,
        field: &'static str,
    },

    #[error("Malformed {section_type} body: {reason}")]
    MalformedBody {
        section_type: SectionType,
        reason: String,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
    #[default]
    Markdown,
    Html,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExerciseQuestion {
    pub prompt: String,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub answer: Option<Value>,
}

/// Where a video or audio section's media comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    /// Absolute http(s) URL
    Url(Url),
    /// Path on the course server, e.g. `/media/intro.mp4`
    Path(String),
    /// Player markup, e.g. an `<iframe>` snippet
    Embed(String),
}

impl MediaSource {
    pub fn parse(content: &str) -> Result<Self, ValidationError> {
        let value = content.trim();
        if value.starts_with('<') && value.ends_with('>') {
            return Ok(MediaSource::Embed(value.to_string()));
        }
        if value.starts_with('/') && !value.starts_with("//") {
            return Ok(MediaSource::Path(value.to_string()));
        }
        match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(MediaSource::Url(url)),
            _ => Err(ValidationError::InvalidMediaSource(value.to_string())),
        }
    }

    fn summary(&self) -> String {
        match self {
            MediaSource::Url(url) => truncate(url.as_str(), SUMMARY_WIDTH),
            MediaSource::Path(path) => truncate(path, SUMMARY_WIDTH),
            MediaSource::Embed(_) => "(embed)".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionKind {
    Text {
        text: String,
        format: TextFormat,
    },
    Video {
        source: MediaSource,
        captions: Option<Url>,
        transcript: Option<String>,
        duration: Option<u32>,
    },
    Audio {
        source: MediaSource,
        transcript: Option<String>,
        duration: Option<u32>,
    },
    Image {
        url: Url,
        alt: Option<String>,
        caption: Option<String>,
    },
    Quiz {
        quiz_id: String,
        intro: Option<String>,
    },
    Exercise {
        instructions: Option<String>,
        questions: Vec<ExerciseQuestion>,
    },
}

// Attribute shapes per type. Unknown keys stay in the body untouched.

#[derive(Deserialize, Default)]
#[serde(default)]
struct TextAttrs {
    format: TextFormat,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MediaAttrs {
    captions: Option<String>,
    transcript: Option<String>,
    duration: Option<u32>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ImageAttrs {
    alt: Option<String>,
    caption: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct QuizAttrs {
    quiz_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ExerciseAttrs {
    questions: Option<Vec<ExerciseQuestion>>,
}

impl SectionKind {
    /// Validate `content` and `body` for the given section type.
    pub fn parse(
        section_type: SectionType,
        content: &str,
        body: &Body,
    ) -> Result<Self, ValidationError> {
        match section_type {
            SectionType::Text => {
                let text = non_empty(content).ok_or(ValidationError::EmptyContent(section_type))?;
                let attrs: TextAttrs = attrs(section_type, body)?;
                Ok(SectionKind::Text {
                    text,
                    format: attrs.format,
                })
            }
            SectionType::Video => {
                let source = media_source(section_type, content)?;
                let attrs: MediaAttrs = attrs(section_type, body)?;
                let captions = match non_empty_opt(attrs.captions) {
                    Some(value) => Some(parse_url("captions", &value)?),
                    None => None,
                };
                Ok(SectionKind::Video {
                    source,
                    captions,
                    transcript: non_empty_opt(attrs.transcript),
                    duration: check_duration(attrs.duration)?,
                })
            }
            SectionType::Audio => {
                let source = media_source(section_type, content)?;
                let attrs: MediaAttrs = attrs(section_type, body)?;
                Ok(SectionKind::Audio {
                    source,
                    transcript: non_empty_opt(attrs.transcript),
                    duration: check_duration(attrs.duration)?,
                })
            }
            SectionType::Image => {
                let value = non_empty(content).ok_or(ValidationError::EmptyContent(section_type))?;
                let url = parse_url("content", &value)?;
                let attrs: ImageAttrs = attrs(section_type, body)?;
                Ok(SectionKind::Image {
                    url,
                    alt: non_empty_opt(attrs.alt),
                    caption: non_empty_opt(attrs.caption),
                })
            }
            SectionType::Quiz => {
                let attrs: QuizAttrs = attrs(section_type, body)?;
                let quiz_id =
                    non_empty_opt(attrs.quiz_id).ok_or(ValidationError::MissingField {
                        section_type,
                        field: "quizId",
                    })?;
                Ok(SectionKind::Quiz {
                    quiz_id,
                    intro: non_empty(content),
                })
            }
            SectionType::Exercise => {
                let attrs: ExerciseAttrs = attrs(section_type, body)?;
                let questions = attrs
                    .questions
                    .filter(|q| !q.is_empty())
                    .ok_or(ValidationError::MissingField {
                        section_type,
                        field: "questions",
                    })?;
                if let Some(index) = questions.iter().position(|q| q.prompt.trim().is_empty()) {
                    return Err(ValidationError::InvalidValue {
                        field: "questions",
                        reason: format!("question {} has an empty prompt", index + 1),
                    });
                }
                Ok(SectionKind::Exercise {
                    instructions: non_empty(content),
                    questions,
                })
            }
        }
    }

    pub fn section_type(&self) -> SectionType {
        match self {
            SectionKind::Text { .. } => SectionType::Text,
            SectionKind::Video { .. } => SectionType::Video,
            SectionKind::Audio { .. } => SectionType::Audio,
            SectionKind::Image { .. } => SectionType::Image,
            SectionKind::Quiz { .. } => SectionType::Quiz,
            SectionKind::Exercise { .. } => SectionType::Exercise,
        }
    }

    /// One-line description used in listings.
    pub fn summary(&self) -> String {
        match self {
            SectionKind::Text { text, .. } => {
                let first_line = text.lines().next().unwrap_or_default();
                truncate(first_line, SUMMARY_WIDTH)
            }
            SectionKind::Video {
                source,
                captions,
                duration,
                ..
            } => {
                let mut s = source.summary();
                if let Some(secs) = duration {
                    s.push_str(&format!(" ({})", format_duration(*secs)));
                }
                if captions.is_some() {
                    s.push_str(" [cc]");
                }
                s
            }
            SectionKind::Audio {
                source, duration, ..
            } => match duration {
                Some(secs) => format!("{} ({})", source.summary(), format_duration(*secs)),
                None => source.summary(),
            },
            SectionKind::Image { url, alt, .. } => match alt {
                Some(alt) => truncate(alt, SUMMARY_WIDTH),
                None => truncate(url.as_str(), SUMMARY_WIDTH),
            },
            SectionKind::Quiz { quiz_id, .. } => format!("quiz {}", quiz_id),
            SectionKind::Exercise { questions, .. } => {
                format!("{} question(s)", questions.len())
            }
        }
    }
}

fn attrs<T: DeserializeOwned>(section_type: SectionType, body: &Body) -> Result<T, ValidationError> {
    serde_json::from_value(Value::Object(body.clone())).map_err(|e| {
        ValidationError::MalformedBody {
            section_type,
            reason: e.to_string(),
        }
    })
}

fn media_source(section_type: SectionType, content: &str) -> Result<MediaSource, ValidationError> {
    let value = non_empty(content).ok_or(ValidationError::EmptyContent(section_type))?;
    MediaSource::parse(&value)
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ValidationError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        _ => Err(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}

fn check_duration(duration: Option<u32>) -> Result<Option<u32>, ValidationError> {
    match duration {
        Some(0) => Err(ValidationError::InvalidValue {
            field: "duration",
            reason: "must be a positive number of seconds".to_string(),
        }),
        other => Ok(other),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn non_empty_opt(s: Option<String>) -> Option<String> {
    s.as_deref().and_then(non_empty)
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

fn format_duration(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

//! Diff between the last known server state of a lesson and the local edits.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::error::ReconcileError;
use super::store::{NewSection, SectionPatch};
use crate::models::{Section, SectionId};

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    pub id: String,
    pub patch: SectionPatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCreate {
    /// Id the section carries locally: a temporary id, or the old server id
    /// when the section's type changed.
    pub local_id: SectionId,
    pub section: NewSection,
}

/// Where each position of the edited list comes from once the plan ran.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    Existing(String),
    Created(SectionId),
}

/// Operations needed to turn `initial` into `current` for one lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan {
    pub lesson_id: String,
    pub deletes: Vec<String>,
    pub updates: Vec<PlannedUpdate>,
    pub creates: Vec<PlannedCreate>,
    pub unchanged: usize,
    pub(crate) slots: Vec<Slot>,
}

impl SyncPlan {
    /// Classify every section of `current` against `initial`.
    ///
    /// Positions in `current` are authoritative: the section at index `i`
    /// is planned for order `i + 1` whatever its `order` field says.
    pub fn compute(
        lesson_id: &str,
        initial: &[Section],
        current: &[Section],
    ) -> Result<Self, ReconcileError> {
        let mut initial_by_id: HashMap<&str, &Section> = HashMap::with_capacity(initial.len());
        for section in initial {
            check_lesson(lesson_id, section)?;
            match section.id.as_server() {
                Some(id) => {
                    initial_by_id.insert(id, section);
                }
                None => return Err(ReconcileError::TemporaryIdInSnapshot(section.id.clone())),
            }
        }

        let mut plan = SyncPlan {
            lesson_id: lesson_id.to_string(),
            deletes: Vec::new(),
            updates: Vec::new(),
            creates: Vec::new(),
            unchanged: 0,
            slots: Vec::with_capacity(current.len()),
        };
        let mut seen: HashSet<&SectionId> = HashSet::with_capacity(current.len());

        for (index, section) in current.iter().enumerate() {
            let order = index as u32 + 1;
            check_lesson(lesson_id, section)?;

            if !seen.insert(&section.id) {
                return Err(ReconcileError::DuplicateSection(section.id.clone()));
            }

            let server_id = match &section.id {
                SectionId::Temporary(_) => {
                    validate(section)?;
                    plan.push_create(section, order);
                    continue;
                }
                SectionId::Server(id) => id,
            };

            let original = initial_by_id
                .get(server_id.as_str())
                .ok_or_else(|| ReconcileError::UnknownSection(section.id.clone()))?;

            if original.section_type != section.section_type {
                // Type is fixed at creation.
                validate(section)?;
                plan.deletes.push(server_id.clone());
                plan.push_create(section, order);
                continue;
            }

            let patch = SectionPatch::between(original, section, order);
            // Only what is sent gets checked. Server data is taken as is.
            if patch.content.is_some() || patch.body.is_some() {
                validate(section)?;
            }
            if patch.is_empty() {
                plan.unchanged += 1;
            } else {
                plan.updates.push(PlannedUpdate {
                    id: server_id.clone(),
                    patch,
                });
            }
            plan.slots.push(Slot::Existing(server_id.clone()));
        }

        for section in initial {
            if !seen.contains(&section.id) {
                if let Some(id) = section.id.as_server() {
                    plan.deletes.push(id.to_string());
                }
            }
        }

        Ok(plan)
    }

    fn push_create(&mut self, section: &Section, order: u32) {
        self.creates.push(PlannedCreate {
            local_id: section.id.clone(),
            section: NewSection::from_section(section, order),
        });
        self.slots.push(Slot::Created(section.id.clone()));
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.updates.is_empty() && self.creates.is_empty()
    }

    /// Number of individual create/update/delete calls.
    pub fn operation_count(&self) -> usize {
        self.deletes.len() + self.updates.len() + self.creates.len()
    }
}

fn validate(section: &Section) -> Result<(), ReconcileError> {
    section.validate().map_err(|source| ReconcileError::Invalid {
        id: section.id.clone(),
        source,
    })
    .map(|_| ())
}

fn check_lesson(lesson_id: &str, section: &Section) -> Result<(), ReconcileError> {
    if section.lesson_id == lesson_id {
        Ok(())
    } else {
        Err(ReconcileError::LessonMismatch {
            id: section.id.clone(),
            expected: lesson_id.to_string(),
            found: section.lesson_id.clone(),
        })
    }
}

impl fmt::Display for SyncPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "Lesson {}: no changes", self.lesson_id);
        }

        writeln!(
            f,
            "Lesson {}: {} delete(s), {} update(s), {} create(s), {} unchanged",
            self.lesson_id,
            self.deletes.len(),
            self.updates.len(),
            self.creates.len(),
            self.unchanged
        )?;
        for id in &self.deletes {
            writeln!(f, "  - delete {}", id)?;
        }
        for update in &self.updates {
            writeln!(
                f,
                "  ~ update {} ({})",
                update.id,
                update.patch.changed_fields().join(", ")
            )?;
        }
        for create in &self.creates {
            writeln!(
                f,
                "  + create {} section at #{} ({})",
                create.section.section_type, create.section.order, create.local_id
            )?;
        }
        Ok(())
    }
}

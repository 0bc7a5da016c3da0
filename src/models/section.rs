use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::section_id::SectionId;
use super::section_kind::{Body, SectionKind, ValidationError};
use super::section_type::SectionType;

/// One content block of a lesson.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub lesson_id: String,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub body: Body,
    pub order: u32,
}

impl Section {
    /// A new, not yet persisted section with a temporary id.
    pub fn new(lesson_id: impl Into<String>, section_type: SectionType) -> Self {
        Self {
            id: SectionId::temporary(),
            lesson_id: lesson_id.into(),
            section_type,
            content: String::new(),
            body: Body::new(),
            order: 0,
        }
    }

    pub fn with_id(mut self, id: SectionId) -> Self {
        self.id = id;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.is_temporary()
    }

    /// Validate content and body for this section's type.
    pub fn validate(&self) -> Result<SectionKind, ValidationError> {
        SectionKind::parse(self.section_type, &self.content, &self.body)
    }

    /// One-line description, falling back to the raw content if invalid.
    pub fn summary(&self) -> String {
        match self.validate() {
            Ok(kind) => kind.summary(),
            Err(e) => format!("(invalid: {})", e),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = format!("#{} {} section", self.order, self.section_type);
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.len()))?;
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Lesson: {}", self.lesson_id)?;

        if !self.content.is_empty() {
            writeln!(f, "\nContent:\n{}", self.content)?;
        }

        if !self.body.is_empty() {
            writeln!(f, "\nAttributes:")?;
            for (key, value) in &self.body {
                writeln!(f, "  {}: {}", key, value)?;
            }
        }

        if let Err(e) = self.validate() {
            writeln!(f, "\nWarning: {}", e)?;
        }

        Ok(())
    }
}

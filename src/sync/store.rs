//! Persistence collaborator for lesson sections.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::StoreError;
use crate::models::{Body, Section, SectionType};

/// Payload for creating a section. The server assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewSection {
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub content: String,
    pub body: Body,
    pub order: u32,
}

impl NewSection {
    /// Build the create payload for `section` placed at `order`.
    pub fn from_section(section: &Section, order: u32) -> Self {
        Self {
            section_type: section.section_type,
            content: section.content.clone(),
            body: section.body.clone(),
            order,
        }
    }
}

/// Partial update. Only changed fields are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SectionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl SectionPatch {
    /// Fields of `edited` that differ from `original`, with the section
    /// moved to `order`.
    pub fn between(original: &Section, edited: &Section, order: u32) -> Self {
        Self {
            content: (original.content != edited.content).then(|| edited.content.clone()),
            body: (original.body != edited.body).then(|| edited.body.clone()),
            order: (original.order != order).then_some(order),
        }
    }

    pub fn order_only(order: u32) -> Self {
        Self {
            order: Some(order),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.body.is_none() && self.order.is_none()
    }

    pub fn changed_fields(&self) -> Vec<&'static str> {
        [
            self.content.as_ref().map(|_| "content"),
            self.body.as_ref().map(|_| "body"),
            self.order.map(|_| "order"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn apply_to(&self, section: &mut Section) {
        if let Some(content) = &self.content {
            section.content = content.clone();
        }
        if let Some(body) = &self.body {
            section.body = body.clone();
        }
        if let Some(order) = self.order {
            section.order = order;
        }
    }
}

/// New position for a persisted section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderChange {
    pub id: String,
    pub order: u32,
}

/// Server-side storage of lesson sections.
#[async_trait]
pub trait SectionStore: Send + Sync {
    async fn list_by_lesson(&self, lesson_id: &str) -> Result<Vec<Section>, StoreError>;

    async fn create(&self, lesson_id: &str, section: &NewSection) -> Result<Section, StoreError>;

    async fn update(&self, section_id: &str, patch: &SectionPatch) -> Result<Section, StoreError>;

    async fn delete(&self, section_id: &str) -> Result<(), StoreError>;

    /// Move several sections at once. Stores without a batch endpoint fall
    /// back to one order-only update per change.
    async fn reorder(
        &self,
        _lesson_id: &str,
        changes: &[OrderChange],
    ) -> Result<Vec<Section>, StoreError> {
        let mut moved = Vec::with_capacity(changes.len());
        for change in changes {
            moved.push(
                self.update(&change.id, &SectionPatch::order_only(change.order))
                    .await?,
            );
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SectionId;
    use serde_json::json;

    fn text(id: &str, content: &str, order: u32) -> Section {
        Section::new("lesson-1", SectionType::Text)
            .with_id(SectionId::server(id))
            .with_content(content)
            .with_order(order)
    }

    #[test]
    fn test_patch_between_only_changed_fields() {
        let original = text("a", "hello", 1);
        let edited = text("a", "hello there", 1);

        let patch = SectionPatch::between(&original, &edited, 1);
        assert_eq!(patch.content.as_deref(), Some("hello there"));
        assert!(patch.body.is_none());
        assert!(patch.order.is_none());
        assert_eq!(patch.changed_fields(), vec!["content"]);
    }

    #[test]
    fn test_patch_between_uses_target_order() {
        let original = text("a", "hello", 3);
        let edited = text("a", "hello", 3);

        let patch = SectionPatch::between(&original, &edited, 2);
        assert_eq!(patch, SectionPatch::order_only(2));

        let unchanged = SectionPatch::between(&original, &edited, 3);
        assert!(unchanged.is_empty());
    }

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = SectionPatch::order_only(4);
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "order": 4 }));
    }

    #[test]
    fn test_patch_apply_to() {
        let mut section = text("a", "old", 1);
        let patch = SectionPatch {
            content: Some("new".into()),
            body: None,
            order: Some(2),
        };
        patch.apply_to(&mut section);
        assert_eq!(section.content, "new");
        assert_eq!(section.order, 2);
    }

    #[test]
    fn test_new_section_payload() {
        let section = Section::new("lesson-1", SectionType::Quiz)
            .with_attr("quizId", json!("q-1"))
            .with_order(9);
        let payload = NewSection::from_section(&section, 2);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({ "type": "quiz", "content": "", "body": { "quizId": "q-1" }, "order": 2 })
        );
    }
}

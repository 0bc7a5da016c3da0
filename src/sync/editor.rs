//! Local editing state for one lesson's sections.
//!
//! The editor holds two lists: `initial`, the last state the server
//! confirmed, and `current`, the working copy. Edits touch only `current`
//! and keep its `order` fields contiguous. `save` reconciles the two and
//! takes `&mut self`, so no edit or second save can run while one is in
//! flight.

use std::str::FromStr;
use thiserror::Error;

use super::error::{ReconcileError, StoreError};
use super::plan::SyncPlan;
use super::reconciler::Reconciler;
use super::store::SectionStore;
use crate::models::{Body, Section, SectionId, SectionType};

#[derive(Error, Debug, PartialEq)]
pub enum EditorError {
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("Position {position} is out of range (lesson has {len} section(s))")]
    PositionOutOfRange { position: usize, len: usize },
}

/// A section given by id, or by 1-based position written `#N`.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionRef {
    Id(SectionId),
    Position(usize),
}

impl FromStr for SectionRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(position) = s.strip_prefix('#') {
            return match position.parse::<usize>() {
                Ok(n) if n > 0 => Ok(SectionRef::Position(n)),
                _ => Err(format!(
                    "Invalid position '{}'. Use #1 for the first section",
                    s
                )),
            };
        }
        s.parse::<SectionId>()
            .map(SectionRef::Id)
            .map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LessonEditor {
    lesson_id: String,
    initial: Vec<Section>,
    current: Vec<Section>,
}

impl LessonEditor {
    /// Start editing from a server snapshot.
    pub fn new(lesson_id: impl Into<String>, mut snapshot: Vec<Section>) -> Self {
        snapshot.sort_by_key(|s| s.order);
        Self {
            lesson_id: lesson_id.into(),
            current: snapshot.clone(),
            initial: snapshot,
        }
    }

    /// Restore a previously saved draft.
    pub fn from_parts(
        lesson_id: impl Into<String>,
        initial: Vec<Section>,
        current: Vec<Section>,
    ) -> Self {
        Self {
            lesson_id: lesson_id.into(),
            initial,
            current,
        }
    }

    /// Fetch the lesson's sections and start editing them.
    pub async fn load<S: SectionStore + ?Sized>(
        store: &S,
        lesson_id: &str,
    ) -> Result<Self, StoreError> {
        let sections = store.list_by_lesson(lesson_id).await?;
        Ok(Self::new(lesson_id, sections))
    }

    pub fn lesson_id(&self) -> &str {
        &self.lesson_id
    }

    /// Working copy, in display order.
    pub fn sections(&self) -> &[Section] {
        &self.current
    }

    /// Last state confirmed by the server.
    pub fn snapshot(&self) -> &[Section] {
        &self.initial
    }

    pub fn get(&self, id: &SectionId) -> Option<&Section> {
        self.current.iter().find(|s| &s.id == id)
    }

    pub fn resolve(&self, reference: &SectionRef) -> Result<SectionId, EditorError> {
        match reference {
            SectionRef::Id(id) => self
                .get(id)
                .map(|s| s.id.clone())
                .ok_or_else(|| EditorError::SectionNotFound(id.to_string())),
            SectionRef::Position(position) => self
                .current
                .get(position.wrapping_sub(1))
                .map(|s| s.id.clone())
                .ok_or(EditorError::PositionOutOfRange {
                    position: *position,
                    len: self.current.len(),
                }),
        }
    }

    /// Insert a new section at `position` (1-based), or append it.
    pub fn add(
        &mut self,
        section_type: SectionType,
        content: impl Into<String>,
        body: Body,
        position: Option<usize>,
    ) -> Result<SectionId, EditorError> {
        let index = match position {
            Some(p) => self.insertion_index(p)?,
            None => self.current.len(),
        };

        let section = Section::new(self.lesson_id.clone(), section_type)
            .with_content(content)
            .with_body(body);
        let id = section.id.clone();
        self.current.insert(index, section);
        self.renumber();
        Ok(id)
    }

    pub fn edit(
        &mut self,
        id: &SectionId,
        content: Option<String>,
        body: Option<Body>,
    ) -> Result<(), EditorError> {
        let index = self.index_of(id)?;
        let section = &mut self.current[index];
        if let Some(content) = content {
            section.content = content;
        }
        if let Some(body) = body {
            section.body = body;
        }
        Ok(())
    }

    /// Change a section's type. A persisted section is replaced on save.
    pub fn set_type(
        &mut self,
        id: &SectionId,
        section_type: SectionType,
    ) -> Result<(), EditorError> {
        let index = self.index_of(id)?;
        self.current[index].section_type = section_type;
        Ok(())
    }

    /// Move a section to `position` (1-based).
    pub fn move_to(&mut self, id: &SectionId, position: usize) -> Result<(), EditorError> {
        let from = self.index_of(id)?;
        if position == 0 || position > self.current.len() {
            return Err(EditorError::PositionOutOfRange {
                position,
                len: self.current.len(),
            });
        }

        let section = self.current.remove(from);
        self.current.insert(position - 1, section);
        self.renumber();
        Ok(())
    }

    pub fn remove(&mut self, id: &SectionId) -> Result<Section, EditorError> {
        let index = self.index_of(id)?;
        let removed = self.current.remove(index);
        self.renumber();
        Ok(removed)
    }

    /// Drop all local edits.
    pub fn revert(&mut self) {
        self.current = self.initial.clone();
    }

    pub fn plan(&self) -> Result<SyncPlan, ReconcileError> {
        SyncPlan::compute(&self.lesson_id, &self.initial, &self.current)
    }

    /// Returns true if saving would send anything. A working copy that
    /// cannot be planned counts as dirty.
    pub fn is_dirty(&self) -> bool {
        self.plan().map_or(true, |plan| !plan.is_empty())
    }

    /// Rewrite the working copy's `order` fields to 1..N.
    pub fn normalize(&mut self) {
        self.renumber();
    }

    /// Push local edits to the server.
    ///
    /// On success both lists become the confirmed server state. On failure
    /// local edits are kept and operations the server already confirmed are
    /// folded in, so saving again only sends what is still missing.
    pub async fn save<S: SectionStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> Result<&[Section], ReconcileError> {
        let result = Reconciler::new(store)
            .reconcile(&self.lesson_id, &self.initial, &self.current)
            .await;

        match result {
            Ok(sections) => {
                self.initial = sections.clone();
                self.current = sections;
                Ok(&self.current)
            }
            Err(e) => {
                if let Some(applied) = e.applied() {
                    applied.rebase(&mut self.initial, &mut self.current);
                }
                Err(e)
            }
        }
    }

    fn index_of(&self, id: &SectionId) -> Result<usize, EditorError> {
        self.current
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| EditorError::SectionNotFound(id.to_string()))
    }

    fn insertion_index(&self, position: usize) -> Result<usize, EditorError> {
        if position == 0 || position > self.current.len() + 1 {
            return Err(EditorError::PositionOutOfRange {
                position,
                len: self.current.len(),
            });
        }
        Ok(position - 1)
    }

    fn renumber(&mut self) {
        for (index, section) in self.current.iter_mut().enumerate() {
            section.order = index as u32 + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{Call, MemoryStore};
    use serde_json::json;

    const LESSON: &str = "lesson-1";

    fn server(id: &str, content: &str, order: u32) -> Section {
        Section::new(LESSON, SectionType::Text)
            .with_id(SectionId::server(id))
            .with_content(content)
            .with_order(order)
    }

    fn contents(sections: &[Section]) -> Vec<&str> {
        sections.iter().map(|s| s.content.as_str()).collect()
    }

    fn orders(sections: &[Section]) -> Vec<u32> {
        sections.iter().map(|s| s.order).collect()
    }

    fn quiz_body() -> Body {
        let mut body = Body::new();
        body.insert("quizId".into(), json!("q-1"));
        body
    }

    #[test]
    fn test_section_ref_parse() {
        assert_eq!("#2".parse::<SectionRef>(), Ok(SectionRef::Position(2)));
        assert_eq!(
            "s-1".parse::<SectionRef>(),
            Ok(SectionRef::Id(SectionId::server("s-1")))
        );
        assert!("#0".parse::<SectionRef>().is_err());
        assert!("#x".parse::<SectionRef>().is_err());
        assert!("".parse::<SectionRef>().is_err());
    }

    #[test]
    fn test_new_sorts_snapshot() {
        let editor = LessonEditor::new(LESSON, vec![server("b", "B", 2), server("a", "A", 1)]);
        assert_eq!(contents(editor.sections()), vec!["A", "B"]);
        assert!(!editor.is_dirty());
    }

    #[test]
    fn test_add_appends_and_inserts() {
        let mut editor = LessonEditor::new(LESSON, vec![server("a", "A", 1)]);

        let last = editor
            .add(SectionType::Text, "Z", Body::new(), None)
            .unwrap();
        let first = editor
            .add(SectionType::Text, "0", Body::new(), Some(1))
            .unwrap();

        assert!(last.is_temporary());
        assert_eq!(contents(editor.sections()), vec!["0", "A", "Z"]);
        assert_eq!(orders(editor.sections()), vec![1, 2, 3]);
        assert_eq!(editor.resolve(&SectionRef::Position(1)).unwrap(), first);
        assert!(editor.is_dirty());
    }

    #[test]
    fn test_add_out_of_range() {
        let mut editor = LessonEditor::new(LESSON, vec![]);
        let err = editor
            .add(SectionType::Text, "x", Body::new(), Some(3))
            .unwrap_err();
        assert_eq!(err, EditorError::PositionOutOfRange { position: 3, len: 0 });
    }

    #[test]
    fn test_move_and_remove_keep_orders_contiguous() {
        let mut editor = LessonEditor::new(
            LESSON,
            vec![server("a", "A", 1), server("b", "B", 2), server("c", "C", 3)],
        );

        editor.move_to(&SectionId::server("c"), 1).unwrap();
        assert_eq!(contents(editor.sections()), vec!["C", "A", "B"]);
        assert_eq!(orders(editor.sections()), vec![1, 2, 3]);

        let removed = editor.remove(&SectionId::server("a")).unwrap();
        assert_eq!(removed.content, "A");
        assert_eq!(contents(editor.sections()), vec!["C", "B"]);
        assert_eq!(orders(editor.sections()), vec![1, 2]);

        assert_eq!(
            editor.move_to(&SectionId::server("b"), 5),
            Err(EditorError::PositionOutOfRange { position: 5, len: 2 })
        );
        assert_eq!(
            editor.remove(&SectionId::server("zzz")).unwrap_err(),
            EditorError::SectionNotFound("zzz".into())
        );
    }

    #[test]
    fn test_edit_and_revert() {
        let mut editor = LessonEditor::new(LESSON, vec![server("a", "A", 1)]);
        editor
            .edit(&SectionId::server("a"), Some("A2".into()), None)
            .unwrap();
        assert!(editor.is_dirty());
        assert_eq!(editor.plan().unwrap().updates.len(), 1);

        editor.revert();
        assert!(!editor.is_dirty());
        assert!(editor.plan().unwrap().is_empty());
    }

    #[test]
    fn test_set_type_plans_recreate() {
        let mut editor = LessonEditor::new(LESSON, vec![server("a", "A", 1)]);
        let id = SectionId::server("a");
        editor.set_type(&id, SectionType::Quiz).unwrap();
        editor.edit(&id, None, Some(quiz_body())).unwrap();

        let plan = editor.plan().unwrap();
        assert_eq!(plan.deletes, vec!["a".to_string()]);
        assert_eq!(plan.creates.len(), 1);
    }

    #[tokio::test]
    async fn test_load_and_save() {
        let store = MemoryStore::with_sections(vec![server("a", "A", 1), server("b", "B", 2)]);
        let mut editor = LessonEditor::load(&store, LESSON).await.unwrap();
        assert_eq!(editor.sections().len(), 2);

        editor.remove(&SectionId::server("a")).unwrap();
        editor
            .add(SectionType::Quiz, "", quiz_body(), None)
            .unwrap();

        let saved = editor.save(&store).await.unwrap().to_vec();
        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|s| s.is_persisted()));
        assert_eq!(orders(&saved), vec![1, 2]);
        assert_eq!(editor.snapshot(), editor.sections());
        assert!(!editor.is_dirty());

        store.clear_calls();
        editor.save(&store).await.unwrap();
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_edits_and_retries_only_missing_work() {
        let store = MemoryStore::new();
        store.fail_create_at(2);
        let mut editor = LessonEditor::new(LESSON, vec![]);
        editor.add(SectionType::Text, "one", Body::new(), None).unwrap();
        editor.add(SectionType::Text, "two", Body::new(), None).unwrap();

        let err = editor.save(&store).await.unwrap_err();
        assert!(err.applied().is_some());

        // Local edits survive, the confirmed create is now part of the snapshot.
        assert_eq!(contents(editor.sections()), vec!["one", "two"]);
        assert!(editor.sections()[0].is_persisted());
        assert!(editor.sections()[1].id.is_temporary());
        assert_eq!(editor.snapshot().len(), 1);
        assert!(editor.is_dirty());

        store.clear_calls();
        editor.save(&store).await.unwrap();

        assert_eq!(store.calls(), vec![Call::Create, Call::List]);
        assert_eq!(store.sections(LESSON).len(), 2);
        assert!(!editor.is_dirty());
    }

    #[test]
    fn test_stale_orders_are_not_dirty() {
        let initial = vec![server("a", "A", 1), server("b", "B", 2)];
        let stale = vec![server("a", "A", 4), server("b", "B", 7)];
        let mut editor = LessonEditor::from_parts(LESSON, initial.clone(), stale);

        assert!(editor.plan().unwrap().is_empty());
        assert!(!editor.is_dirty());

        editor.normalize();
        assert_eq!(editor.sections(), initial.as_slice());
    }

    #[tokio::test]
    async fn test_save_next_to_legacy_media_section() {
        let legacy = Section::new(LESSON, SectionType::Video)
            .with_id(SectionId::server("v"))
            .with_content("intro.mp4")
            .with_order(1);
        let store = MemoryStore::with_sections(vec![legacy.clone()]);
        let mut editor = LessonEditor::load(&store, LESSON).await.unwrap();
        assert!(!editor.is_dirty());

        editor.add(SectionType::Text, "Notes", Body::new(), None).unwrap();
        store.clear_calls();
        let saved = editor.save(&store).await.unwrap().to_vec();

        assert_eq!(store.calls(), vec![Call::Create, Call::List]);
        assert_eq!(saved[0], legacy);
        assert_eq!(contents(&saved), vec!["intro.mp4", "Notes"]);
    }

    #[tokio::test]
    async fn test_retry_after_section_deleted_elsewhere_converges() {
        // "b" was removed by someone else after the pull.
        let store = MemoryStore::with_sections(vec![server("a", "A", 1)]);
        let mut editor =
            LessonEditor::new(LESSON, vec![server("a", "A", 1), server("b", "B", 2)]);
        editor.remove(&SectionId::server("b")).unwrap();
        editor
            .edit(&SectionId::server("a"), Some("A2".into()), None)
            .unwrap();

        let err = editor.save(&store).await.unwrap_err();
        assert_eq!(err.kind(), crate::sync::ErrorKind::NotFound);
        assert_eq!(editor.snapshot(), &[server("a", "A", 1)]);
        assert!(editor.is_dirty());

        store.clear_calls();
        let saved = editor.save(&store).await.unwrap().to_vec();

        assert_eq!(store.calls(), vec![Call::Update("a".into()), Call::List]);
        assert_eq!(contents(&saved), vec!["A2"]);
        assert!(!editor.is_dirty());
    }

    #[tokio::test]
    async fn test_invalid_save_leaves_state_untouched() {
        let store = MemoryStore::new();
        let mut editor = LessonEditor::new(LESSON, vec![]);
        editor.add(SectionType::Video, "", Body::new(), None).unwrap();
        let before = editor.clone();

        let err = editor.save(&store).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Invalid { .. }));
        assert_eq!(editor, before);
        assert!(store.calls().is_empty());
    }
}

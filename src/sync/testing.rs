//! In-memory `SectionStore` that records every call, for tests.

use async_trait::async_trait;
use std::ops::Deref;
use std::sync::Mutex;

use super::error::StoreError;
use super::store::{NewSection, OrderChange, SectionPatch, SectionStore};
use crate::models::{Section, SectionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Create,
    Update(String),
    Delete(String),
    Reorder(usize),
}

#[derive(Default)]
struct State {
    sections: Vec<Section>,
    next_id: u32,
    calls: Vec<Call>,
    creates_attempted: usize,
    updates_attempted: usize,
    fail_create_at: Option<usize>,
    fail_update_at: Option<usize>,
    fail_reorder: bool,
    fail_list: bool,
}

fn injected() -> StoreError {
    StoreError::Network("connection reset".into())
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    /// Ignore the requested order and put new sections last
    append_on_create: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sections(sections: Vec<Section>) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            state.next_id = sections.len() as u32;
            state.sections = sections;
        }
        store
    }

    pub fn append_on_create(mut self) -> Self {
        self.append_on_create = true;
        self
    }

    /// Fail the `n`-th create call (1-based, counted across the store's life).
    pub fn fail_create_at(&self, n: usize) {
        self.state.lock().unwrap().fail_create_at = Some(n);
    }

    /// Fail the `n`-th update call (1-based, counted across the store's life).
    pub fn fail_update_at(&self, n: usize) {
        self.state.lock().unwrap().fail_update_at = Some(n);
    }

    /// Fail the next reorder call.
    pub fn fail_reorder(&self) {
        self.state.lock().unwrap().fail_reorder = true;
    }

    /// Fail the next list call.
    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    pub fn creates(&self) -> usize {
        self.count(|c| matches!(c, Call::Create))
    }

    pub fn updates(&self) -> usize {
        self.count(|c| matches!(c, Call::Update(_)))
    }

    pub fn deletes(&self) -> usize {
        self.count(|c| matches!(c, Call::Delete(_)))
    }

    pub fn sections(&self, lesson_id: &str) -> Vec<Section> {
        let state = self.state.lock().unwrap();
        let mut sections: Vec<Section> = state
            .sections
            .iter()
            .filter(|s| s.lesson_id == lesson_id)
            .cloned()
            .collect();
        sections.sort_by_key(|s| s.order);
        sections
    }
}

#[async_trait]
impl SectionStore for MemoryStore {
    async fn list_by_lesson(&self, lesson_id: &str) -> Result<Vec<Section>, StoreError> {
        {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::List);
            if std::mem::take(&mut state.fail_list) {
                return Err(injected());
            }
        }
        Ok(self.sections(lesson_id))
    }

    async fn create(&self, lesson_id: &str, section: &NewSection) -> Result<Section, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create);
        state.creates_attempted += 1;
        if state.fail_create_at == Some(state.creates_attempted) {
            return Err(injected());
        }

        state.next_id += 1;
        let order = if self.append_on_create {
            state
                .sections
                .iter()
                .filter(|s| s.lesson_id == lesson_id)
                .map(|s| s.order)
                .max()
                .unwrap_or(0)
                + 1
        } else {
            section.order
        };
        let created = Section::new(lesson_id, section.section_type)
            .with_id(SectionId::server(format!("sec-{}", state.next_id)))
            .with_content(section.content.clone())
            .with_body(section.body.clone())
            .with_order(order);
        state.sections.push(created.clone());
        Ok(created)
    }

    async fn update(&self, section_id: &str, patch: &SectionPatch) -> Result<Section, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Update(section_id.to_string()));
        state.updates_attempted += 1;
        if state.fail_update_at == Some(state.updates_attempted) {
            return Err(injected());
        }
        let section = state
            .sections
            .iter_mut()
            .find(|s| s.id.as_server() == Some(section_id))
            .ok_or_else(|| StoreError::NotFound(section_id.to_string()))?;
        patch.apply_to(section);
        Ok(section.clone())
    }

    async fn delete(&self, section_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(section_id.to_string()));
        let before = state.sections.len();
        state
            .sections
            .retain(|s| s.id.as_server() != Some(section_id));
        if state.sections.len() == before {
            return Err(StoreError::NotFound(section_id.to_string()));
        }
        Ok(())
    }

    async fn reorder(
        &self,
        _lesson_id: &str,
        changes: &[OrderChange],
    ) -> Result<Vec<Section>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Reorder(changes.len()));
        if std::mem::take(&mut state.fail_reorder) {
            return Err(injected());
        }
        let mut moved = Vec::with_capacity(changes.len());
        for change in changes {
            let section = state
                .sections
                .iter_mut()
                .find(|s| s.id.as_server() == Some(change.id.as_str()))
                .ok_or_else(|| StoreError::NotFound(change.id.clone()))?;
            section.order = change.order;
            moved.push(section.clone());
        }
        Ok(moved)
    }
}

/// Store without a batch reorder endpoint, so the trait's default
/// `reorder` runs on top of the wrapped `MemoryStore`.
pub struct UpdateOnlyStore(pub MemoryStore);

impl Deref for UpdateOnlyStore {
    type Target = MemoryStore;

    fn deref(&self) -> &MemoryStore {
        &self.0
    }
}

#[async_trait]
impl SectionStore for UpdateOnlyStore {
    async fn list_by_lesson(&self, lesson_id: &str) -> Result<Vec<Section>, StoreError> {
        self.0.list_by_lesson(lesson_id).await
    }

    async fn create(&self, lesson_id: &str, section: &NewSection) -> Result<Section, StoreError> {
        self.0.create(lesson_id, section).await
    }

    async fn update(&self, section_id: &str, patch: &SectionPatch) -> Result<Section, StoreError> {
        self.0.update(section_id, patch).await
    }

    async fn delete(&self, section_id: &str) -> Result<(), StoreError> {
        self.0.delete(section_id).await
    }
}

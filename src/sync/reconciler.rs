//! Applies a `SyncPlan` to a `SectionStore`.
//!
//! Phases run strictly in sequence: deletes, updates, creates, then a
//! single batched renumbering. Calls inside one phase touch disjoint ids and
//! are issued together; every call of a phase settles before the next phase
//! starts, so a failure always reports exactly what the server confirmed.
//!
//! Nothing is retried or rolled back. The caller folds `AppliedChanges` into
//! its snapshots (see [`AppliedChanges::rebase`]) and simply reconciles
//! again; the new diff no longer contains the confirmed operations.

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::error::{ReconcileError, StoreError};
use super::plan::{Slot, SyncPlan};
use super::store::{OrderChange, SectionStore};
use crate::models::{Section, SectionId};

/// Operations confirmed by the server during one reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedChanges {
    pub deleted: Vec<String>,
    pub updated: Vec<Section>,
    /// Local id (temporary, or the replaced server id on a type change)
    /// paired with the section the server created.
    pub created: Vec<(SectionId, Section)>,
}

impl AppliedChanges {
    pub fn len(&self) -> usize {
        self.deleted.len() + self.updated.len() + self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep the latest server copy of a section.
    fn record_update(&mut self, section: Section) {
        if let Some((_, created)) = self.created.iter_mut().find(|(_, s)| s.id == section.id) {
            *created = section;
        } else if let Some(updated) = self.updated.iter_mut().find(|s| s.id == section.id) {
            *updated = section;
        } else {
            self.updated.push(section);
        }
    }

    fn confirmed<'a>(&'a self, slot: &Slot, initial: &'a [Section]) -> Option<&'a Section> {
        match slot {
            Slot::Existing(id) => self
                .updated
                .iter()
                .chain(initial.iter())
                .find(|s| s.id.as_server() == Some(id.as_str())),
            Slot::Created(local_id) => self
                .created
                .iter()
                .find(|(local, _)| local == local_id)
                .map(|(_, s)| s),
        }
    }

    /// Fold confirmed operations into the caller's snapshots after a failed
    /// reconciliation.
    ///
    /// `initial` gains every confirmed section and loses deleted ones.
    /// In `current`, temporary ids that were created take their server id,
    /// and a section whose server id was deleted without its replacement
    /// being created goes back to a temporary id.
    pub fn rebase(&self, initial: &mut Vec<Section>, current: &mut [Section]) {
        initial.retain(|s| {
            !s.id
                .as_server()
                .is_some_and(|id| self.deleted.iter().any(|d| d == id))
        });

        let confirmed = self
            .updated
            .iter()
            .chain(self.created.iter().map(|(_, s)| s));
        for section in confirmed {
            match initial.iter_mut().find(|s| s.id == section.id) {
                Some(existing) => *existing = section.clone(),
                None => initial.push(section.clone()),
            }
        }
        initial.sort_by_key(|s| s.order);

        for (local_id, created) in &self.created {
            if let Some(section) = current.iter_mut().find(|s| &s.id == local_id) {
                section.id = created.id.clone();
            }
        }

        for section in current.iter_mut() {
            let deleted = section
                .id
                .as_server()
                .is_some_and(|id| self.deleted.iter().any(|d| d == id));
            if deleted {
                section.id = SectionId::temporary();
            }
        }
    }
}

pub struct Reconciler<'a, S: SectionStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SectionStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Converge the server's sections of `lesson_id` from `initial` to
    /// `current` and return the confirmed list, ordered 1..N.
    pub async fn reconcile(
        &self,
        lesson_id: &str,
        initial: &[Section],
        current: &[Section],
    ) -> Result<Vec<Section>, ReconcileError> {
        let plan = SyncPlan::compute(lesson_id, initial, current)?;

        if plan.is_empty() {
            debug!(lesson_id, unchanged = plan.unchanged, "Nothing to sync");
            return Ok(renumbered(current));
        }

        debug!(
            lesson_id,
            deletes = plan.deletes.len(),
            updates = plan.updates.len(),
            creates = plan.creates.len(),
            "Reconciling sections"
        );

        let mut applied = AppliedChanges::default();
        match self.execute(&plan, initial, &mut applied).await {
            Ok(sections) => {
                info!(
                    lesson_id,
                    operations = plan.operation_count(),
                    sections = sections.len(),
                    "Sections synced"
                );
                Ok(sections)
            }
            Err(source) => {
                warn!(
                    lesson_id,
                    applied = applied.len(),
                    planned = plan.operation_count(),
                    "Section sync failed: {}",
                    source
                );
                Err(ReconcileError::Store {
                    source,
                    applied: Box::new(applied),
                    planned: plan.operation_count(),
                })
            }
        }
    }

    async fn execute(
        &self,
        plan: &SyncPlan,
        initial: &[Section],
        applied: &mut AppliedChanges,
    ) -> Result<Vec<Section>, StoreError> {
        let store = self.store;
        let lesson_id = plan.lesson_id.as_str();

        // Deletes first so freed positions never collide with moved or new sections.
        let results = join_all(plan.deletes.iter().map(|id| store.delete(id))).await;
        settle_deletes(&plan.deletes, results, &mut applied.deleted)?;

        let results = join_all(
            plan.updates
                .iter()
                .map(|update| store.update(&update.id, &update.patch)),
        )
        .await;
        settle(results, |section| applied.updated.push(section))?;

        let results = join_all(plan.creates.iter().map(|create| async move {
            store
                .create(lesson_id, &create.section)
                .await
                .map(|section| (create.local_id.clone(), section))
        }))
        .await;
        settle(results, |created| applied.created.push(created))?;

        self.renumber(plan, initial, applied).await?;

        let mut confirmed = store.list_by_lesson(lesson_id).await?;
        confirmed.sort_by_key(|s| s.order);

        let expected: Vec<&SectionId> = plan
            .slots
            .iter()
            .filter_map(|slot| applied.confirmed(slot, initial))
            .map(|s| &s.id)
            .collect();
        let actual: Vec<&SectionId> = confirmed.iter().map(|s| &s.id).collect();
        if expected != actual {
            warn!(
                lesson_id,
                expected = expected.len(),
                actual = actual.len(),
                "Server sections differ from the saved edits, keeping the server's version"
            );
        }

        Ok(confirmed)
    }

    /// Move every section whose confirmed order is not its position.
    async fn renumber(
        &self,
        plan: &SyncPlan,
        initial: &[Section],
        applied: &mut AppliedChanges,
    ) -> Result<(), StoreError> {
        let changes: Vec<OrderChange> = plan
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let order = index as u32 + 1;
                let section = applied.confirmed(slot, initial)?;
                let id = section.id.as_server()?;
                (section.order != order).then(|| OrderChange {
                    id: id.to_string(),
                    order,
                })
            })
            .collect();

        if changes.is_empty() {
            return Ok(());
        }

        debug!(
            lesson_id = plan.lesson_id.as_str(),
            count = changes.len(),
            "Renumbering sections"
        );
        let moved = self.store.reorder(&plan.lesson_id, &changes).await?;
        for section in moved {
            applied.record_update(section);
        }
        Ok(())
    }
}

/// Record every success of a phase, then report its first failure.
fn settle<T>(
    results: Vec<Result<T, StoreError>>,
    mut on_success: impl FnMut(T),
) -> Result<(), StoreError> {
    let mut first_error = None;
    for result in results {
        match result {
            Ok(value) => on_success(value),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Like [`settle`], but a section that is already gone counts as deleted.
/// The NotFound is still reported so the user sees the lesson changed.
fn settle_deletes(
    ids: &[String],
    results: Vec<Result<(), StoreError>>,
    deleted: &mut Vec<String>,
) -> Result<(), StoreError> {
    let mut first_error = None;
    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(()) => deleted.push(id.clone()),
            Err(e) => {
                if matches!(e, StoreError::NotFound(_)) {
                    debug!(section_id = id.as_str(), "Section already deleted on the server");
                    deleted.push(id.clone());
                }
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn renumbered(sections: &[Section]) -> Vec<Section> {
    sections
        .iter()
        .enumerate()
        .map(|(index, section)| section.clone().with_order(index as u32 + 1))
        .collect()
}

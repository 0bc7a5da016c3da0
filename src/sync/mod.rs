//! Section synchronization with the course API.
//!
//! Local edits to a lesson's sections are pushed to the server by diffing
//! the working copy against the last confirmed server state and applying
//! the minimal set of operations.
//!
//! # Usage
//!
//! ```no_run
//! use coursedeck::models::{Body, SectionType};
//! use coursedeck::sync::{HttpSectionStore, LessonEditor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = HttpSectionStore::new("https://api.example.com", None);
//! let mut editor = LessonEditor::load(&store, "lesson-1").await?;
//! editor.add(SectionType::Text, "Welcome!", Body::new(), Some(1))?;
//! editor.save(&store).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod editor;
pub mod error;
pub mod plan;
pub mod reconciler;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use client::HttpSectionStore;
pub use editor::{EditorError, LessonEditor, SectionRef};
pub use error::{ErrorKind, ReconcileError, StoreError};
pub use plan::{PlannedCreate, PlannedUpdate, SyncPlan};
pub use reconciler::{AppliedChanges, Reconciler};
pub use store::{NewSection, OrderChange, SectionPatch, SectionStore};

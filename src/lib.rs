//! Coursedeck
//!
//! Lesson section editing and synchronization with a course API.

pub mod config;
pub mod db;
pub mod models;
pub mod sync;

pub use config::{Config, ConfigError};
pub use db::{DraftError, DraftRepository, DraftSummary};
pub use models::{Section, SectionId, SectionKind, SectionType, ValidationError};
pub use sync::{
    ErrorKind, HttpSectionStore, LessonEditor, ReconcileError, Reconciler, SectionStore,
    StoreError, SyncPlan,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}

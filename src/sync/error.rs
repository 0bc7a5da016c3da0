//! Sync error types.

use std::fmt;
use thiserror::Error;

use crate::models::{SectionId, ValidationError};
use crate::sync::reconciler::AppliedChanges;

/// Failure categories surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport-level failure or unexpected server response
    NetworkFailure,
    /// Stale id, the section no longer exists server-side
    NotFound,
    /// Malformed section for its type
    ValidationFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NetworkFailure => write!(f, "network failure"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::ValidationFailure => write!(f, "validation failure"),
        }
    }
}

/// Errors returned by a `SectionStore`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Section API not configured. Set api.base_url in config.")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected by server: {0}")]
    Validation(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotConfigured | StoreError::Network(_) => ErrorKind::NetworkFailure,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Validation(_) => ErrorKind::ValidationFailure,
        }
    }
}

/// Errors returned by a reconciliation.
///
/// Everything except `Store` is detected before the first network call.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Section {id} belongs to lesson '{found}', expected '{expected}'")]
    LessonMismatch {
        id: SectionId,
        expected: String,
        found: String,
    },

    #[error("Server snapshot contains unsaved section {0}")]
    TemporaryIdInSnapshot(SectionId),

    #[error("Section {0} appears more than once")]
    DuplicateSection(SectionId),

    #[error("Section {0} is not part of the last known server state")]
    UnknownSection(SectionId),

    #[error("Section {id} is invalid: {source}")]
    Invalid {
        id: SectionId,
        #[source]
        source: ValidationError,
    },

    #[error("Sync failed after {} of {planned} operation(s): {source}", .applied.len())]
    Store {
        #[source]
        source: StoreError,
        applied: Box<AppliedChanges>,
        planned: usize,
    },
}

impl ReconcileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::LessonMismatch { .. }
            | ReconcileError::TemporaryIdInSnapshot(_)
            | ReconcileError::DuplicateSection(_)
            | ReconcileError::Invalid { .. } => ErrorKind::ValidationFailure,
            ReconcileError::UnknownSection(_) => ErrorKind::NotFound,
            ReconcileError::Store { source, .. } => source.kind(),
        }
    }

    /// Operations the server confirmed before the failure.
    pub fn applied(&self) -> Option<&AppliedChanges> {
        match self {
            ReconcileError::Store { applied, .. } => Some(applied),
            _ => None,
        }
    }
}

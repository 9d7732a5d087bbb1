//! Error taxonomy shared by the core and the shell

use serde::Serialize;

/// Kind of source record, used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Area,
    Project,
    Heading,
    Task,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordKind::Area => "area",
            RecordKind::Project => "project",
            RecordKind::Heading => "heading",
            RecordKind::Task => "task",
        };
        f.write_str(name)
    }
}

/// Structural defect in the record set handed to the assembler.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("{kind} {id} references missing {parent_kind} {parent_id}")]
    DanglingParent {
        kind: RecordKind,
        id: String,
        parent_kind: RecordKind,
        parent_id: String,
    },

    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: RecordKind, id: String },
}

/// Failure reported by a destination implementation.
///
/// `RateLimited` and `Transient` are retried by the implementation; the
/// mapper only sees them once retries are exhausted.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum DestinationError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("{0}")]
    Fatal(String),
}

impl DestinationError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DestinationError::RateLimited(_) | DestinationError::Transient(_)
        )
    }
}

/// The clean-slate pre-pass could not finish.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CleanSlateFailure {
    #[error("failed to enumerate task lists: {0}")]
    Enumerate(DestinationError),

    #[error("failed to delete task list '{title}' ({id}) after deleting {deleted}: {source}")]
    Delete {
        id: String,
        title: String,
        deleted: usize,
        source: DestinationError,
    },
}

/// Source store could not be read.
#[derive(thiserror::Error, Debug)]
#[error("source unavailable: {message}")]
pub struct SourceUnavailable {
    pub message: String,
}

impl SourceUnavailable {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

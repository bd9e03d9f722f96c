//! Error taxonomy shared across the pipeline crates (PRD-18).
//!
//! [`CoreError`] covers store and admission contract violations.
//! [`StageError`] is raised by stage functions and classified as transient
//! or permanent, which drives the executor's retry policy. [`TaskError`]
//! is the structured failure detail recorded on a Failed task record so a
//! caller polling status can see why the task failed.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::types::TaskId;

/// Domain-level errors for store and admission operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: TaskId },

    #[error("Entity already exists: {entity} with id {id}")]
    AlreadyExists { entity: &'static str, id: TaskId },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Job queue is full")]
    QueueFull,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Stage errors
// ---------------------------------------------------------------------------

/// Classification of a stage failure, which decides retry behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    /// Worth retrying: resource exhaustion, backend hiccups.
    Transient,
    /// Retrying cannot help: malformed input, unsupported image.
    Permanent,
}

impl StageErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageErrorKind::Transient => "transient",
            StageErrorKind::Permanent => "permanent",
        }
    }
}

/// Failure raised by a stage function.
///
/// The core treats stage internals as a black box; the only contract is
/// the kind (retryable or not) and a human-readable detail string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{} stage error: {detail}", .kind.as_str())]
pub struct StageError {
    pub kind: StageErrorKind,
    pub detail: String,
}

impl StageError {
    pub fn transient(detail: impl Into<String>) -> Self {
        Self {
            kind: StageErrorKind::Transient,
            detail: detail.into(),
        }
    }

    pub fn permanent(detail: impl Into<String>) -> Self {
        Self {
            kind: StageErrorKind::Permanent,
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Task failure detail
// ---------------------------------------------------------------------------

/// Why a task reached the Failed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// A stage failed permanently.
    Permanent,
    /// A stage kept failing transiently until the attempt budget ran out.
    RetriesExhausted,
    /// The task was cancelled between stages.
    Cancelled,
}

impl TaskErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskErrorKind::Permanent => "permanent",
            TaskErrorKind::RetriesExhausted => "retries_exhausted",
            TaskErrorKind::Cancelled => "cancelled",
        }
    }
}

/// Structured failure detail stored on a Failed task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: TaskErrorKind,
    /// The stage that failed, when the failure is attributable to one.
    pub stage: Option<Stage>,
    pub detail: String,
}

impl TaskError {
    /// A permanent stage failure.
    pub fn permanent(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            kind: TaskErrorKind::Permanent,
            stage: Some(stage),
            detail: detail.into(),
        }
    }

    /// A stage that exhausted its retry budget.
    pub fn retries_exhausted(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            kind: TaskErrorKind::RetriesExhausted,
            stage: Some(stage),
            detail: detail.into(),
        }
    }

    /// Cancellation between stages.
    pub fn cancelled() -> Self {
        Self {
            kind: TaskErrorKind::Cancelled,
            stage: None,
            detail: "Task cancelled before completion".to_string(),
        }
    }
}

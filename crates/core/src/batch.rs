//! Derived batch state (PRD-21).
//!
//! A batch stores only its ordered child task ids; its aggregate state is
//! computed from child statuses on every read so it can never drift out of
//! sync. A failed child is exposed per-child, not rolled up into a hard
//! batch failure.

use serde::{Deserialize, Serialize};

use crate::status::TaskStatus;

/// Aggregate state of a batch, derived from its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// At least one child is still pending or running.
    InProgress,
    /// Every child completed successfully.
    Completed,
    /// All children are terminal and at least one failed.
    PartialFailure,
}

impl BatchState {
    /// String representation for snapshots and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::InProgress => "in_progress",
            BatchState::Completed => "completed",
            BatchState::PartialFailure => "partial_failure",
        }
    }

    /// Derive the aggregate state from child statuses.
    ///
    /// An empty batch is vacuously `Completed`; admission rejects empty
    /// garment lists before a batch record can exist.
    pub fn derive(children: &[TaskStatus]) -> Self {
        if children.iter().any(|s| !s.is_terminal()) {
            return BatchState::InProgress;
        }
        if children.iter().any(|s| *s == TaskStatus::Failed) {
            BatchState::PartialFailure
        } else {
            BatchState::Completed
        }
    }
}

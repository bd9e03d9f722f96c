//! Task lifecycle status machine (PRD-18).
//!
//! Transitions are monotonic: `Pending -> Running -> {Completed, Failed}`.
//! Nothing moves backwards except an explicit retry reset, which is modelled
//! as its own operation in the store, not as a status transition here.

use serde::{Deserialize, Serialize};

/// Execution status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Admitted and queued, not yet claimed by a worker.
    Pending,
    /// Claimed by exactly one worker; stages are executing.
    Running,
    /// All stages finished; `result_ref` is set.
    Completed,
    /// Terminal failure; `error` is set.
    Failed,
}

impl TaskStatus {
    /// String representation for snapshots and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Whether this status is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// - `Pending -> Running`
    /// - `Pending -> Failed` (cancelled before a worker claimed it)
    /// - `Running -> Completed | Failed`
    ///
    /// Everything else, including any transition out of a terminal state,
    /// is rejected.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_start_running() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Running));
    }

    #[test]
    fn pending_can_fail_directly() {
        // Cancellation before a worker claims the task.
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn running_can_reach_both_terminals() {
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn no_transition_out_of_terminal_states() {
        for terminal in [TaskStatus::Completed, TaskStatus::Failed] {
            for next in [
                TaskStatus::Pending,
                TaskStatus::Running,
                TaskStatus::Completed,
                TaskStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn running_cannot_return_to_pending() {
        assert!(!TaskStatus::Running.can_transition_to(TaskStatus::Pending));
    }

    #[test]
    fn terminal_detection() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn status_as_str() {
        assert_eq!(TaskStatus::Pending.as_str(), "pending");
        assert_eq!(TaskStatus::Running.as_str(), "running");
        assert_eq!(TaskStatus::Completed.as_str(), "completed");
        assert_eq!(TaskStatus::Failed.as_str(), "failed");
    }
}

//! Task and batch record models (PRD-18).

use chrono::Utc;
use serde::{Deserialize, Serialize};

use tryon_core::error::TaskError;
use tryon_core::stage::{Stage, StageArtifacts, TryonMode};
use tryon_core::status::TaskStatus;
use tryon_core::types::{ArtifactRef, BatchId, TaskId, Timestamp};

/// Input artifact references owned by a task for its lifetime.
///
/// The model image path may be shared (read-only) with batch siblings;
/// the referenced file is immutable once the gateway has stored it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInputs {
    pub model_image: ArtifactRef,
    pub garment_image: ArtifactRef,
}

/// One record per task, mutated exclusively through [`TaskStore::update`].
///
/// [`TaskStore::update`]: crate::task_store::TaskStore::update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub mode: TryonMode,
    pub inputs: TaskInputs,
    pub status: TaskStatus,
    /// Ordered record of stages that completed successfully.
    pub stage_progress: Vec<Stage>,
    /// Intermediate stage outputs, persisted alongside `stage_progress`
    /// so a retried task can resume from the last-known-good stage.
    pub artifacts: StageArtifacts,
    /// Set iff `status == Completed`.
    pub result_ref: Option<ArtifactRef>,
    /// Set iff `status == Failed`.
    pub error: Option<TaskError>,
    /// Attempts consumed by the stage currently executing; reset when a
    /// stage completes.
    pub attempt_count: u32,
    /// Cooperative cancellation flag, honoured between stage attempts.
    pub cancel_requested: bool,
    /// Parent batch, when the task was submitted via batch fan-out.
    pub batch_id: Option<BatchId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Bumped on every store update; guards against stale-state writes.
    pub version: u64,
}

impl TaskRecord {
    /// Create a fresh Pending record for newly admitted work.
    pub fn new(id: TaskId, mode: TryonMode, inputs: TaskInputs) -> Self {
        let now = Utc::now();
        Self {
            id,
            mode,
            inputs,
            status: TaskStatus::Pending,
            stage_progress: Vec::new(),
            artifacts: StageArtifacts::default(),
            result_ref: None,
            error: None,
            attempt_count: 0,
            cancel_requested: false,
            batch_id: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Attach the parent batch id (builder-style, used by batch fan-out).
    pub fn with_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    /// Read-only snapshot for the status API.
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            task_id: self.id,
            mode: self.mode,
            status: self.status,
            stage_progress: self.stage_progress.clone(),
            result_ref: self.result_ref.clone(),
            error: self.error.clone(),
            attempt_count: self.attempt_count,
            batch_id: self.batch_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// What the status API exposes for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub mode: TryonMode,
    pub status: TaskStatus,
    pub stage_progress: Vec<Stage>,
    pub result_ref: Option<ArtifactRef>,
    pub error: Option<TaskError>,
    pub attempt_count: u32,
    pub batch_id: Option<BatchId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One record per batch: the ordered child task ids and nothing else.
///
/// Aggregate status is derived from child records on read; storing it here
/// would let it drift out of sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: BatchId,
    pub task_ids: Vec<TaskId>,
    pub created_at: Timestamp,
}

impl BatchRecord {
    pub fn new(id: BatchId, task_ids: Vec<TaskId>) -> Self {
        Self {
            id,
            task_ids,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn inputs() -> TaskInputs {
        TaskInputs {
            model_image: "uploads/model.jpg".into(),
            garment_image: "uploads/garment.jpg".into(),
        }
    }

    #[test]
    fn new_record_starts_pending_and_empty() {
        let record = TaskRecord::new(Uuid::new_v4(), TryonMode::Tryon, inputs());
        assert_eq!(record.status, TaskStatus::Pending);
        assert!(record.stage_progress.is_empty());
        assert!(record.result_ref.is_none());
        assert!(record.error.is_none());
        assert_eq!(record.attempt_count, 0);
        assert_eq!(record.version, 0);
    }

    #[test]
    fn snapshot_mirrors_record_fields() {
        let id = Uuid::new_v4();
        let mut record = TaskRecord::new(id, TryonMode::SwapOnly, inputs());
        record.stage_progress.push(Stage::Segment);

        let snap = record.snapshot();
        assert_eq!(snap.task_id, id);
        assert_eq!(snap.mode, TryonMode::SwapOnly);
        assert_eq!(snap.stage_progress, vec![Stage::Segment]);
    }

    #[test]
    fn with_batch_links_parent() {
        let batch_id = Uuid::new_v4();
        let record =
            TaskRecord::new(Uuid::new_v4(), TryonMode::Tryon, inputs()).with_batch(batch_id);
        assert_eq!(record.batch_id, Some(batch_id));
    }
}

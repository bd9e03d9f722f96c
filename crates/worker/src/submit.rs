//! Task admission and batch fan-out (PRD-21).
//!
//! The submitter is the core side of the Submission Gateway boundary: the
//! gateway has already stored the input artifacts durably; this module only
//! records the references, creates the Pending task record, and enqueues the
//! id. Queue capacity is reserved before any record is created, so a full
//! queue rejects the submission without leaving orphaned records.

use std::sync::Arc;

use uuid::Uuid;

use tryon_core::error::CoreError;
use tryon_core::stage::TryonMode;
use tryon_core::types::{ArtifactRef, BatchId, TaskId};
use tryon_events::{EventBus, TaskEvent};
use tryon_store::{BatchRecord, BatchStore, TaskInputs, TaskRecord, TaskStore};

use crate::queue::JobQueue;

/// Admits work into the pipeline.
pub struct Submitter {
    store: Arc<TaskStore>,
    batches: Arc<BatchStore>,
    queue: Arc<JobQueue>,
    events: Arc<EventBus>,
}

impl Submitter {
    pub fn new(
        store: Arc<TaskStore>,
        batches: Arc<BatchStore>,
        queue: Arc<JobQueue>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            batches,
            queue,
            events,
        }
    }

    /// Admit a single try-on task.
    ///
    /// Preconditions: both artifact references are already durably stored.
    pub async fn submit_task(
        &self,
        inputs: TaskInputs,
        mode: TryonMode,
    ) -> Result<TaskId, CoreError> {
        let slot = self.queue.reserve().await?;

        let id = Uuid::new_v4();
        self.store.create(TaskRecord::new(id, mode, inputs)).await?;
        slot.send(id);
        self.events.publish(TaskEvent::submitted(id));

        tracing::info!(task_id = %id, mode = mode.as_str(), "Task submitted");
        Ok(id)
    }

    /// Admit one model image against N garments as N independent tasks.
    ///
    /// Every child shares the model reference read-only; the batch record
    /// stores the ordered child ids and nothing else. Admission is
    /// all-or-nothing: queue capacity for all N children is reserved before
    /// any record is created. Returns immediately; no child is awaited.
    pub async fn submit_batch(
        &self,
        model_image: ArtifactRef,
        garment_images: Vec<ArtifactRef>,
        mode: TryonMode,
    ) -> Result<(BatchId, Vec<TaskId>), CoreError> {
        if garment_images.is_empty() {
            return Err(CoreError::Validation(
                "A batch requires at least one garment image".to_string(),
            ));
        }

        let slots = self.queue.reserve_many(garment_images.len()).await?;

        let batch_id = Uuid::new_v4();
        let mut task_ids = Vec::with_capacity(garment_images.len());

        for (garment_image, slot) in garment_images.into_iter().zip(slots) {
            let id = Uuid::new_v4();
            let record = TaskRecord::new(
                id,
                mode,
                TaskInputs {
                    model_image: model_image.clone(),
                    garment_image,
                },
            )
            .with_batch(batch_id);

            self.store.create(record).await?;
            slot.send(id);
            self.events.publish(TaskEvent::submitted(id));
            task_ids.push(id);
        }

        self.batches
            .create(BatchRecord::new(batch_id, task_ids.clone()))
            .await?;

        tracing::info!(
            batch_id = %batch_id,
            children = task_ids.len(),
            mode = mode.as_str(),
            "Batch submitted",
        );
        Ok((batch_id, task_ids))
    }

    /// Explicitly retry a failed task: reset attempt state and re-enqueue.
    ///
    /// Stage progress survives the reset, so execution resumes from the
    /// last stage that completed.
    pub async fn retry_task(&self, id: TaskId) -> Result<(), CoreError> {
        let slot = self.queue.reserve().await?;
        self.store.reset_for_retry(id).await?;
        slot.send(id);
        self.events.publish(TaskEvent::submitted(id));

        tracing::info!(task_id = %id, "Task re-enqueued for retry");
        Ok(())
    }
}

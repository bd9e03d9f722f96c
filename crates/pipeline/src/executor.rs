//! The pipeline executor state machine (PRD-20).
//!
//! Runs the ordered stage sequence for one claimed task. After each stage
//! succeeds, `stage_progress` and the accumulated artifacts are persisted
//! before the next stage starts, so a later retry resumes from the last
//! known-good stage instead of restarting from scratch.
//!
//! Retry policy: transient stage errors are re-attempted with exponential
//! backoff up to the configured ceiling; permanent errors short-circuit to
//! Failed without consuming the remaining budget. Cancellation is honoured
//! between stage attempts, never mid-call.

use std::sync::Arc;

use tryon_core::error::{CoreError, StageError, StageErrorKind, TaskError};
use tryon_core::retry::RetryPolicy;
use tryon_core::stage::{Stage, StageArtifacts};
use tryon_core::status::TaskStatus;
use tryon_core::types::TaskId;
use tryon_events::{EventBus, TaskEvent};
use tryon_store::{TaskInputs, TaskRecord, TaskStore};

use crate::stage_runner::StageRunner;

/// Drives one task at a time through its stage sequence.
///
/// Cheap to clone-share via `Arc`; one instance serves the whole worker
/// pool since all per-task state lives in the store.
pub struct PipelineExecutor {
    store: Arc<TaskStore>,
    stages: Arc<dyn StageRunner>,
    retry: RetryPolicy,
    events: Arc<EventBus>,
}

impl PipelineExecutor {
    pub fn new(
        store: Arc<TaskStore>,
        stages: Arc<dyn StageRunner>,
        retry: RetryPolicy,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            stages,
            retry,
            events,
        }
    }

    /// Execute the task to a terminal state.
    ///
    /// The caller must already hold execution rights (the task must be
    /// Running — see `TaskStore::claim_running`). On return the store has
    /// been updated to Completed or Failed; the returned status is for the
    /// caller's logging only.
    ///
    /// Errors are infrastructure-level only (unknown id, lost claim); all
    /// stage failures are recorded on the task record, never propagated.
    pub async fn execute(&self, id: TaskId) -> Result<TaskStatus, CoreError> {
        let mut task = self.store.get(id).await?;
        if task.status != TaskStatus::Running {
            return Err(CoreError::Conflict(format!(
                "Executor invoked for task {id} in {} state; claim it first",
                task.status.as_str(),
            )));
        }

        let sequence = Stage::sequence_for(task.mode);
        tracing::debug!(
            task_id = %id,
            mode = task.mode.as_str(),
            stages = sequence.len(),
            resumed = task.stage_progress.len(),
            "Pipeline execution started",
        );

        for &stage in sequence {
            // Resume support: skip stages a previous attempt already
            // persisted as complete.
            if task.stage_progress.contains(&stage) {
                continue;
            }

            task = match self.run_stage_with_retry(stage, task).await? {
                StageOutcome::Advanced(task) => task,
                StageOutcome::TaskFailed => return Ok(TaskStatus::Failed),
            };
        }

        // Completed and result_ref become visible in one atomic update.
        let output = task.artifacts.output.clone().ok_or_else(|| {
            CoreError::Internal(format!(
                "Task {id} finished all stages without an output artifact"
            ))
        })?;
        self.store
            .update(id, Some(TaskStatus::Running), |t| {
                t.status = TaskStatus::Completed;
                t.result_ref = Some(output.clone());
            })
            .await?;
        self.events.publish(TaskEvent::completed(id, output));

        tracing::info!(task_id = %id, "Pipeline completed");
        Ok(TaskStatus::Completed)
    }

    /// Run one stage to success or terminal task failure.
    async fn run_stage_with_retry(
        &self,
        stage: Stage,
        mut task: TaskRecord,
    ) -> Result<StageOutcome, CoreError> {
        let id = task.id;

        loop {
            // Cancellation is checked between attempts; in-progress stage
            // work is never interrupted mid-call.
            if task.cancel_requested {
                return self.fail(id, TaskError::cancelled()).await;
            }

            let attempt = task.attempt_count + 1;
            let delay = self.retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
                // A cancel may have arrived while backing off.
                task = self.store.get(id).await?;
                if task.cancel_requested {
                    return self.fail(id, TaskError::cancelled()).await;
                }
            }

            task = self
                .store
                .update(id, Some(TaskStatus::Running), |t| t.attempt_count += 1)
                .await?;

            match self
                .run_stage(stage, &task.inputs, &task.artifacts)
                .await
            {
                Ok(artifacts) => {
                    let updated = self
                        .store
                        .update(id, Some(TaskStatus::Running), |t| {
                            t.artifacts = artifacts.clone();
                            t.stage_progress.push(stage);
                            t.attempt_count = 0;
                        })
                        .await?;
                    self.events.publish(TaskEvent::stage_completed(id, stage));
                    tracing::debug!(task_id = %id, stage = stage.as_str(), "Stage completed");
                    return Ok(StageOutcome::Advanced(updated));
                }
                Err(err)
                    if err.kind == StageErrorKind::Transient
                        && self.retry.allows_retry(task.attempt_count) =>
                {
                    tracing::warn!(
                        task_id = %id,
                        stage = stage.as_str(),
                        attempt = task.attempt_count,
                        max_attempts = self.retry.max_attempts,
                        error = %err,
                        "Transient stage failure, will retry",
                    );
                }
                Err(err) => {
                    let error = match err.kind {
                        StageErrorKind::Permanent => TaskError::permanent(stage, err.detail),
                        StageErrorKind::Transient => TaskError::retries_exhausted(
                            stage,
                            format!(
                                "{} attempts failed, last error: {}",
                                task.attempt_count, err.detail,
                            ),
                        ),
                    };
                    return self.fail(id, error).await;
                }
            }
        }
    }

    /// Invoke one stage function with exactly its declared inputs.
    ///
    /// A missing predecessor output is a permanent error: retrying cannot
    /// conjure artifacts a prior stage never produced.
    async fn run_stage(
        &self,
        stage: Stage,
        inputs: &TaskInputs,
        artifacts: &StageArtifacts,
    ) -> Result<StageArtifacts, StageError> {
        let mut next = artifacts.clone();
        match stage {
            Stage::Segment => {
                next.masks = Some(self.stages.segment(&inputs.model_image).await?);
            }
            Stage::Synthesize => {
                let masks = next.masks.as_ref().ok_or_else(|| {
                    StageError::permanent("synthesize requires masks from the segment stage")
                })?;
                next.composite = Some(
                    self.stages
                        .synthesize(&inputs.model_image, &inputs.garment_image, masks)
                        .await?,
                );
            }
            Stage::RestoreFace => {
                let composite = next.composite.clone().ok_or_else(|| {
                    StageError::permanent("restore_face requires the synthesized composite")
                })?;
                next.composite = Some(
                    self.stages
                        .restore_face(&inputs.model_image, &composite)
                        .await?,
                );
            }
            Stage::Watermark => {
                let composite = next.composite.clone().ok_or_else(|| {
                    StageError::permanent("watermark requires the synthesized composite")
                })?;
                next.output = Some(self.stages.watermark(&composite).await?);
            }
        }
        Ok(next)
    }

    /// Record a terminal failure and publish the event.
    async fn fail(&self, id: TaskId, error: TaskError) -> Result<StageOutcome, CoreError> {
        tracing::warn!(
            task_id = %id,
            kind = error.kind.as_str(),
            stage = error.stage.map(|s| s.as_str()).unwrap_or("-"),
            detail = %error.detail,
            "Task failed",
        );
        self.store.mark_failed(id, error.clone()).await?;
        self.events.publish(TaskEvent::failed(id, error));
        Ok(StageOutcome::TaskFailed)
    }
}

/// Result of driving one stage.
enum StageOutcome {
    /// Stage persisted; continue with the refreshed record.
    Advanced(TaskRecord),
    /// The task reached Failed; stop the sequence.
    TaskFailed,
}

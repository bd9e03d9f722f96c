//! Fixed-size worker pool (PRD-19).
//!
//! Each worker loops: dequeue, claim exclusive execution rights, invoke the
//! pipeline executor. The claim is the double-dispatch guard: if the store
//! reports the task already Running or terminal, the worker skips it.
//!
//! Shutdown is a graceful drain. The cancellation token only interrupts the
//! dequeue wait, never an in-flight execution, so every claimed task reaches
//! a terminal state before its worker exits.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tryon_core::error::{CoreError, TaskError, TaskErrorKind};
use tryon_core::types::TaskId;
use tryon_pipeline::PipelineExecutor;
use tryon_store::TaskStore;

use crate::queue::JobQueue;

/// Default number of concurrent workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Handle to a running pool of pipeline workers.
pub struct WorkerPool {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` executor loops sharing one queue and one store.
    pub fn spawn(
        workers: usize,
        queue: Arc<JobQueue>,
        store: Arc<TaskStore>,
        executor: Arc<PipelineExecutor>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handles = (0..workers)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let store = Arc::clone(&store);
                let executor = Arc::clone(&executor);
                let cancel = cancel.clone();
                tokio::spawn(worker_loop(worker_id, queue, store, executor, cancel))
            })
            .collect();

        tracing::info!(workers, "Worker pool started");
        Self { cancel, handles }
    }

    /// Gracefully drain the pool: stop dequeuing, let in-flight tasks reach
    /// a terminal state, then join every worker.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task panicked during shutdown");
            }
        }
        tracing::info!("Worker pool drained");
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<JobQueue>,
    store: Arc<TaskStore>,
    executor: Arc<PipelineExecutor>,
    cancel: CancellationToken,
) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        // Only the idle wait races against shutdown; once a task id is
        // taken it is processed to a terminal state.
        let task_id = tokio::select! {
            _ = cancel.cancelled() => break,
            next = queue.dequeue() => match next {
                Some(id) => id,
                None => break,
            },
        };

        process_task(worker_id, task_id, &store, &executor).await;
    }

    tracing::debug!(worker_id, "Worker stopped");
}

/// Claim and execute one task.
async fn process_task(
    worker_id: usize,
    task_id: TaskId,
    store: &TaskStore,
    executor: &PipelineExecutor,
) {
    match store.claim_running(task_id).await {
        Ok(_) => {}
        Err(CoreError::Conflict(reason)) => {
            // Another worker holds (or held) execution rights.
            tracing::warn!(worker_id, task_id = %task_id, %reason, "Skipping task");
            return;
        }
        Err(e) => {
            tracing::error!(worker_id, task_id = %task_id, error = %e, "Failed to claim task");
            return;
        }
    }

    tracing::info!(worker_id, task_id = %task_id, "Task claimed");

    match executor.execute(task_id).await {
        Ok(status) => {
            tracing::info!(worker_id, task_id = %task_id, status = status.as_str(), "Task finished");
        }
        Err(e) => {
            // Infrastructure error out of the executor: the task would stay
            // Running forever, so record the failure best-effort.
            tracing::error!(worker_id, task_id = %task_id, error = %e, "Executor error");
            let error = TaskError {
                kind: TaskErrorKind::Permanent,
                stage: None,
                detail: format!("Internal executor error: {e}"),
            };
            if let Err(mark_err) = store.mark_failed(task_id, error).await {
                tracing::error!(task_id = %task_id, error = %mark_err, "Failed to record executor error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use uuid::Uuid;

    use tryon_core::error::StageError;
    use tryon_core::retry::RetryPolicy;
    use tryon_core::stage::{MaskSet, TryonMode};
    use tryon_core::status::TaskStatus;
    use tryon_core::types::ArtifactRef;
    use tryon_events::EventBus;
    use tryon_pipeline::{StageRunner, StubRunner};
    use tryon_store::{TaskInputs, TaskRecord};

    use super::*;
    use crate::queue::EnqueuePolicy;

    async fn new_task(store: &TaskStore) -> TaskId {
        let id = Uuid::new_v4();
        let record = TaskRecord::new(
            id,
            TryonMode::Tryon,
            TaskInputs {
                model_image: format!("uploads/{id}_model.jpg"),
                garment_image: format!("uploads/{id}_garment.jpg"),
            },
        );
        store.create(record).await.unwrap();
        id
    }

    fn executor_with(
        store: &Arc<TaskStore>,
        runner: Arc<dyn StageRunner>,
    ) -> Arc<PipelineExecutor> {
        Arc::new(PipelineExecutor::new(
            Arc::clone(store),
            runner,
            RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
                multiplier: 2.0,
            },
            Arc::new(EventBus::default()),
        ))
    }

    /// Poll the store until every task is terminal or the deadline passes.
    async fn wait_terminal(store: &TaskStore, ids: &[TaskId]) {
        for _ in 0..500 {
            let mut all_done = true;
            for id in ids {
                if !store.get(*id).await.unwrap().status.is_terminal() {
                    all_done = false;
                    break;
                }
            }
            if all_done {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("tasks did not reach a terminal state in time");
    }

    #[tokio::test]
    async fn saturated_queue_drains_through_pool() {
        let store = Arc::new(TaskStore::new());
        let queue = Arc::new(JobQueue::new(32, EnqueuePolicy::FailFast));
        let executor = executor_with(&store, Arc::new(StubRunner));

        let mut ids = Vec::new();
        for _ in 0..10 {
            let id = Uuid::new_v4();
            let record = TaskRecord::new(
                id,
                TryonMode::Tryon,
                TaskInputs {
                    model_image: "uploads/m.jpg".into(),
                    garment_image: format!("uploads/{id}.jpg"),
                },
            );
            store.create(record).await.unwrap();
            queue.enqueue(id).await.unwrap();
            ids.push(id);
        }

        let pool = WorkerPool::spawn(4, Arc::clone(&queue), Arc::clone(&store), executor);
        wait_terminal(&store, &ids).await;
        pool.shutdown().await;

        for id in ids {
            let task = store.get(id).await.unwrap();
            assert_eq!(task.status, TaskStatus::Completed);
            assert!(task.result_ref.is_some());
        }
    }

    #[tokio::test]
    async fn duplicate_dispatch_executes_once() {
        let store = Arc::new(TaskStore::new());
        let queue = Arc::new(JobQueue::new(8, EnqueuePolicy::FailFast));

        /// Counts segment invocations per task (via the garment path).
        struct CountingRunner {
            inner: StubRunner,
            segment_calls: std::sync::Mutex<usize>,
        }

        #[async_trait]
        impl StageRunner for CountingRunner {
            async fn segment(&self, model_image: &str) -> Result<MaskSet, StageError> {
                *self.segment_calls.lock().unwrap() += 1;
                self.inner.segment(model_image).await
            }
            async fn synthesize(
                &self,
                model_image: &str,
                garment_image: &str,
                masks: &MaskSet,
            ) -> Result<ArtifactRef, StageError> {
                self.inner.synthesize(model_image, garment_image, masks).await
            }
            async fn restore_face(
                &self,
                model_image: &str,
                composite: &str,
            ) -> Result<ArtifactRef, StageError> {
                self.inner.restore_face(model_image, composite).await
            }
            async fn watermark(&self, composite: &str) -> Result<ArtifactRef, StageError> {
                self.inner.watermark(composite).await
            }
        }

        let runner = Arc::new(CountingRunner {
            inner: StubRunner,
            segment_calls: std::sync::Mutex::new(0),
        });
        let executor = executor_with(&store, Arc::clone(&runner) as _);

        let id = Uuid::new_v4();
        store
            .create(TaskRecord::new(
                id,
                TryonMode::SwapOnly,
                TaskInputs {
                    model_image: "uploads/m.jpg".into(),
                    garment_image: "uploads/g.jpg".into(),
                },
            ))
            .await
            .unwrap();

        // The same id dispatched twice: the claim guard must reject one.
        queue.enqueue(id).await.unwrap();
        queue.enqueue(id).await.unwrap();

        let pool = WorkerPool::spawn(2, Arc::clone(&queue), Arc::clone(&store), executor);
        wait_terminal(&store, &[id]).await;
        // Give the losing worker time to observe its Conflict and move on.
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.shutdown().await;

        assert_eq!(*runner.segment_calls.lock().unwrap(), 1);
        assert_eq!(
            store.get(id).await.unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn shutdown_drains_in_flight_task() {
        let store = Arc::new(TaskStore::new());
        let queue = Arc::new(JobQueue::new(4, EnqueuePolicy::FailFast));

        /// Stub that is slow enough for shutdown to land mid-task.
        struct SlowRunner(StubRunner);

        #[async_trait]
        impl StageRunner for SlowRunner {
            async fn segment(&self, model_image: &str) -> Result<MaskSet, StageError> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.0.segment(model_image).await
            }
            async fn synthesize(
                &self,
                model_image: &str,
                garment_image: &str,
                masks: &MaskSet,
            ) -> Result<ArtifactRef, StageError> {
                self.0.synthesize(model_image, garment_image, masks).await
            }
            async fn restore_face(
                &self,
                model_image: &str,
                composite: &str,
            ) -> Result<ArtifactRef, StageError> {
                self.0.restore_face(model_image, composite).await
            }
            async fn watermark(&self, composite: &str) -> Result<ArtifactRef, StageError> {
                self.0.watermark(composite).await
            }
        }

        let executor = executor_with(&store, Arc::new(SlowRunner(StubRunner)));

        let id = Uuid::new_v4();
        store
            .create(TaskRecord::new(
                id,
                TryonMode::SwapOnly,
                TaskInputs {
                    model_image: "uploads/m.jpg".into(),
                    garment_image: "uploads/g.jpg".into(),
                },
            ))
            .await
            .unwrap();
        queue.enqueue(id).await.unwrap();

        let pool = WorkerPool::spawn(1, Arc::clone(&queue), Arc::clone(&store), executor);

        // Wait until the worker has claimed the task.
        for _ in 0..100 {
            if store.get(id).await.unwrap().status == TaskStatus::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(store.get(id).await.unwrap().status, TaskStatus::Running);

        // Shutdown must wait for the in-flight task, not abandon it.
        pool.shutdown().await;
        assert_eq!(
            store.get(id).await.unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn queued_but_unclaimed_tasks_stay_pending_after_shutdown() {
        let store = Arc::new(TaskStore::new());
        let queue = Arc::new(JobQueue::new(8, EnqueuePolicy::FailFast));
        let executor = executor_with(&store, Arc::new(StubRunner));

        // Pool with zero capacity to pick anything up.
        let pool = WorkerPool::spawn(1, Arc::clone(&queue), Arc::clone(&store), executor);
        pool.shutdown().await;

        // Enqueued after shutdown: nothing will claim it.
        let id = new_task(&store).await;
        queue.enqueue(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(store.get(id).await.unwrap().status, TaskStatus::Pending);
    }
}

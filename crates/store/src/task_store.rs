//! Synchronized keyed task store with atomic per-key updates (PRD-18).
//!
//! Records live in a fixed array of shards, each guarded by its own
//! `tokio::sync::RwLock`. Updates to the same task id serialize on the
//! shard's write lock; updates to tasks in different shards proceed
//! independently — there is deliberately no single global lock over the
//! whole map.

use std::collections::HashMap;

use tokio::sync::RwLock;

use tryon_core::error::{CoreError, TaskError};
use tryon_core::status::TaskStatus;
use tryon_core::types::TaskId;

use crate::task::TaskRecord;

/// Number of lock shards. Sixteen keeps contention negligible for any
/// realistic worker count while the per-shard maps stay cheap to allocate.
const SHARD_COUNT: usize = 16;

/// Durable key-value record of task state; the source of truth for polling.
pub struct TaskStore {
    shards: Vec<RwLock<HashMap<TaskId, TaskRecord>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self { shards }
    }

    fn shard(&self, id: &TaskId) -> &RwLock<HashMap<TaskId, TaskRecord>> {
        let index = (id.as_u128() % SHARD_COUNT as u128) as usize;
        &self.shards[index]
    }

    /// Insert a new record.
    ///
    /// Fails with [`CoreError::AlreadyExists`] when the id is taken; the
    /// existing record is left untouched.
    pub async fn create(&self, record: TaskRecord) -> Result<(), CoreError> {
        let mut shard = self.shard(&record.id).write().await;
        if shard.contains_key(&record.id) {
            return Err(CoreError::AlreadyExists {
                entity: "Task",
                id: record.id,
            });
        }
        shard.insert(record.id, record);
        Ok(())
    }

    /// Fetch a copy of the record for `id`.
    pub async fn get(&self, id: TaskId) -> Result<TaskRecord, CoreError> {
        let shard = self.shard(&id).read().await;
        shard
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound { entity: "Task", id })
    }

    /// Atomically transform the record for `id`.
    ///
    /// The closure runs on a copy under the shard's write lock; the copy
    /// replaces the stored record only after validation, with `version`
    /// bumped and `updated_at` refreshed. Returns the committed record.
    ///
    /// - `expected_status`: when set, the update is rejected with
    ///   [`CoreError::Conflict`] unless the current status matches. This
    ///   guards against stale writes after a concurrent retry.
    /// - A status change that violates the monotonic transition rules of
    ///   [`TaskStatus::can_transition_to`] is rejected with `Conflict`.
    pub async fn update<F>(
        &self,
        id: TaskId,
        expected_status: Option<TaskStatus>,
        mutate: F,
    ) -> Result<TaskRecord, CoreError>
    where
        F: FnOnce(&mut TaskRecord),
    {
        let mut shard = self.shard(&id).write().await;
        let entry = shard
            .get_mut(&id)
            .ok_or(CoreError::NotFound { entity: "Task", id })?;

        if let Some(expected) = expected_status {
            if entry.status != expected {
                return Err(CoreError::Conflict(format!(
                    "Task {id} is {}, expected {}",
                    entry.status.as_str(),
                    expected.as_str(),
                )));
            }
        }

        let mut updated = entry.clone();
        mutate(&mut updated);

        if updated.status != entry.status && !entry.status.can_transition_to(updated.status) {
            return Err(CoreError::Conflict(format!(
                "Illegal status transition {} -> {} for task {id}",
                entry.status.as_str(),
                updated.status.as_str(),
            )));
        }

        updated.version = entry.version + 1;
        updated.updated_at = chrono::Utc::now();
        *entry = updated;
        Ok(entry.clone())
    }

    /// Claim execution rights: `Pending -> Running`.
    ///
    /// Exactly one caller wins; every other claimant observes `Conflict`
    /// and must not execute the task. This is the double-dispatch guard.
    pub async fn claim_running(&self, id: TaskId) -> Result<TaskRecord, CoreError> {
        self.update(id, Some(TaskStatus::Pending), |task| {
            task.status = TaskStatus::Running;
        })
        .await
    }

    /// Request cooperative cancellation.
    ///
    /// The executor honours the flag between stage attempts. Rejected with
    /// `Conflict` once the task is terminal.
    pub async fn request_cancel(&self, id: TaskId) -> Result<TaskRecord, CoreError> {
        let mut shard = self.shard(&id).write().await;
        let entry = shard
            .get_mut(&id)
            .ok_or(CoreError::NotFound { entity: "Task", id })?;

        if entry.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Task {id} is already {}",
                entry.status.as_str(),
            )));
        }

        entry.cancel_requested = true;
        entry.version += 1;
        entry.updated_at = chrono::Utc::now();
        Ok(entry.clone())
    }

    /// Explicit bounded retry: return a Failed task to Pending.
    ///
    /// Resets attempt state (`attempt_count`, `error`, `cancel_requested`)
    /// but keeps `stage_progress` and `artifacts`, so re-execution resumes
    /// from the last stage that completed rather than from scratch. This is
    /// the only path out of a terminal state and intentionally bypasses the
    /// monotonic transition check in [`TaskStore::update`].
    pub async fn reset_for_retry(&self, id: TaskId) -> Result<TaskRecord, CoreError> {
        let mut shard = self.shard(&id).write().await;
        let entry = shard
            .get_mut(&id)
            .ok_or(CoreError::NotFound { entity: "Task", id })?;

        if entry.status != TaskStatus::Failed {
            return Err(CoreError::Conflict(format!(
                "Only failed tasks can be retried; task {id} is {}",
                entry.status.as_str(),
            )));
        }

        entry.status = TaskStatus::Pending;
        entry.error = None;
        entry.attempt_count = 0;
        entry.cancel_requested = false;
        entry.version += 1;
        entry.updated_at = chrono::Utc::now();

        tracing::info!(
            task_id = %id,
            resumed_stages = entry.stage_progress.len(),
            "Task reset for retry",
        );
        Ok(entry.clone())
    }

    /// Record a terminal failure with structured detail.
    ///
    /// Accepts tasks in Pending (cancelled before claim) or Running state.
    pub async fn mark_failed(&self, id: TaskId, error: TaskError) -> Result<TaskRecord, CoreError> {
        self.update(id, None, |task| {
            task.status = TaskStatus::Failed;
            task.error = Some(error);
        })
        .await
    }

    /// Number of records currently tracked.
    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().await.len();
        }
        total
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use uuid::Uuid;

    use tryon_core::stage::TryonMode;

    use super::*;
    use crate::task::TaskInputs;

    fn record(id: TaskId) -> TaskRecord {
        TaskRecord::new(
            id,
            TryonMode::Tryon,
            TaskInputs {
                model_image: format!("uploads/{id}_model.jpg"),
                garment_image: format!("uploads/{id}_garment.jpg"),
            },
        )
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.create(record(id)).await.unwrap();

        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.create(record(id)).await.unwrap();

        let err = store.create(record(id)).await.unwrap_err();
        assert_matches!(err, CoreError::AlreadyExists { entity: "Task", .. });
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let store = TaskStore::new();
        let err = store.get(Uuid::new_v4()).await.unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "Task", .. });
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.create(record(id)).await.unwrap();

        let updated = store
            .update(id, None, |task| task.attempt_count += 1)
            .await
            .unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.attempt_count, 1);
    }

    #[tokio::test]
    async fn update_with_stale_expected_status_conflicts() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.create(record(id)).await.unwrap();
        store.claim_running(id).await.unwrap();

        let err = store
            .update(id, Some(TaskStatus::Pending), |task| {
                task.attempt_count += 1;
            })
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn claim_running_admits_exactly_one_claimant() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.create(record(id)).await.unwrap();

        assert!(store.claim_running(id).await.is_ok());
        let err = store.claim_running(id).await.unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected_and_not_committed() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.create(record(id)).await.unwrap();

        // Pending -> Completed skips Running and must be rejected.
        let err = store
            .update(id, None, |task| task.status = TaskStatus::Completed)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));

        let current = store.get(id).await.unwrap();
        assert_eq!(current.status, TaskStatus::Pending);
        assert_eq!(current.version, 0);
    }

    #[tokio::test]
    async fn terminal_status_cannot_be_left_via_update() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.create(record(id)).await.unwrap();
        store.claim_running(id).await.unwrap();
        store
            .mark_failed(id, TaskError::cancelled())
            .await
            .unwrap();

        let err = store
            .update(id, None, |task| task.status = TaskStatus::Running)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn cancel_sets_flag_until_terminal() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.create(record(id)).await.unwrap();

        let updated = store.request_cancel(id).await.unwrap();
        assert!(updated.cancel_requested);

        store.claim_running(id).await.unwrap();
        store
            .mark_failed(id, TaskError::cancelled())
            .await
            .unwrap();

        let err = store.request_cancel(id).await.unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn reset_for_retry_clears_attempts_keeps_progress() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.create(record(id)).await.unwrap();
        store.claim_running(id).await.unwrap();
        store
            .update(id, None, |task| {
                task.stage_progress
                    .push(tryon_core::stage::Stage::Segment);
                task.attempt_count = 3;
            })
            .await
            .unwrap();
        store
            .mark_failed(
                id,
                TaskError::retries_exhausted(tryon_core::stage::Stage::Synthesize, "3 attempts"),
            )
            .await
            .unwrap();

        let reset = store.reset_for_retry(id).await.unwrap();
        assert_eq!(reset.status, TaskStatus::Pending);
        assert_eq!(reset.attempt_count, 0);
        assert!(reset.error.is_none());
        assert_eq!(
            reset.stage_progress,
            vec![tryon_core::stage::Stage::Segment]
        );
    }

    #[tokio::test]
    async fn reset_for_retry_requires_failed_status() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.create(record(id)).await.unwrap();

        let err = store.reset_for_retry(id).await.unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn concurrent_updates_to_one_id_all_commit() {
        let store = Arc::new(TaskStore::new());
        let id = Uuid::new_v4();
        store.create(record(id)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .update(id, None, |task| task.attempt_count += 1)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let current = store.get(id).await.unwrap();
        // No lost updates: every increment and version bump landed.
        assert_eq!(current.attempt_count, 50);
        assert_eq!(current.version, 50);
    }

    #[tokio::test]
    async fn len_counts_across_shards() {
        let store = TaskStore::new();
        for _ in 0..40 {
            store.create(record(Uuid::new_v4())).await.unwrap();
        }
        assert_eq!(store.len().await, 40);
        assert!(!store.is_empty().await);
    }
}

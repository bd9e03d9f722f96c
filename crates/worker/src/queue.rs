//! Bounded job queue decoupling submission from execution (PRD-19).
//!
//! Backed by a bounded `tokio::sync::mpsc` channel of task ids. Admission
//! is two-phase: callers reserve a [`QueueSlot`] first and only then create
//! the task record, so a full queue can never leave an orphaned Pending
//! record behind. The full-queue behaviour is explicit configuration:
//! [`EnqueuePolicy::Block`] applies backpressure, [`EnqueuePolicy::FailFast`]
//! surfaces [`CoreError::QueueFull`] to the caller.

use tokio::sync::mpsc;
use tokio::sync::Mutex;

use tryon_core::error::CoreError;
use tryon_core::types::TaskId;

/// What `enqueue` does when the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueuePolicy {
    /// Wait for a slot to free up (backpressure on the submitter).
    Block,
    /// Fail immediately with `QueueFull`.
    FailFast,
}

impl EnqueuePolicy {
    /// Parse a policy from its configuration string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "block" => Some(EnqueuePolicy::Block),
            "fail_fast" => Some(EnqueuePolicy::FailFast),
            _ => None,
        }
    }
}

/// A reserved queue slot: capacity held for exactly one task id.
///
/// Dropping the slot without sending releases the capacity.
pub struct QueueSlot {
    permit: mpsc::OwnedPermit<TaskId>,
}

impl std::fmt::Debug for QueueSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSlot").finish_non_exhaustive()
    }
}

impl QueueSlot {
    /// Consume the slot, placing the task id on the queue.
    pub fn send(self, id: TaskId) {
        self.permit.send(id);
    }
}

/// Bounded multi-producer queue with a shared consumer end.
pub struct JobQueue {
    tx: mpsc::Sender<TaskId>,
    rx: Mutex<mpsc::Receiver<TaskId>>,
    policy: EnqueuePolicy,
    depth: usize,
}

impl JobQueue {
    pub fn new(depth: usize, policy: EnqueuePolicy) -> Self {
        let (tx, rx) = mpsc::channel(depth);
        Self {
            tx,
            rx: Mutex::new(rx),
            policy,
            depth,
        }
    }

    /// Reserve one slot according to the configured policy.
    pub async fn reserve(&self) -> Result<QueueSlot, CoreError> {
        let permit = match self.policy {
            EnqueuePolicy::Block => self
                .tx
                .clone()
                .reserve_owned()
                .await
                .map_err(|_| CoreError::Internal("Job queue is closed".into()))?,
            EnqueuePolicy::FailFast => {
                self.tx
                    .clone()
                    .try_reserve_owned()
                    .map_err(|err| match err {
                        mpsc::error::TrySendError::Full(_) => CoreError::QueueFull,
                        mpsc::error::TrySendError::Closed(_) => {
                            CoreError::Internal("Job queue is closed".into())
                        }
                    })?
            }
        };
        Ok(QueueSlot { permit })
    }

    /// Reserve `count` slots, all-or-nothing.
    ///
    /// Used by batch fan-out so a batch is admitted whole or rejected whole;
    /// on failure every already-reserved slot is released.
    pub async fn reserve_many(&self, count: usize) -> Result<Vec<QueueSlot>, CoreError> {
        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            // Slots accumulated so far are dropped (released) on error.
            slots.push(self.reserve().await?);
        }
        Ok(slots)
    }

    /// Reserve and immediately send in one call.
    pub async fn enqueue(&self, id: TaskId) -> Result<(), CoreError> {
        let slot = self.reserve().await?;
        slot.send(id);
        Ok(())
    }

    /// Take the next task id, waiting while the queue is empty.
    ///
    /// Consumers serialize on an internal lock; `recv` is cancel-safe so a
    /// worker abandoning the wait (shutdown) never loses a queued id.
    /// Returns `None` only once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<TaskId> {
        self.rx.lock().await.recv().await
    }

    /// Configured capacity.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Slots currently available for reservation.
    pub fn remaining_capacity(&self) -> usize {
        self.tx.capacity()
    }
}

//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`TaskEvent`]s emitted by
//! the submission gateway and the pipeline executor. It is shared via
//! `Arc<EventBus>` across the application; subscribers (status push, test
//! probes) each get an independent receiver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use tryon_core::error::TaskError;
use tryon_core::stage::Stage;
use tryon_core::types::{ArtifactRef, TaskId};

// ---------------------------------------------------------------------------
// TaskEvent
// ---------------------------------------------------------------------------

/// A task lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    /// The task was admitted and enqueued.
    Submitted { task_id: TaskId, at: DateTime<Utc> },
    /// One pipeline stage finished and its progress was persisted.
    StageCompleted {
        task_id: TaskId,
        stage: Stage,
        at: DateTime<Utc>,
    },
    /// The task completed; `result_ref` is published.
    Completed {
        task_id: TaskId,
        result_ref: ArtifactRef,
        at: DateTime<Utc>,
    },
    /// The task reached a terminal failure.
    Failed {
        task_id: TaskId,
        error: TaskError,
        at: DateTime<Utc>,
    },
}

impl TaskEvent {
    /// The task this event belongs to.
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::Submitted { task_id, .. }
            | TaskEvent::StageCompleted { task_id, .. }
            | TaskEvent::Completed { task_id, .. }
            | TaskEvent::Failed { task_id, .. } => *task_id,
        }
    }

    pub fn submitted(task_id: TaskId) -> Self {
        TaskEvent::Submitted {
            task_id,
            at: Utc::now(),
        }
    }

    pub fn stage_completed(task_id: TaskId, stage: Stage) -> Self {
        TaskEvent::StageCompleted {
            task_id,
            stage,
            at: Utc::now(),
        }
    }

    pub fn completed(task_id: TaskId, result_ref: ArtifactRef) -> Self {
        TaskEvent::Completed {
            task_id,
            result_ref,
            at: Utc::now(),
        }
    }

    pub fn failed(task_id: TaskId, error: TaskError) -> Self {
        TaskEvent::Failed {
            task_id,
            error,
            at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so any number of subscribers can
/// independently receive every published [`TaskEvent`].
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With zero subscribers the event is silently dropped; the task store
    /// remains the source of truth regardless.
    pub fn publish(&self, event: TaskEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

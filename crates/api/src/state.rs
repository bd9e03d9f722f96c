use std::sync::Arc;

use tryon_events::EventBus;
use tryon_store::{BatchStore, TaskStore};
use tryon_worker::{JobQueue, Submitter};

use crate::config::ServerConfig;
use crate::storage::UploadStore;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Task records, the source of truth for status polling.
    pub store: Arc<TaskStore>,
    /// Batch records (ordered child task ids).
    pub batches: Arc<BatchStore>,
    /// Bounded queue feeding the worker pool.
    pub queue: Arc<JobQueue>,
    /// Admission gateway (single task + batch fan-out + retry).
    pub submitter: Arc<Submitter>,
    /// Task lifecycle event bus.
    pub events: Arc<EventBus>,
    /// Persisted multipart uploads.
    pub uploads: Arc<UploadStore>,
}

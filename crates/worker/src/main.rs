//! Standalone pipeline worker service.
//!
//! Runs the queue + pool + executor wired to the stub stage runner. The
//! HTTP deployment embeds the same components in-process (see `tryon-api`);
//! this binary exists for worker-only deployments once real inference
//! backends replace the stub.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tryon_core::retry::RetryPolicy;
use tryon_events::EventBus;
use tryon_pipeline::{PipelineExecutor, StubRunner};
use tryon_store::TaskStore;
use tryon_worker::pool::DEFAULT_WORKER_COUNT;
use tryon_worker::{EnqueuePolicy, JobQueue, WorkerPool};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tryon_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let workers: usize = std::env::var("WORKER_COUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_WORKER_COUNT);
    let queue_depth: usize = std::env::var("QUEUE_DEPTH")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(64);

    let store = Arc::new(TaskStore::new());
    let queue = Arc::new(JobQueue::new(queue_depth, EnqueuePolicy::Block));
    let events = Arc::new(EventBus::default());
    let executor = Arc::new(PipelineExecutor::new(
        Arc::clone(&store),
        Arc::new(StubRunner),
        RetryPolicy::default(),
        events,
    ));

    let pool = WorkerPool::spawn(workers, queue, store, executor);
    tracing::info!(workers, queue_depth, "Try-on pipeline worker started");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received, draining worker pool");
    pool.shutdown().await;
}

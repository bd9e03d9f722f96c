use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tryon_api::config::ServerConfig;
use tryon_api::router::build_app_router;
use tryon_api::state::AppState;
use tryon_api::storage::UploadStore;
use tryon_events::EventBus;
use tryon_pipeline::{PipelineExecutor, StubRunner};
use tryon_store::{BatchStore, TaskStore};
use tryon_worker::{JobQueue, Submitter, WorkerPool};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tryon_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Upload storage ---
    let uploads = Arc::new(UploadStore::new(config.upload_dir.clone()));
    uploads
        .init()
        .await
        .expect("Failed to create upload directory");

    // --- Pipeline core ---
    let store = Arc::new(TaskStore::new());
    let batches = Arc::new(BatchStore::new());
    let queue = Arc::new(JobQueue::new(config.queue_depth, config.enqueue_policy));
    let events = Arc::new(EventBus::default());

    let executor = Arc::new(PipelineExecutor::new(
        Arc::clone(&store),
        Arc::new(StubRunner),
        config.retry.clone(),
        Arc::clone(&events),
    ));
    let pool = WorkerPool::spawn(
        config.worker_count,
        Arc::clone(&queue),
        Arc::clone(&store),
        executor,
    );

    let submitter = Arc::new(Submitter::new(
        Arc::clone(&store),
        Arc::clone(&batches),
        Arc::clone(&queue),
        Arc::clone(&events),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        batches,
        queue,
        submitter,
        events,
        uploads,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Serve ---
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid HOST/PORT combination");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    tracing::info!(%addr, "Try-on API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Drain in-flight pipeline work before exiting.
    tracing::info!("HTTP server stopped, draining worker pool");
    pool.shutdown().await;
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received");
}

use std::path::PathBuf;
use std::time::Duration;

use tryon_core::retry::RetryPolicy;
use tryon_worker::pool::DEFAULT_WORKER_COUNT;
use tryon_worker::EnqueuePolicy;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Directory where uploaded model/garment images are persisted.
    pub upload_dir: PathBuf,
    /// Number of concurrent pipeline workers.
    pub worker_count: usize,
    /// Maximum pending depth of the job queue.
    pub queue_depth: usize,
    /// Behaviour when the job queue is full at submission time.
    pub enqueue_policy: EnqueuePolicy,
    /// Retry policy applied per pipeline stage.
    pub retry: RetryPolicy,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `3000`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `UPLOAD_DIR`             | `uploads`               |
    /// | `WORKER_COUNT`           | `4`                     |
    /// | `QUEUE_DEPTH`            | `64`                    |
    /// | `ENQUEUE_POLICY`         | `fail_fast`             |
    /// | `MAX_STAGE_ATTEMPTS`     | `3`                     |
    /// | `RETRY_INITIAL_DELAY_MS` | `1000`                  |
    /// | `RETRY_MAX_DELAY_SECS`   | `30`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let upload_dir = PathBuf::from(std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()));

        let worker_count: usize = std::env::var("WORKER_COUNT")
            .unwrap_or_else(|_| DEFAULT_WORKER_COUNT.to_string())
            .parse()
            .expect("WORKER_COUNT must be a valid usize");

        let queue_depth: usize = std::env::var("QUEUE_DEPTH")
            .unwrap_or_else(|_| "64".into())
            .parse()
            .expect("QUEUE_DEPTH must be a valid usize");

        let enqueue_policy = {
            let raw = std::env::var("ENQUEUE_POLICY").unwrap_or_else(|_| "fail_fast".into());
            EnqueuePolicy::parse(&raw)
                .unwrap_or_else(|| panic!("ENQUEUE_POLICY must be 'block' or 'fail_fast', got '{raw}'"))
        };

        let max_attempts: u32 = std::env::var("MAX_STAGE_ATTEMPTS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("MAX_STAGE_ATTEMPTS must be a valid u32");

        let initial_delay_ms: u64 = std::env::var("RETRY_INITIAL_DELAY_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("RETRY_INITIAL_DELAY_MS must be a valid u64");

        let max_delay_secs: u64 = std::env::var("RETRY_MAX_DELAY_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("RETRY_MAX_DELAY_SECS must be a valid u64");

        let retry = RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_secs(max_delay_secs),
            multiplier: 2.0,
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            upload_dir,
            worker_count,
            queue_depth,
            enqueue_policy,
            retry,
        }
    }
}

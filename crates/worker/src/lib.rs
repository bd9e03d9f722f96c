//! Job queue, worker pool, and submission fan-out.
//!
//! This crate pairs a bounded queue with a fixed-size pool of executors:
//! submission reserves queue capacity before creating task records, workers
//! claim exclusive execution rights before running the pipeline, and
//! shutdown drains in-flight tasks instead of abandoning them mid-stage.

pub mod pool;
pub mod queue;
pub mod submit;

pub use pool::WorkerPool;
pub use queue::{EnqueuePolicy, JobQueue};
pub use submit::Submitter;

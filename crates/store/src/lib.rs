//! Durable task and batch state, the source of truth for status polling.
//!
//! Both stores are synchronized keyed maps with atomic per-key update
//! semantics: concurrent updates to the same identifier serialize, updates
//! to different identifiers proceed independently.

pub mod batch_store;
pub mod task;
pub mod task_store;

pub use batch_store::BatchStore;
pub use task::{BatchRecord, TaskInputs, TaskRecord, TaskSnapshot};
pub use task_store::TaskStore;

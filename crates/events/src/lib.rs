//! Task lifecycle events.

pub mod bus;

pub use bus::{EventBus, TaskEvent};

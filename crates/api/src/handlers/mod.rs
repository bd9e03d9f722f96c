//! HTTP request handlers, grouped by resource.

pub mod batch;
pub mod tasks;
pub mod tryon;

//! Keyed batch store (PRD-21).
//!
//! Batches are written once at fan-out time and only ever read afterwards,
//! so a single `RwLock` map suffices; reads never block each other.

use std::collections::HashMap;

use tokio::sync::RwLock;

use tryon_core::error::CoreError;
use tryon_core::types::BatchId;

use crate::task::BatchRecord;

/// One record per batch: the ordered list of child task identifiers.
pub struct BatchStore {
    batches: RwLock<HashMap<BatchId, BatchRecord>>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self {
            batches: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a new batch record.
    pub async fn create(&self, record: BatchRecord) -> Result<(), CoreError> {
        let mut batches = self.batches.write().await;
        if batches.contains_key(&record.id) {
            return Err(CoreError::AlreadyExists {
                entity: "Batch",
                id: record.id,
            });
        }
        batches.insert(record.id, record);
        Ok(())
    }

    /// Fetch a copy of the batch record for `id`.
    pub async fn get(&self, id: BatchId) -> Result<BatchRecord, CoreError> {
        let batches = self.batches.read().await;
        batches
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound { entity: "Batch", id })
    }
}

impl Default for BatchStore {
    fn default() -> Self {
        Self::new()
    }
}

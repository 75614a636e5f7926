//! In-memory implementation of CheckpointStore

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::store::{CheckpointStore, StoreError};

/// In-memory implementation of CheckpointStore
///
/// Useful for tests and for single-process deployments that only want
/// checkpoints to survive an instance, not the process.
///
/// # Example
///
/// ```
/// use conductor::InMemoryCheckpointStore;
///
/// let store = InMemoryCheckpointStore::new();
/// assert!(store.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    items: RwLock<HashMap<String, String>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn set_item(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.items.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.items.write().remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.items.read().keys().cloned().collect())
    }
}

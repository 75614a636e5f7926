//! CheckpointStore trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::Context;

/// Key prefix for persisted instance state
pub const CHECKPOINT_KEY_PREFIX: &str = "workflow_state_";

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend failure
    #[error("storage error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Snapshot of an instance taken after a step completes
///
/// Advisory only: a checkpoint lets a caller rebuild an instance with
/// [`WorkflowInstance::resume`](crate::engine::WorkflowInstance::resume); the
/// engine never resumes on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub instance_id: Uuid,
    pub workflow_name: String,

    /// Index of the last step (or last step of a parallel group) that finished
    pub step_index: usize,
    pub context: Context,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn key(&self) -> String {
        checkpoint_key(self.instance_id)
    }
}

pub fn checkpoint_key(instance_id: Uuid) -> String {
    format!("{CHECKPOINT_KEY_PREFIX}{instance_id}")
}

/// Durable key/value persistence for checkpoints
///
/// Shaped like a browser `localStorage`: string keys, string values.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn set_item(&self, key: &str, value: String) -> Result<(), StoreError>;

    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn remove_item(&self, key: &str) -> Result<(), StoreError>;

    /// All keys currently stored
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Serialize and store a checkpoint under its instance key
pub async fn save_checkpoint(
    store: &dyn CheckpointStore,
    checkpoint: &Checkpoint,
) -> Result<(), StoreError> {
    let value = serde_json::to_string(checkpoint)?;
    store.set_item(&checkpoint.key(), value).await
}

/// Load the checkpoint for an instance, if one exists
pub async fn load_checkpoint(
    store: &dyn CheckpointStore,
    instance_id: Uuid,
) -> Result<Option<Checkpoint>, StoreError> {
    match store.get_item(&checkpoint_key(instance_id)).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn remove_checkpoint(store: &dyn CheckpointStore, instance_id: Uuid) -> Result<(), StoreError> {
    store.remove_item(&checkpoint_key(instance_id)).await
}

/// Load every checkpoint in the store, oldest first
///
/// Entries that do not deserialize are skipped.
pub async fn list_checkpoints(store: &dyn CheckpointStore) -> Result<Vec<Checkpoint>, StoreError> {
    let mut checkpoints = Vec::new();

    for key in store.keys().await? {
        if !key.starts_with(CHECKPOINT_KEY_PREFIX) {
            continue;
        }
        let Some(raw) = store.get_item(&key).await? else {
            continue;
        };
        match serde_json::from_str::<Checkpoint>(&raw) {
            Ok(checkpoint) => checkpoints.push(checkpoint),
            Err(e) => tracing::warn!(%key, error = %e, "skipping unreadable checkpoint"),
        }
    }

    checkpoints.sort_by_key(|c| c.saved_at);
    Ok(checkpoints)
}

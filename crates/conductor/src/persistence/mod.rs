//! Persistence layer for resumable execution
//!
//! This module provides:
//! - [`CheckpointStore`] trait for key/value checkpoint persistence
//! - [`InMemoryCheckpointStore`] for tests and single-process use

mod memory;
mod store;

pub use memory::InMemoryCheckpointStore;
pub use store::{
    checkpoint_key, list_checkpoints, load_checkpoint, remove_checkpoint, save_checkpoint,
    Checkpoint, CheckpointStore, StoreError, CHECKPOINT_KEY_PREFIX,
};

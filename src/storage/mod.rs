//! Checkpoint persistence.
//!
//! The manager persists, per job, when it was last invoked and how its last
//! execution ended, so a restart resumes the schedule instead of re-running
//! every job at once. Backends implement [`CheckpointStore`].

mod file;
mod memory;

pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No checkpoint has been written yet.
    #[error("checkpoint not found: {0}")]
    NotFound(String),

    /// The checkpoint could not be read or written.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The checkpoint could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Persisted state of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCheckpoint {
    /// When the manager last admitted the job.
    pub last_invoke_time: DateTime<Utc>,
    /// When the job last finished successfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_finished: Option<DateTime<Utc>>,
    /// Outcome of the job's last execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
}

impl WorkerCheckpoint {
    /// Create an entry with only an invoke time.
    pub fn new(last_invoke_time: DateTime<Utc>) -> Self {
        Self {
            last_invoke_time,
            last_finished: None,
            result: None,
        }
    }

    /// Reported completion time, defaulting to the invoke time.
    pub fn last_finished_or_invoke(&self) -> DateTime<Utc> {
        self.last_finished.unwrap_or(self.last_invoke_time)
    }

    /// Reported result, defaulting to success.
    pub fn result_or_success(&self) -> bool {
        self.result.unwrap_or(true)
    }
}

/// Persisted state of every job, keyed by job name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub worker_info: BTreeMap<String, WorkerCheckpoint>,
}

impl Checkpoint {
    /// Create an empty checkpoint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for a job.
    pub fn get(&self, name: &str) -> Option<&WorkerCheckpoint> {
        self.worker_info.get(name)
    }

    /// Set the entry for a job.
    pub fn insert(&mut self, name: impl Into<String>, entry: WorkerCheckpoint) {
        self.worker_info.insert(name.into(), entry);
    }

    /// Number of jobs in the checkpoint.
    pub fn len(&self) -> usize {
        self.worker_info.len()
    }

    /// Check if the checkpoint has no entries.
    pub fn is_empty(&self) -> bool {
        self.worker_info.is_empty()
    }
}

/// Durable storage for the manager's checkpoint.
///
/// Implementations must be thread-safe and a `save` must never leave a
/// partially written checkpoint behind.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the last saved checkpoint.
    async fn load(&self) -> Result<Checkpoint, StorageError>;

    /// Replace the saved checkpoint.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StorageError>;
}

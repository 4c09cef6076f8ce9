//! In-memory checkpoint store.

use async_trait::async_trait;
use std::sync::RwLock;

use super::{Checkpoint, CheckpointStore, StorageError};

/// In-memory checkpoint store for testing and development.
///
/// Thread-safe storage using RwLock for concurrent access.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    checkpoint: RwLock<Option<Checkpoint>>,
    saves: RwLock<usize>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a checkpoint.
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            checkpoint: RwLock::new(Some(checkpoint)),
            saves: RwLock::new(0),
        }
    }

    /// The last saved checkpoint, if any.
    pub fn current(&self) -> Option<Checkpoint> {
        self.checkpoint.read().ok()?.clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.read().map(|n| *n).unwrap_or(0)
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self) -> Result<Checkpoint, StorageError> {
        let checkpoint = self
            .checkpoint
            .read()
            .map_err(|_| StorageError::Serialization("lock poisoned".into()))?;
        checkpoint
            .clone()
            .ok_or_else(|| StorageError::NotFound("in-memory checkpoint".into()))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let mut current = self
            .checkpoint
            .write()
            .map_err(|_| StorageError::Serialization("lock poisoned".into()))?;
        *current = Some(checkpoint.clone());
        drop(current);

        if let Ok(mut saves) = self.saves.write() {
            *saves += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::WorkerCheckpoint;
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_empty_store_is_not_found() {
        let store = InMemoryCheckpointStore::new();

        assert!(matches!(store.load().await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = InMemoryCheckpointStore::new();
        let mut checkpoint = Checkpoint::new();
        checkpoint.insert("debian", WorkerCheckpoint::new(Utc::now()));

        store.save(&checkpoint).await.unwrap();

        assert_eq!(store.load().await.unwrap(), checkpoint);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_storage_is_thread_safe() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut handles = vec![];

        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut checkpoint = Checkpoint::new();
                checkpoint.insert(format!("job_{}", i), WorkerCheckpoint::new(Utc::now()));
                store.save(&checkpoint).await.unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.save_count(), 10);
        assert_eq!(store.current().unwrap().len(), 1);
    }
}

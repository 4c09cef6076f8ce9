//! Checkpoint integration tests.
//!
//! These verify that a restarted manager resumes its schedule from disk.

use mirrorsync::testing::ScriptedExecutor;
use mirrorsync::{CheckpointStore, FileCheckpointStore, Manager, ManagerConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::common::{scripted_job, wait_until};

fn config() -> ManagerConfig {
    ManagerConfig::new(Duration::from_millis(20), 2)
}

/// Test: A job that ran before a restart is not re-run until due.
#[tokio::test]
async fn test_restart_resumes_schedule() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");

    // First life: the job has never run, so it runs right away.
    let first = ScriptedExecutor::succeeding();
    let manager = Manager::with_jobs(
        config(),
        vec![scripted_job("debian", 3600, &first)],
        Arc::new(FileCheckpointStore::new(&path)),
    )
    .await
    .unwrap();
    let (handle, task) = manager.start().await;
    let counter = first.clone();
    wait_until("the first sync", Duration::from_secs(5), || {
        counter.call_count() == 1
    })
    .await;
    handle.exit().await.unwrap();
    task.await.unwrap();

    let saved = FileCheckpointStore::new(&path).load().await.unwrap();
    let entry = saved.get("debian").expect("debian checkpointed");
    assert!(entry.last_invoke_time <= chrono::Utc::now());

    // Second life: the checkpoint says it ran moments ago.
    let second = ScriptedExecutor::succeeding();
    let manager = Manager::with_jobs(
        config(),
        vec![scripted_job("debian", 3600, &second)],
        Arc::new(FileCheckpointStore::new(&path)),
    )
    .await
    .unwrap();
    assert_eq!(manager.last_invoke("debian"), Some(entry.last_invoke_time));

    let (handle, task) = manager.start().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.exit().await.unwrap();
    task.await.unwrap();

    assert_eq!(second.call_count(), 0);
}

/// Test: Jobs missing from the checkpoint run immediately after a restart.
#[tokio::test]
async fn test_new_job_runs_after_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");

    let executor = ScriptedExecutor::succeeding();
    let manager = Manager::with_jobs(
        config(),
        vec![scripted_job("old", 3600, &executor)],
        Arc::new(FileCheckpointStore::new(&path)),
    )
    .await
    .unwrap();
    let (handle, task) = manager.start().await;
    let counter = executor.clone();
    wait_until("the old job", Duration::from_secs(5), || {
        counter.call_count() == 1
    })
    .await;
    handle.exit().await.unwrap();
    task.await.unwrap();

    let old = ScriptedExecutor::succeeding();
    let added = ScriptedExecutor::succeeding();
    let manager = Manager::with_jobs(
        config(),
        vec![
            scripted_job("old", 3600, &old),
            scripted_job("added", 3600, &added),
        ],
        Arc::new(FileCheckpointStore::new(&path)),
    )
    .await
    .unwrap();
    let (handle, task) = manager.start().await;
    let counter = added.clone();
    wait_until("the added job", Duration::from_secs(5), || {
        counter.call_count() == 1
    })
    .await;
    handle.exit().await.unwrap();
    task.await.unwrap();

    assert_eq!(old.call_count(), 0);
}

/// Test: A corrupt checkpoint is treated as empty, never fatal.
#[tokio::test]
async fn test_corrupt_checkpoint_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let executor = ScriptedExecutor::succeeding();
    let manager = Manager::with_jobs(
        config(),
        vec![scripted_job("debian", 3600, &executor)],
        Arc::new(FileCheckpointStore::new(&path)),
    )
    .await
    .unwrap();
    let (handle, task) = manager.start().await;
    let counter = executor.clone();
    wait_until("the sync", Duration::from_secs(5), || {
        counter.call_count() == 1
    })
    .await;
    handle.exit().await.unwrap();
    task.await.unwrap();

    // The startup save replaced the corrupt file.
    let saved = FileCheckpointStore::new(&path).load().await.unwrap();
    assert!(saved.get("debian").is_some());
}

//! Scheduling integration tests.
//!
//! These run the real decision loop against wall-clock time.

use mirrorsync::testing::{ConcurrencyProbe, ScriptedExecutor};
use mirrorsync::{InMemoryCheckpointStore, Job, Manager, ManagerConfig, NoopMetrics};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{descriptor, scripted_job, wait_until};

fn fast_config(limit: usize) -> ManagerConfig {
    ManagerConfig::new(Duration::from_millis(50), limit)
}

/// Test: A job with a 1s interval runs repeatedly.
#[tokio::test]
async fn test_periodic_job_runs_repeatedly() {
    let executor = ScriptedExecutor::succeeding();
    let manager = Manager::with_jobs(
        fast_config(1),
        vec![scripted_job("periodic", 1, &executor)],
        Arc::new(InMemoryCheckpointStore::new()),
    )
    .await
    .unwrap();

    let (handle, task) = manager.start().await;
    tokio::time::sleep(Duration::from_millis(3200)).await;
    handle.exit().await.unwrap();
    task.await.unwrap();

    let runs = executor.call_count();
    assert!(runs >= 2, "expected at least 2 runs, got {}", runs);
    assert!(runs <= 5, "expected at most 5 runs, got {}", runs);
}

/// Test: No more jobs run at once than the concurrency limit allows.
#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let probe = ConcurrencyProbe::new();
    let executor = ScriptedExecutor::succeeding()
        .with_delay(Duration::from_millis(150))
        .with_probe(probe.clone());
    let jobs = (0..6)
        .map(|i| scripted_job(&format!("job-{}", i), 3600, &executor))
        .collect();

    let manager = Manager::with_jobs(
        fast_config(2),
        jobs,
        Arc::new(InMemoryCheckpointStore::new()),
    )
    .await
    .unwrap();
    let (handle, task) = manager.start().await;

    let counter = executor.clone();
    wait_until("every job to run", Duration::from_secs(10), || {
        counter.call_count() >= 6
    })
    .await;
    handle.exit().await.unwrap();
    task.await.unwrap();

    assert_eq!(probe.peak(), 2);
    assert_eq!(executor.call_count(), 6);
}

/// Test: A stopped manager admits nothing until started again.
#[tokio::test]
async fn test_stopped_manager_admits_nothing() {
    let executor = ScriptedExecutor::succeeding();
    let manager = Manager::with_jobs(
        fast_config(1),
        vec![scripted_job("paused", 1, &executor)],
        Arc::new(InMemoryCheckpointStore::new()),
    )
    .await
    .unwrap();

    let (handle, task) = manager.start().await;
    handle.stop().await.unwrap();
    assert!(!handle.is_running().await);

    // A run admitted before the stop may still be finishing.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let before = executor.call_count();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(executor.call_count(), before);

    handle.start().await.unwrap();
    let counter = executor.clone();
    wait_until("a run after restart", Duration::from_secs(5), || {
        counter.call_count() > before
    })
    .await;

    handle.exit().await.unwrap();
    task.await.unwrap();
}

/// Test: A failing job is retried, then reported failed.
#[tokio::test]
async fn test_failing_job_reports_failure() {
    let executor = ScriptedExecutor::failing(u32::MAX).with_output("", "boom");
    let job = Job::new(
        descriptor("broken", 3600)
            .with("retry", 2)
            .with("retry_interval", 0),
        Arc::new(executor.clone()),
        Arc::new(NoopMetrics),
    )
    .unwrap();

    let manager = Manager::with_jobs(
        fast_config(1),
        vec![job],
        Arc::new(InMemoryCheckpointStore::new()),
    )
    .await
    .unwrap();
    let (handle, task) = manager.start().await;

    let counter = executor.clone();
    wait_until("both attempts", Duration::from_secs(5), || {
        counter.call_count() >= 2
    })
    .await;
    handle.run_specific_worker("broken").await.unwrap();

    let status = handle.status().await.workers["broken"].clone();
    assert!(!status.result);
    assert!(status.idle);
    assert_eq!(status.stderr.last().map(String::as_str), Some("boom"));

    handle.exit().await.unwrap();
    task.await.unwrap();
}

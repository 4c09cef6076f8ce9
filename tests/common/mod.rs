//! Common test utilities shared across integration tests.

use mirrorsync::testing::ScriptedExecutor;
use mirrorsync::{Job, JobDescriptor, NoopMetrics};
use std::sync::Arc;
use std::time::Duration;

/// A descriptor for a job managed by a scripted executor.
pub fn descriptor(name: &str, interval: i64) -> JobDescriptor {
    JobDescriptor::new()
        .with("name", name)
        .with("type", "shell_script")
        .with("interval", interval)
        .with("retry", 1)
}

/// A job running a clone of `executor`.
pub fn scripted_job(name: &str, interval: i64, executor: &ScriptedExecutor) -> Job {
    Job::new(
        descriptor(name, interval),
        Arc::new(executor.clone()),
        Arc::new(NoopMetrics),
    )
    .unwrap()
}

/// Wait for a condition to hold, polling every 10ms.
///
/// This is more reliable than fixed sleeps since execution time can vary.
///
/// # Panics
///
/// Panics if the timeout is reached before the condition holds.
pub async fn wait_until(what: &str, timeout: Duration, mut condition: impl FnMut() -> bool) {
    let start = tokio::time::Instant::now();
    while !condition() {
        if start.elapsed() > timeout {
            panic!("Timeout waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

//! Testing utilities for users of the mirrorsync library.
//!
//! This module provides helpers for testing scheduling behaviour without
//! spawning real sync commands:
//!
//! - [`ScriptedExecutor`]: An executor that fails N times then succeeds
//! - [`ConcurrencyProbe`]: Tracks how many executions overlap
//! - [`RecordingMetrics`]: A metrics collaborator that remembers every report

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::core::descriptor::JobDescriptor;
use crate::execution::{ExecError, ExecOutput, Executor, Hooks};
use crate::metrics::SyncMetrics;

/// Counts concurrently running executions and remembers the peak.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    inner: Arc<ProbeState>,
}

#[derive(Debug, Default)]
struct ProbeState {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    /// Create a probe with nothing running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest number of executions seen running at once.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    /// Executions running right now.
    pub fn current(&self) -> usize {
        self.inner.current.load(Ordering::SeqCst)
    }

    fn enter(&self) -> ProbeGuard<'_> {
        let now = self.inner.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        ProbeGuard { probe: self }
    }
}

struct ProbeGuard<'a> {
    probe: &'a ConcurrencyProbe,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.probe.inner.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An executor that fails a configurable number of times before succeeding.
///
/// Clones share their call history, so a test can keep one clone and hand the
/// other to a job.
///
/// # Example
///
/// ```
/// use mirrorsync::testing::ScriptedExecutor;
///
/// // Fails 2 times, then succeeds on the 3rd attempt
/// let executor = ScriptedExecutor::failing(2);
/// assert_eq!(executor.call_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedExecutor {
    state: Arc<Mutex<ScriptState>>,
    output: ExecOutput,
    delay: Duration,
    probe: Option<ConcurrencyProbe>,
}

#[derive(Debug, Default)]
struct ScriptState {
    failures_remaining: u32,
    calls: Vec<Instant>,
}

impl ScriptedExecutor {
    /// An executor that always succeeds.
    pub fn succeeding() -> Self {
        Self::failing(0)
    }

    /// An executor that fails `fail_count` times then succeeds.
    ///
    /// Pass `u32::MAX` for an executor that never succeeds.
    pub fn failing(fail_count: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                failures_remaining: fail_count,
                calls: Vec::new(),
            })),
            output: ExecOutput::default(),
            delay: Duration::ZERO,
            probe: None,
        }
    }

    /// Builder: output produced by every attempt, successful or not.
    pub fn with_output(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.output = ExecOutput::new(stdout, stderr);
        self
    }

    /// Builder: time every attempt takes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Builder: report overlapping attempts to a probe.
    pub fn with_probe(mut self, probe: ConcurrencyProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Number of attempts made so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Start time of every attempt, in order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn run_once(
        &self,
        descriptor: &JobDescriptor,
        _hooks: &Hooks,
    ) -> Result<ExecOutput, ExecError> {
        let _guard = self.probe.as_ref().map(ConcurrencyProbe::enter);

        let fail = {
            let mut state = self.lock();
            state.calls.push(Instant::now());
            if state.failures_remaining > 0 {
                if state.failures_remaining != u32::MAX {
                    state.failures_remaining -= 1;
                }
                true
            } else {
                false
            }
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if fail {
            tracing::debug!(job = descriptor.name().unwrap_or("<unnamed>"), "Scripted failure");
            Err(ExecError::CommandFailed {
                code: Some(1),
                output: self.output.clone(),
            })
        } else {
            Ok(self.output.clone())
        }
    }
}

/// A metrics collaborator that records every report.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    state: Mutex<RecordedMetrics>,
}

#[derive(Debug, Default)]
struct RecordedMetrics {
    success: BTreeMap<String, u64>,
    fail: BTreeMap<String, u64>,
    disk_usage: Vec<(String, PathBuf)>,
}

impl RecordingMetrics {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful syncs reported for a job.
    pub fn successes(&self, job: &str) -> u64 {
        self.lock().success.get(job).copied().unwrap_or(0)
    }

    /// Failed syncs reported for a job.
    pub fn failures(&self, job: &str) -> u64 {
        self.lock().fail.get(job).copied().unwrap_or(0)
    }

    /// Every disk usage refresh requested, in order.
    pub fn disk_usage_requests(&self) -> Vec<(String, PathBuf)> {
        self.lock().disk_usage.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordedMetrics> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SyncMetrics for RecordingMetrics {
    fn sync_success(&self, worker: &str) {
        *self.lock().success.entry(worker.to_string()).or_insert(0) += 1;
    }

    fn sync_fail(&self, worker: &str) {
        *self.lock().fail.entry(worker.to_string()).or_insert(0) += 1;
    }

    fn update_disk_usage(&self, worker: &str, path: &Path) {
        self.lock()
            .disk_usage
            .push((worker.to_string(), path.to_path_buf()));
    }
}

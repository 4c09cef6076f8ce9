//! Jobs and their execution loops.
//!
//! A [`Job`] pairs an immutable descriptor with a mutable [`JobStatus`] and a
//! dedicated long-lived loop that waits for triggers and runs the executor.
//!
//! ```text
//!            trigger
//!   Idle ──────────────▶ Executing ──┐ attempt failed, retries left:
//!    ▲                      │   ▲    │ sleep retry_interval
//!    │  success or retries  │   └────┘
//!    └──────exhausted───────┘
//! ```
//!
//! The loop is the only writer of the execution-related status fields. The
//! manager only ever flips `idle` to false when it admits a job, so that a
//! status read right after admission already reports the job as busy.

mod invoke;

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::core::descriptor::{DescriptorError, JobDescriptor};
use crate::core::output::OutputBuffer;
use crate::core::retry::RetryPolicy;
use crate::core::status::JobStatus;
use crate::execution::{Executor, ExecutorKind, Hooks};
use crate::metrics::SyncMetrics;

use invoke::{Invocation, execute_with_retry};

#[derive(Debug)]
struct StatusCell {
    result: bool,
    last_finished: DateTime<Utc>,
    idle: bool,
    stdout: OutputBuffer,
    stderr: OutputBuffer,
}

impl StatusCell {
    fn snapshot(&self) -> JobStatus {
        JobStatus {
            result: self.result,
            last_finished: self.last_finished,
            idle: self.idle,
            stdout: self.stdout.snapshot(),
            stderr: self.stderr.snapshot(),
        }
    }
}

/// One mirror job.
pub struct Job {
    name: String,
    descriptor: JobDescriptor,
    executor: Arc<dyn Executor>,
    external: bool,
    retry_policy: RetryPolicy,
    hooks: Hooks,
    metrics: Arc<dyn SyncMetrics>,
    status: RwLock<StatusCell>,
    trigger_tx: mpsc::UnboundedSender<u64>,
    trigger_rx: Mutex<Option<mpsc::UnboundedReceiver<u64>>>,
    /// Ticket of the last trigger issued.
    issued: Mutex<u64>,
    /// Ticket of the last trigger whose execution finished.
    completed: watch::Sender<u64>,
}

impl Job {
    /// Build a job whose executor is selected by the descriptor's `type`.
    pub fn from_descriptor(
        descriptor: JobDescriptor,
        metrics: Arc<dyn SyncMetrics>,
    ) -> Result<Self, DescriptorError> {
        let kind = ExecutorKind::from_descriptor(&descriptor)?;
        let external = kind.is_external();
        let mut job = Self::new(descriptor, Arc::new(kind), metrics)?;
        job.external = external;
        Ok(job)
    }

    /// Build a job around an arbitrary executor.
    ///
    /// The descriptor's `type` is not interpreted.
    pub fn new(
        descriptor: JobDescriptor,
        executor: Arc<dyn Executor>,
        metrics: Arc<dyn SyncMetrics>,
    ) -> Result<Self, DescriptorError> {
        let name = descriptor.name()?.to_string();
        let retry_policy = RetryPolicy::from_descriptor(&descriptor)?;
        if descriptor.has_invalid_interval() {
            tracing::warn!(
                job = %name,
                interval = ?descriptor.get(crate::core::descriptor::KEY_INTERVAL),
                "Invalid interval, falling back to the default"
            );
        }

        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let (completed, _) = watch::channel(0);

        Ok(Self {
            name,
            descriptor,
            executor,
            external: false,
            retry_policy,
            hooks: Hooks::standard(),
            metrics,
            status: RwLock::new(StatusCell {
                result: true,
                last_finished: Utc::now(),
                idle: true,
                stdout: OutputBuffer::default(),
                stderr: OutputBuffer::default(),
            }),
            trigger_tx,
            trigger_rx: Mutex::new(Some(trigger_rx)),
            issued: Mutex::new(0),
            completed,
        })
    }

    /// Builder: replace the hooks applied around every attempt.
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Seed the reported status from a checkpoint.
    pub fn restore(&self, last_finished: DateTime<Utc>, result: bool) {
        let mut status = self.write_status();
        status.last_finished = last_finished;
        status.result = result;
    }

    /// Job name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Job descriptor.
    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    /// Retry policy applied to every trigger.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Seconds between scheduled runs.
    pub fn interval(&self) -> Duration {
        self.descriptor.interval()
    }

    /// Whether the job is excluded from status reports.
    pub fn is_hidden(&self) -> bool {
        self.descriptor.is_hidden()
    }

    /// Whether the job is managed outside this engine.
    pub fn is_external(&self) -> bool {
        self.external
    }

    /// Whether no execution is in flight.
    pub fn is_idle(&self) -> bool {
        self.external || self.read_status().idle
    }

    /// Consistent copy of the job's status.
    pub fn status(&self) -> JobStatus {
        if self.external {
            return JobStatus {
                result: true,
                last_finished: Utc::now(),
                idle: true,
                stdout: Vec::new(),
                stderr: Vec::new(),
            };
        }
        self.read_status().snapshot()
    }

    /// Request an execution without waiting for it.
    ///
    /// The job reports busy from this call on. Triggers sent while an
    /// execution is in flight queue behind it.
    pub fn trigger_sync(&self) {
        if self.external {
            return;
        }
        self.send_trigger();
    }

    /// Mark the job busy and trigger it. Used by the manager on admission.
    pub(crate) fn admit(&self) {
        if self.external {
            return;
        }
        self.send_trigger();
    }

    /// Trigger an execution and wait until it has finished.
    ///
    /// Starts the job loop first if nothing has started it yet.
    pub async fn run_and_wait(self: &Arc<Self>) {
        if self.external {
            return;
        }
        self.spawn();
        let mut completed = self.completed.subscribe();
        let ticket = self.send_trigger();
        if completed.wait_for(|done| *done >= ticket).await.is_err() {
            tracing::warn!(job = %self.name, "Job loop is gone, not waiting for completion");
        }
    }

    /// Start the job loop.
    ///
    /// Returns `None` for external jobs and when the loop is already running.
    pub fn spawn(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.external {
            return None;
        }
        let rx = self
            .trigger_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        let job = Arc::clone(self);
        Some(tokio::spawn(async move { job.run_loop(rx).await }))
    }

    fn send_trigger(&self) -> u64 {
        self.write_status().idle = false;
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        *issued += 1;
        let ticket = *issued;
        if self.trigger_tx.send(ticket).is_err() {
            tracing::error!(job = %self.name, "Job loop is gone, trigger dropped");
        }
        ticket
    }

    async fn run_loop(&self, mut rx: mpsc::UnboundedReceiver<u64>) {
        tracing::debug!(job = %self.name, "Job loop started");
        while let Some(ticket) = rx.recv().await {
            self.write_status().idle = false;
            tracing::info!(job = %self.name, "Sync started");

            let invocation = execute_with_retry(
                &self.name,
                self.executor.as_ref(),
                &self.descriptor,
                &self.hooks,
                self.retry_policy,
            )
            .await;

            self.record(ticket, invocation);
        }
        tracing::debug!(job = %self.name, "Job loop stopped");
    }

    fn record(&self, ticket: u64, invocation: Invocation) {
        {
            let mut status = self.write_status();
            status.result = invocation.succeeded;
            status.stdout.push(invocation.output.stdout);
            status.stderr.push(invocation.output.stderr);
            if invocation.succeeded {
                status.last_finished = Utc::now();
            }
            status.idle = true;
        }
        tracing::info!(
            job = %self.name,
            result = invocation.succeeded,
            attempts = invocation.attempts,
            "Sync finished"
        );

        if invocation.succeeded {
            self.metrics.sync_success(&self.name);
        } else {
            self.metrics.sync_fail(&self.name);
        }
        if let Some(path) = self.descriptor.path() {
            self.metrics.update_disk_usage(&self.name, Path::new(path));
        }

        self.completed.send_modify(|done| *done = ticket);
    }

    fn read_status(&self) -> RwLockReadGuard<'_, StatusCell> {
        self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_status(&self) -> RwLockWriteGuard<'_, StatusCell> {
        self.status.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("external", &self.external)
            .field("retry_policy", &self.retry_policy)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NoopMetrics;
    use crate::testing::{RecordingMetrics, ScriptedExecutor};

    fn descriptor(name: &str) -> JobDescriptor {
        JobDescriptor::new()
            .with("name", name)
            .with("retry", 3)
            .with("retry_interval", 0)
    }

    fn job(executor: ScriptedExecutor) -> Arc<Job> {
        Arc::new(Job::new(descriptor("test"), Arc::new(executor), Arc::new(NoopMetrics)).unwrap())
    }

    #[test]
    fn test_requires_name() {
        let err = Job::new(
            JobDescriptor::new(),
            Arc::new(ScriptedExecutor::succeeding()),
            Arc::new(NoopMetrics),
        )
        .unwrap_err();

        assert_eq!(err, DescriptorError::MissingName);
    }

    #[test]
    fn test_rejects_bad_retry() {
        let d = descriptor("test").with("retry", 0);

        assert!(Job::new(d, Arc::new(ScriptedExecutor::succeeding()), Arc::new(NoopMetrics)).is_err());
    }

    #[test]
    fn test_new_job_is_idle_and_successful() {
        let job = job(ScriptedExecutor::succeeding());
        let status = job.status();

        assert!(status.idle);
        assert!(status.result);
        assert!(status.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_run_and_wait_records_success() {
        let job = job(ScriptedExecutor::succeeding().with_output("synced", ""));
        job.spawn();
        let before = job.status().last_finished;

        job.run_and_wait().await;
        let status = job.status();

        assert!(status.idle);
        assert!(status.result);
        assert!(status.last_finished >= before);
        assert_eq!(status.stdout, vec!["synced"]);
        assert_eq!(status.stderr, vec![""]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_record_failure() {
        let executor = ScriptedExecutor::failing(u32::MAX);
        let job = job(executor.clone());
        job.spawn();
        let restored = Utc::now() - chrono::Duration::days(3);
        job.restore(restored, true);

        job.run_and_wait().await;
        let status = job.status();

        assert!(status.idle);
        assert!(!status.result);
        assert_eq!(status.last_finished, restored);
        assert_eq!(executor.call_count(), 3);
    }

    #[tokio::test]
    async fn test_busy_while_executing() {
        let job = job(ScriptedExecutor::succeeding().with_delay(Duration::from_millis(200)));
        job.spawn();

        job.trigger_sync();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!job.status().idle);

        job.run_and_wait().await;
        assert!(job.status().idle);
    }

    #[tokio::test]
    async fn test_admit_marks_busy_immediately() {
        let job = job(ScriptedExecutor::succeeding().with_delay(Duration::from_millis(100)));

        job.admit();

        assert!(!job.is_idle());
    }

    #[tokio::test]
    async fn test_trigger_sync_marks_busy_before_loop_runs() {
        let executor = ScriptedExecutor::succeeding();
        let job = job(executor.clone());

        job.trigger_sync();
        assert!(!job.is_idle());
        assert_eq!(executor.call_count(), 0);

        job.spawn();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !job.is_idle() {
            assert!(tokio::time::Instant::now() < deadline, "job never became idle");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(executor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_run_and_wait_starts_the_loop() {
        let executor = ScriptedExecutor::succeeding().with_output("synced", "");
        let job = job(executor.clone());

        tokio::time::timeout(Duration::from_secs(5), job.run_and_wait())
            .await
            .expect("run_and_wait never returned");

        assert_eq!(executor.call_count(), 1);
        assert!(job.status().idle);
        assert!(job.spawn().is_none());
    }

    #[tokio::test]
    async fn test_manual_triggers_queue_behind_execution() {
        let executor = ScriptedExecutor::succeeding().with_delay(Duration::from_millis(50));
        let job = job(executor.clone());
        job.spawn();

        job.trigger_sync();
        job.trigger_sync();
        job.run_and_wait().await;

        assert_eq!(executor.call_count(), 3);
        assert_eq!(job.status().stdout.len(), 3);
    }

    #[tokio::test]
    async fn test_output_buffers_are_bounded() {
        let job = job(ScriptedExecutor::succeeding().with_output("line", "err"));
        job.spawn();

        for _ in 0..25 {
            job.run_and_wait().await;
        }

        assert_eq!(job.status().stdout.len(), 20);
        assert_eq!(job.status().stderr.len(), 20);
    }

    #[tokio::test]
    async fn test_reports_outcomes_to_metrics() {
        let metrics = Arc::new(RecordingMetrics::new());
        let executor = ScriptedExecutor::failing(u32::MAX);
        let d = descriptor("mirror").with("retry", 1).with("path", "/srv/mirror");
        let job = Arc::new(Job::new(d, Arc::new(executor), metrics.clone()).unwrap());
        job.spawn();

        job.run_and_wait().await;

        assert_eq!(metrics.failures("mirror"), 1);
        assert_eq!(metrics.successes("mirror"), 0);
        assert_eq!(
            metrics.disk_usage_requests(),
            vec![("mirror".to_string(), std::path::PathBuf::from("/srv/mirror"))]
        );
    }

    #[tokio::test]
    async fn test_external_job_is_always_idle_and_successful() {
        let d = JobDescriptor::new()
            .with("name", "pypi")
            .with("type", "external");
        let job = Arc::new(Job::from_descriptor(d, Arc::new(NoopMetrics)).unwrap());

        assert!(job.is_external());
        assert!(job.spawn().is_none());

        job.trigger_sync();
        job.run_and_wait().await;
        let status = job.status();

        assert!(status.idle);
        assert!(status.result);
        assert!(status.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_only_once() {
        let job = job(ScriptedExecutor::succeeding());

        assert!(job.spawn().is_some());
        assert!(job.spawn().is_none());
    }

    #[test]
    fn test_invalid_interval_falls_back_to_default() {
        let d = descriptor("test").with("interval", "soon");
        let job = Job::new(d, Arc::new(ScriptedExecutor::succeeding()), Arc::new(NoopMetrics)).unwrap();

        assert_eq!(job.interval(), crate::core::descriptor::DEFAULT_INTERVAL);
    }
}

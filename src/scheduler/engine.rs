//! Manager engine implementation.
//!
//! The manager is responsible for:
//! - Restoring the schedule from the last checkpoint
//! - Queueing jobs whose interval has elapsed
//! - Admitting queued jobs under the concurrency limit, in FIFO order
//! - Persisting the checkpoint whenever the pending queue changes
//! - Serving start, stop and exit requests from [`ManagerHandle`]s

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::descriptor::JobDescriptor;
use crate::metrics::SyncMetrics;
use crate::storage::{Checkpoint, CheckpointStore, StorageError, WorkerCheckpoint};
use crate::worker::Job;

use super::handle::{COMMAND_CHANNEL_BUFFER, ManagerHandle};
use super::queue::PendingQueue;
use super::types::{ManagerCommand, ManagerConfig, ManagerError, ManagerState};

/// How many days back a job without a checkpoint entry is assumed to have run.
const NEVER_INVOKED_DAYS: i64 = 365;

/// What one scheduling pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Jobs appended to the pending queue, in order.
    pub queued: Vec<String>,
    /// Jobs admitted for execution, in order.
    pub admitted: Vec<String>,
}

impl TickOutcome {
    /// Whether the pending queue changed.
    pub fn changed(&self) -> bool {
        !self.queued.is_empty() || !self.admitted.is_empty()
    }
}

/// The scheduler owning every job.
pub struct Manager<S: CheckpointStore> {
    config: ManagerConfig,
    jobs: Arc<Vec<Arc<Job>>>,
    store: Arc<S>,
    /// Indexed like `jobs`; owned by the decision loop.
    last_invoke: Vec<DateTime<Utc>>,
    queue: PendingQueue,
    handle: ManagerHandle,
    command_rx: mpsc::Receiver<ManagerCommand>,
}

impl<S: CheckpointStore + 'static> Manager<S> {
    /// Build a manager with one job per enabled descriptor.
    ///
    /// Fails if any enabled descriptor is malformed or two enabled jobs share
    /// a name. A missing or unreadable checkpoint is logged and treated as
    /// empty.
    pub async fn new(
        config: ManagerConfig,
        descriptors: Vec<JobDescriptor>,
        store: Arc<S>,
        metrics: Arc<dyn SyncMetrics>,
    ) -> Result<Self, ManagerError> {
        let mut jobs = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if descriptor.is_disabled() {
                tracing::info!(
                    job = descriptor.name().unwrap_or("<unnamed>"),
                    "Skipping disabled job"
                );
                continue;
            }
            jobs.push(Job::from_descriptor(descriptor, Arc::clone(&metrics))?);
        }
        Self::with_jobs(config, jobs, store).await
    }

    /// Build a manager around already constructed jobs.
    pub async fn with_jobs(
        config: ManagerConfig,
        jobs: Vec<Job>,
        store: Arc<S>,
    ) -> Result<Self, ManagerError> {
        let mut names = HashSet::new();
        for job in &jobs {
            if !names.insert(job.name().to_string()) {
                return Err(ManagerError::DuplicateJob(job.name().to_string()));
            }
        }

        let checkpoint = match store.load().await {
            Ok(checkpoint) => checkpoint,
            Err(StorageError::NotFound(location)) => {
                tracing::info!(location = %location, "No checkpoint found, all jobs considered never run");
                Checkpoint::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load checkpoint, all jobs considered never run");
                Checkpoint::new()
            }
        };

        let never = Utc::now() - chrono::Duration::days(NEVER_INVOKED_DAYS);
        let last_invoke = jobs
            .iter()
            .map(|job| match checkpoint.get(job.name()) {
                Some(entry) => {
                    job.restore(entry.last_finished_or_invoke(), entry.result_or_success());
                    tracing::debug!(
                        job = %job.name(),
                        last_invoke = %entry.last_invoke_time,
                        "Restored from checkpoint"
                    );
                    entry.last_invoke_time
                }
                None => {
                    job.restore(never, true);
                    never
                }
            })
            .collect();

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let jobs: Arc<Vec<Arc<Job>>> = Arc::new(jobs.into_iter().map(Arc::new).collect());
        let handle = ManagerHandle {
            command_tx,
            state: Arc::new(RwLock::new(ManagerState::Running)),
            jobs: Arc::clone(&jobs),
        };

        tracing::info!(
            jobs = jobs.len(),
            concurrent_limit = config.concurrent_limit,
            poll_interval = ?config.poll_interval,
            "Manager created"
        );

        Ok(Self {
            config,
            jobs,
            store,
            last_invoke,
            queue: PendingQueue::new(),
            handle,
            command_rx,
        })
    }

    /// A handle for controlling the manager once it runs.
    pub fn handle(&self) -> ManagerHandle {
        self.handle.clone()
    }

    /// The manager's configuration.
    pub fn config(&self) -> ManagerConfig {
        self.config
    }

    /// All jobs in descriptor order.
    pub fn jobs(&self) -> impl Iterator<Item = &Arc<Job>> {
        self.jobs.iter()
    }

    /// Last admission time of a job.
    pub fn last_invoke(&self, name: &str) -> Option<DateTime<Utc>> {
        let index = self.jobs.iter().position(|job| job.name() == name)?;
        self.last_invoke.get(index).copied()
    }

    /// Trigger one job outside the schedule and wait until it is idle again.
    pub async fn run_specific_worker(&self, name: &str) -> Result<(), ManagerError> {
        self.handle.run_specific_worker(name).await
    }

    /// Start the manager and return a handle for controlling it.
    pub async fn start(self) -> (ManagerHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    /// Start every job loop and run the decision loop until exit.
    pub async fn run(self) {
        for job in self.jobs.iter() {
            job.spawn();
        }
        self.save_checkpoint().await;

        let Self {
            config,
            jobs,
            store,
            last_invoke,
            queue,
            handle,
            mut command_rx,
        } = self;
        let state = Arc::clone(&handle.state);
        // The loop must notice when every external handle is gone.
        drop(handle);

        let mut engine = Engine {
            config,
            jobs,
            store,
            last_invoke,
            queue,
        };

        let period = engine.config.poll_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut exit_response: Option<oneshot::Sender<()>> = None;

        tracing::info!("Manager started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *state.read().await == ManagerState::Running {
                        let outcome = engine.schedule_tick(Utc::now());
                        if outcome.changed() {
                            engine.save_checkpoint().await;
                        }
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(ManagerCommand::Start { response }) => {
                            *state.write().await = ManagerState::Running;
                            tracing::info!("Manager running");
                            let _ = response.send(());
                        }
                        Some(ManagerCommand::Stop { response }) => {
                            *state.write().await = ManagerState::Stopped;
                            tracing::info!("Manager stopped, in-flight jobs keep running");
                            let _ = response.send(());
                        }
                        Some(ManagerCommand::Exit { response }) => {
                            exit_response = Some(response);
                            break;
                        }
                        None => {
                            tracing::error!("Every manager handle was dropped, terminating decision loop");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Manager exited");
        if let Some(response) = exit_response {
            let _ = response.send(());
        }
    }

    async fn save_checkpoint(&self) {
        save_checkpoint(self.store.as_ref(), &self.jobs, &self.last_invoke).await;
    }

    #[cfg(test)]
    fn engine(&mut self) -> EngineRef<'_, S> {
        EngineRef { manager: self }
    }
}

/// The state owned by the running decision loop.
struct Engine<S: CheckpointStore> {
    config: ManagerConfig,
    jobs: Arc<Vec<Arc<Job>>>,
    store: Arc<S>,
    last_invoke: Vec<DateTime<Utc>>,
    queue: PendingQueue,
}

impl<S: CheckpointStore> Engine<S> {
    fn schedule_tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        schedule_tick(
            &self.config,
            &self.jobs,
            &mut self.last_invoke,
            &mut self.queue,
            now,
        )
    }

    async fn save_checkpoint(&self) {
        save_checkpoint(self.store.as_ref(), &self.jobs, &self.last_invoke).await;
    }
}

/// One scheduling pass: queue due jobs, then admit from the front of the
/// queue as far as the concurrency budget allows.
fn schedule_tick(
    config: &ManagerConfig,
    jobs: &[Arc<Job>],
    last_invoke: &mut [DateTime<Utc>],
    queue: &mut PendingQueue,
    now: DateTime<Utc>,
) -> TickOutcome {
    let mut outcome = TickOutcome::default();
    let mut running = 0usize;

    for (index, job) in jobs.iter().enumerate() {
        if !job.is_idle() {
            running += 1;
            continue;
        }
        if queue.contains(index) || job.is_external() {
            continue;
        }
        let elapsed = (now - last_invoke[index]).to_std().unwrap_or(Duration::ZERO);
        if elapsed > job.interval() && queue.push(index) {
            tracing::debug!(job = %job.name(), elapsed = ?elapsed, "Job due, queued");
            outcome.queued.push(job.name().to_string());
        }
    }

    let budget = config.concurrent_limit.saturating_sub(running);
    for index in queue.take_front(budget) {
        let job = &jobs[index];
        last_invoke[index] = now;
        job.admit();
        tracing::info!(job = %job.name(), running = running + outcome.admitted.len() + 1, "Job admitted");
        outcome.admitted.push(job.name().to_string());
    }

    if !queue.is_empty() {
        tracing::debug!(pending = queue.len(), running, "Jobs waiting for a free slot");
    }
    outcome
}

fn build_checkpoint(jobs: &[Arc<Job>], last_invoke: &[DateTime<Utc>]) -> Checkpoint {
    let mut checkpoint = Checkpoint::new();
    for (job, invoked) in jobs.iter().zip(last_invoke) {
        let status = job.status();
        checkpoint.insert(
            job.name(),
            WorkerCheckpoint {
                last_invoke_time: *invoked,
                last_finished: Some(status.last_finished),
                result: Some(status.result),
            },
        );
    }
    checkpoint
}

async fn save_checkpoint<S: CheckpointStore + ?Sized>(
    store: &S,
    jobs: &[Arc<Job>],
    last_invoke: &[DateTime<Utc>],
) {
    let checkpoint = build_checkpoint(jobs, last_invoke);
    if let Err(e) = store.save(&checkpoint).await {
        tracing::warn!(error = %e, "Failed to save checkpoint");
    }
}

#[cfg(test)]
struct EngineRef<'a, S: CheckpointStore> {
    manager: &'a mut Manager<S>,
}

#[cfg(test)]
impl<S: CheckpointStore> EngineRef<'_, S> {
    fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let m = &mut *self.manager;
        schedule_tick(&m.config, &m.jobs, &mut m.last_invoke, &mut m.queue, now)
    }

    fn pending(&self) -> Vec<String> {
        let mut queue = self.manager.queue.clone();
        queue
            .take_front(queue.len())
            .into_iter()
            .map(|i| self.manager.jobs[i].name().to_string())
            .collect()
    }
}

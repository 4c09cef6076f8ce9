//! Manager type definitions.
//!
//! This module contains error types, state enums, and command types for the manager.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::core::descriptor::DescriptorError;
use crate::core::status::{JobStatus, JobSummary};

/// Concurrency limit used when none is configured.
pub const DEFAULT_CONCURRENT_LIMIT: usize = 5;

/// Poll interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors that can occur in the manager.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// A job descriptor is malformed.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// Two enabled jobs share a name.
    #[error("duplicate job name: {0}")]
    DuplicateJob(String),

    /// Job not found.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Channel error.
    #[error("channel error: {0}")]
    ChannelError(String),
}

/// State of the manager's decision loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerState {
    /// Due jobs are queued and admitted.
    Running,
    /// Nothing is admitted; in-flight executions continue.
    Stopped,
}

/// Commands that can be sent to the manager.
pub(crate) enum ManagerCommand {
    /// Resume admissions.
    Start { response: oneshot::Sender<()> },
    /// Pause admissions.
    Stop { response: oneshot::Sender<()> },
    /// Terminate the decision loop.
    Exit { response: oneshot::Sender<()> },
}

/// Tuning knobs of the decision loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Time between two scheduling passes.
    pub poll_interval: Duration,
    /// Maximum number of jobs executing at once.
    pub concurrent_limit: usize,
}

impl ManagerConfig {
    /// Create a config.
    pub fn new(poll_interval: Duration, concurrent_limit: usize) -> Self {
        Self {
            poll_interval,
            concurrent_limit,
        }
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the concurrency limit.
    pub fn with_concurrent_limit(mut self, limit: usize) -> Self {
        self.concurrent_limit = limit;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_CONCURRENT_LIMIT)
    }
}

/// Detailed status of the manager and its visible jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerStatus {
    pub running: bool,
    pub workers: BTreeMap<String, JobStatus>,
}

/// Status of the manager and its visible jobs, without captured output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerSummary {
    pub running: bool,
    pub workers: BTreeMap<String, JobSummary>,
}

impl From<&ManagerStatus> for ManagerSummary {
    fn from(status: &ManagerStatus) -> Self {
        Self {
            running: status.running,
            workers: status
                .workers
                .iter()
                .map(|(name, job)| (name.clone(), JobSummary::from(job)))
                .collect(),
        }
    }
}

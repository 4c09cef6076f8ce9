//! Job status snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time status of one job.
///
/// Always a copy: holding a `JobStatus` never blocks the job that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Outcome of the most recent execution.
    pub result: bool,
    /// Completion time of the most recent successful execution.
    pub last_finished: DateTime<Utc>,
    /// False while an execution, including its retries, is in flight.
    pub idle: bool,
    /// Most recent captured stdout entries, oldest first.
    pub stdout: Vec<String>,
    /// Most recent captured stderr entries, oldest first.
    pub stderr: Vec<String>,
}

/// Status summary without captured output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub result: bool,
    pub last_finished: DateTime<Utc>,
    pub idle: bool,
}

impl From<&JobStatus> for JobSummary {
    fn from(status: &JobStatus) -> Self {
        Self {
            result: status.result,
            last_finished: status.last_finished,
            idle: status.idle,
        }
    }
}

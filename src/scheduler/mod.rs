//! Manager: the decision loop scheduling every job.
//!
//! This module provides the polling loop that queues due jobs, admits them
//! under the concurrency limit and checkpoints the schedule.

mod engine;
mod handle;
mod queue;
mod types;

pub use engine::{Manager, TickOutcome};
pub use handle::ManagerHandle;
pub use types::{
    DEFAULT_CONCURRENT_LIMIT, DEFAULT_POLL_INTERVAL, ManagerConfig, ManagerError, ManagerState,
    ManagerStatus, ManagerSummary,
};

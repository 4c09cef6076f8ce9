//! Manager handle for controlling the manager.
//!
//! This module provides the `ManagerHandle` type that allows external control
//! of the manager through commands like start, stop and exit.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc, oneshot};

use crate::worker::Job;

use super::types::{ManagerCommand, ManagerError, ManagerState, ManagerStatus, ManagerSummary};

/// Buffer size for the command channel between ManagerHandle and Manager.
pub(crate) const COMMAND_CHANNEL_BUFFER: usize = 32;

/// Handle for controlling the manager.
#[derive(Clone)]
pub struct ManagerHandle {
    pub(crate) command_tx: mpsc::Sender<ManagerCommand>,
    pub(crate) state: Arc<RwLock<ManagerState>>,
    pub(crate) jobs: Arc<Vec<Arc<Job>>>,
}

impl ManagerHandle {
    /// Helper to send a command that returns unit and wait for response.
    async fn send_unit_command(
        &self,
        build_command: impl FnOnce(oneshot::Sender<()>) -> ManagerCommand,
        operation: &str,
    ) -> Result<(), ManagerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build_command(response_tx))
            .await
            .map_err(|_| {
                ManagerError::ChannelError(format!("failed to send {} command", operation))
            })?;

        response_rx.await.map_err(|_| {
            ManagerError::ChannelError(format!("failed to receive {} response", operation))
        })?;

        Ok(())
    }

    /// Resume admitting due jobs.
    pub async fn start(&self) -> Result<(), ManagerError> {
        self.send_unit_command(|response| ManagerCommand::Start { response }, "start")
            .await
    }

    /// Stop admitting due jobs. In-flight executions continue.
    pub async fn stop(&self) -> Result<(), ManagerError> {
        self.send_unit_command(|response| ManagerCommand::Stop { response }, "stop")
            .await
    }

    /// Stop the manager and terminate its decision loop.
    ///
    /// Returns once the loop has ended.
    pub async fn exit(&self) -> Result<(), ManagerError> {
        self.stop().await?;
        self.send_unit_command(|response| ManagerCommand::Exit { response }, "exit")
            .await
    }

    /// Get the current manager state.
    pub async fn state(&self) -> ManagerState {
        *self.state.read().await
    }

    /// Check if the manager is admitting jobs.
    pub async fn is_running(&self) -> bool {
        *self.state.read().await == ManagerState::Running
    }

    /// Status of the manager and every visible job.
    pub async fn status(&self) -> ManagerStatus {
        let running = self.is_running().await;
        let workers: BTreeMap<_, _> = self
            .jobs
            .iter()
            .filter(|job| !job.is_hidden())
            .map(|job| (job.name().to_string(), job.status()))
            .collect();
        ManagerStatus { running, workers }
    }

    /// Status without captured output.
    pub async fn summary(&self) -> ManagerSummary {
        ManagerSummary::from(&self.status().await)
    }

    /// Names of every job, hidden ones included, in descriptor order.
    pub fn job_names(&self) -> Vec<String> {
        self.jobs.iter().map(|job| job.name().to_string()).collect()
    }

    /// Trigger one job without waiting for it.
    pub fn trigger(&self, name: &str) -> Result<(), ManagerError> {
        let job = self.job(name)?;
        tracing::info!(job = %name, "Manual trigger");
        job.trigger_sync();
        Ok(())
    }

    /// Trigger one job outside the schedule and wait until it is idle again.
    pub async fn run_specific_worker(&self, name: &str) -> Result<(), ManagerError> {
        let job = self.job(name)?;
        tracing::info!(job = %name, "Running worker on demand");
        job.run_and_wait().await;
        Ok(())
    }

    fn job(&self, name: &str) -> Result<&Arc<Job>, ManagerError> {
        self.jobs
            .iter()
            .find(|job| job.name() == name)
            .ok_or_else(|| ManagerError::JobNotFound(name.to_string()))
    }
}

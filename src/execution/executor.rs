//! Executor capability and its variants.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::descriptor::{DescriptorError, JobDescriptor, KEY_TYPE};

use super::command::ShellScriptExecutor;
use super::hooks::Hooks;

/// Output captured from one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    /// Create an output from captured streams.
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

/// Errors from a single attempt.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command could not be started.
    #[error("execution cannot start: {0}")]
    SpawnFailed(String),

    /// The command ran but did not succeed.
    #[error("execution failed: {}", exit_description(.code))]
    CommandFailed {
        code: Option<i32>,
        output: ExecOutput,
    },

    /// The command environment could not be prepared.
    #[error("cannot prepare environment: {0}")]
    Environment(String),

    /// Any other executor-level failure.
    #[error("execution failed: {0}")]
    Failed(String),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl ExecError {
    /// Output captured before the failure, if any.
    pub fn output(&self) -> ExecOutput {
        match self {
            ExecError::CommandFailed { output, .. } => output.clone(),
            _ => ExecOutput::default(),
        }
    }
}

/// Performs one synchronization attempt for a job.
///
/// Implementations must be safe to call repeatedly and must run the supplied
/// hooks around the attempt.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run_once(
        &self,
        descriptor: &JobDescriptor,
        hooks: &Hooks,
    ) -> Result<ExecOutput, ExecError>;
}

/// The closed set of executors selectable through a descriptor's `type`.
#[derive(Debug, Clone)]
pub enum ExecutorKind {
    /// Runs the descriptor's `script`.
    ShellScript(ShellScriptExecutor),
    /// Work managed outside this engine; never executes anything.
    External,
}

impl ExecutorKind {
    /// Select and configure the executor for a descriptor.
    pub fn from_descriptor(descriptor: &JobDescriptor) -> Result<Self, DescriptorError> {
        let job = descriptor.name()?;
        match descriptor.kind() {
            Some("shell_script") => Ok(ExecutorKind::ShellScript(
                ShellScriptExecutor::from_descriptor(descriptor)?,
            )),
            Some("external") => Ok(ExecutorKind::External),
            Some("rsync") => Err(DescriptorError::UnsupportedType {
                job: job.to_string(),
                kind: "rsync (use a shell_script job running rsync instead)".to_string(),
            }),
            Some(other) => Err(DescriptorError::UnsupportedType {
                job: job.to_string(),
                kind: other.to_string(),
            }),
            None => match descriptor.get(KEY_TYPE) {
                Some(_) => Err(descriptor.invalid_type(KEY_TYPE, "a string")),
                None => Err(DescriptorError::MissingKey {
                    job: job.to_string(),
                    key: KEY_TYPE.to_string(),
                }),
            },
        }
    }

    /// Whether this is the no-op external variant.
    pub fn is_external(&self) -> bool {
        matches!(self, ExecutorKind::External)
    }
}

#[async_trait]
impl Executor for ExecutorKind {
    async fn run_once(
        &self,
        descriptor: &JobDescriptor,
        hooks: &Hooks,
    ) -> Result<ExecOutput, ExecError> {
        match self {
            ExecutorKind::ShellScript(executor) => executor.run_once(descriptor, hooks).await,
            ExecutorKind::External => Ok(ExecOutput::default()),
        }
    }
}

//! Shell script executor.
//!
//! [`ShellScriptExecutor`] runs the descriptor's `script` through `/bin/sh -c`.
//! The command inherits the scheduler's environment plus one `LUG_<key>`
//! variable per descriptor key (see [`Environment`]).
//!
//! ```yaml
//! repos:
//!   - name: debian
//!     type: shell_script
//!     script: rsync -a rsync://ftp.debian.org/debian/ "$LUG_path"
//!     path: /srv/debian
//! ```
//!
//! A non-zero exit status becomes [`ExecError::CommandFailed`] carrying the
//! captured output, so failed attempts still show up in the job's buffers.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::core::descriptor::{DescriptorError, JobDescriptor};
use crate::core::environment::Environment;

use super::executor::{ExecError, ExecOutput, Executor};
use super::hooks::Hooks;

/// Descriptor key holding the script to run.
pub const KEY_SCRIPT: &str = "script";

const SHELL: &str = "/bin/sh";

/// Runs a shell script once per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellScriptExecutor {
    script: String,
}

impl ShellScriptExecutor {
    /// Create an executor for a script.
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// Configure an executor from a descriptor's `script` key.
    pub fn from_descriptor(descriptor: &JobDescriptor) -> Result<Self, DescriptorError> {
        Ok(Self::new(descriptor.require_str(KEY_SCRIPT)?))
    }

    /// Get the script being executed.
    pub fn script(&self) -> &str {
        &self.script
    }

    fn command(&self, env: &Environment) -> Command {
        let mut cmd = Command::new(SHELL);
        cmd.arg("-c").arg(&self.script);
        cmd.envs(env.iter());
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Executor for ShellScriptExecutor {
    async fn run_once(
        &self,
        descriptor: &JobDescriptor,
        hooks: &Hooks,
    ) -> Result<ExecOutput, ExecError> {
        let env = Environment::from_descriptor(descriptor)
            .map_err(|e| ExecError::Environment(e.to_string()))?;
        let mut cmd = self.command(&env);

        hooks.prepare(descriptor, &mut cmd);
        let result = cmd.output().await;

        let outcome = match result {
            Ok(output) => {
                let captured = ExecOutput::new(
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr),
                );
                if output.status.success() {
                    Ok(captured)
                } else {
                    Err(ExecError::CommandFailed {
                        code: output.status.code(),
                        output: captured,
                    })
                }
            }
            Err(e) => Err(ExecError::SpawnFailed(e.to_string())),
        };

        hooks.finish(descriptor, outcome.is_ok());
        outcome
    }
}

//! One trigger's worth of attempts.

use crate::core::descriptor::JobDescriptor;
use crate::core::retry::RetryPolicy;
use crate::execution::{ExecOutput, Executor, Hooks};

/// Result of running a job to completion or retry exhaustion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation {
    pub succeeded: bool,
    pub attempts: u32,
    /// Output of the last attempt.
    pub output: ExecOutput,
}

/// Attempt the executor until it succeeds or the policy runs out.
pub(crate) async fn execute_with_retry(
    name: &str,
    executor: &dyn Executor,
    descriptor: &JobDescriptor,
    hooks: &Hooks,
    policy: RetryPolicy,
) -> Invocation {
    let mut attempts = 0;
    loop {
        attempts += 1;
        tracing::debug!(job = %name, attempt = attempts, "Starting sync attempt");

        match executor.run_once(descriptor, hooks).await {
            Ok(output) => {
                tracing::info!(job = %name, attempts, "Sync succeeded");
                return Invocation {
                    succeeded: true,
                    attempts,
                    output,
                };
            }
            Err(e) => {
                if !policy.should_retry(attempts) {
                    tracing::error!(job = %name, attempts, error = %e, "Sync failed, retries exhausted");
                    return Invocation {
                        succeeded: false,
                        attempts,
                        output: e.output(),
                    };
                }
                tracing::warn!(
                    job = %name,
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    delay = ?policy.delay,
                    error = %e,
                    "Sync attempt failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

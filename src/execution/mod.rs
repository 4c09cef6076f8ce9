//! Execution backends.
//!
//! An [`Executor`] performs exactly one synchronization attempt. Retries,
//! scheduling and status are the worker's business, never the executor's.

mod command;
mod executor;
mod hooks;

pub use command::{ShellScriptExecutor, KEY_SCRIPT};
pub use executor::{ExecError, ExecOutput, Executor, ExecutorKind};
pub use hooks::{parse_size, ExecutionHook, HookError, Hooks, RlimitHook, KEY_RLIMIT_MEM};

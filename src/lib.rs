//! mirrorsync - a mirror synchronization manager.
//!
//! A [`Manager`] owns one [`Job`] per configured repository, queues jobs whose
//! interval has elapsed and admits them under a global concurrency limit.
//! Each job runs its own loop, executing one synchronization at a time with
//! retries. The schedule is checkpointed so a restart resumes where it left
//! off.

pub mod api;
pub mod config;
pub mod core;
pub mod execution;
pub mod metrics;
pub mod scheduler;
pub mod storage;
pub mod testing;
pub mod worker;

pub use api::{ApiConfig, ApiState, build_router, start_server};
pub use config::{Config, ConfigError, JsonApiConfig, YamlLoader, load_config};
pub use core::descriptor::{DescriptorError, DescriptorValue, JobDescriptor};
pub use core::environment::Environment;
pub use core::output::OutputBuffer;
pub use core::retry::RetryPolicy;
pub use core::status::{JobStatus, JobSummary};
pub use execution::{
    ExecError, ExecOutput, ExecutionHook, Executor, ExecutorKind, HookError, Hooks, RlimitHook,
    ShellScriptExecutor,
};
pub use metrics::{Exporter, NoopMetrics, SyncMetrics};
pub use scheduler::{
    Manager, ManagerConfig, ManagerError, ManagerHandle, ManagerState, ManagerStatus,
    ManagerSummary, TickOutcome,
};
pub use storage::{
    Checkpoint, CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore, StorageError,
    WorkerCheckpoint,
};
pub use worker::Job;

//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::descriptor::JobDescriptor;
use crate::scheduler::{DEFAULT_CONCURRENT_LIMIT, ManagerConfig};

/// Default address of the HTTP API.
pub const DEFAULT_API_ADDRESS: &str = "127.0.0.1:7001";

/// Default checkpoint path.
pub const DEFAULT_CHECKPOINT: &str = "checkpoint.json";

/// Top-level configuration, as validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// Poll interval of the decision loop, in seconds.
    pub interval: u64,
    /// Maximum number of jobs executing at once.
    pub concurrent_limit: usize,
    /// Checkpoint file.
    pub checkpoint: PathBuf,
    /// Tracing filter directive.
    pub log_level: Option<String>,
    /// HTTP API settings.
    pub json_api: JsonApiConfig,
    /// Job descriptors, in file order.
    pub repos: Vec<JobDescriptor>,
}

impl Config {
    /// Poll interval as a duration. Zero is raised to one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }

    /// Settings for the manager's decision loop.
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig::new(self.poll_interval(), self.concurrent_limit)
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JsonApiConfig {
    /// Listen address, `host:port` or `:port`.
    pub address: String,
}

impl Default for JsonApiConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_API_ADDRESS.to_string(),
        }
    }
}

/// Configuration as written in the file, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawConfig {
    pub interval: i64,
    #[serde(default = "default_concurrent_limit")]
    pub concurrent_limit: i64,
    #[serde(default = "default_checkpoint")]
    pub checkpoint: PathBuf,
    #[serde(default, alias = "loglevel")]
    pub log_level: Option<String>,
    #[serde(default)]
    pub json_api: JsonApiConfig,
    /// Accepted for compatibility and ignored.
    #[serde(default)]
    #[allow(dead_code)]
    pub dummy: Option<serde_yaml::Value>,
    #[serde(default)]
    pub repos: Vec<serde_yaml::Mapping>,
}

fn default_concurrent_limit() -> i64 {
    DEFAULT_CONCURRENT_LIMIT as i64
}

fn default_checkpoint() -> PathBuf {
    PathBuf::from(DEFAULT_CHECKPOINT)
}

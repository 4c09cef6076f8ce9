//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for the manager and its repos.

mod error;
mod types;
mod yaml;

pub use error::ConfigError;
pub use types::{Config, DEFAULT_API_ADDRESS, DEFAULT_CHECKPOINT, JsonApiConfig};
pub use yaml::YamlLoader;

use std::path::Path;

/// Load and validate a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    YamlLoader::load_config(path)
}

impl Config {
    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        YamlLoader::parse_config(yaml)
    }
}

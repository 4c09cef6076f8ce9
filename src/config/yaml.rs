//! YAML configuration parsing.
//!
//! Parses the manager settings and the ordered list of repos. Repos are kept
//! as open descriptors; only their shape is checked here, every key is
//! interpreted later by the component that owns it.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::descriptor::{DescriptorValue, JobDescriptor, KEY_NAME};

use super::error::ConfigError;
use super::types::{Config, RawConfig};

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load configuration from a file.
    pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse_config(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Config, ConfigError> {
        if raw.interval < 0 {
            return Err(ConfigError::InvalidConfig(format!(
                "interval must not be negative, got {}",
                raw.interval
            )));
        }
        if raw.concurrent_limit <= 0 {
            return Err(ConfigError::InvalidConfig(format!(
                "concurrent_limit must be positive, got {}",
                raw.concurrent_limit
            )));
        }
        if raw.json_api.address.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "json_api.address cannot be empty".into(),
            ));
        }

        let repos = raw
            .repos
            .iter()
            .enumerate()
            .map(|(index, repo)| Self::descriptor(index, repo))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Config {
            interval: raw.interval as u64,
            concurrent_limit: raw.concurrent_limit as usize,
            checkpoint: raw.checkpoint,
            log_level: raw.log_level,
            json_api: raw.json_api,
            repos,
        })
    }

    /// Convert one repo mapping into a descriptor of scalars.
    fn descriptor(index: usize, repo: &Mapping) -> Result<JobDescriptor, ConfigError> {
        let job = match repo.get(KEY_NAME) {
            Some(Value::String(name)) => name.clone(),
            _ => format!("repos[{}]", index),
        };

        let mut values = BTreeMap::new();
        for (key, value) in repo {
            let key = match key {
                Value::String(key) => key.clone(),
                other => {
                    return Err(ConfigError::InvalidConfig(format!(
                        "repo '{}': keys must be strings, got {:?}",
                        job, other
                    )));
                }
            };
            let value = scalar(value).ok_or_else(|| ConfigError::NestedValue {
                job: job.clone(),
                key: key.clone(),
            })?;
            values.insert(key, value);
        }
        Ok(JobDescriptor::from_map(values))
    }
}

fn scalar(value: &Value) -> Option<DescriptorValue> {
    match value {
        Value::Null => Some(DescriptorValue::Null),
        Value::Bool(b) => Some(DescriptorValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(DescriptorValue::Int(i)),
            None => n.as_f64().map(DescriptorValue::Float),
        },
        Value::String(s) => Some(DescriptorValue::String(s.clone())),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

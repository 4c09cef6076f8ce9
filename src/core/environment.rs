//! Environment variables for sync commands.
//!
//! Every scalar key of a job descriptor is forwarded to the sync command as
//! an environment variable named `LUG_<key>`, and the whole descriptor is
//! additionally available as JSON in `LUG_config_json`.

use std::collections::BTreeMap;

use super::descriptor::{DescriptorValue, JobDescriptor};

/// Prefix added to every forwarded descriptor key.
pub const ENV_PREFIX: &str = "LUG_";

/// Variable holding the JSON-encoded descriptor.
pub const CONFIG_JSON_VAR: &str = "LUG_config_json";

/// Environment variables passed to a sync command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the environment for a descriptor.
    ///
    /// Booleans become `1` when true and are left out when false; nulls are
    /// left out.
    pub fn from_descriptor(descriptor: &JobDescriptor) -> Result<Self, serde_json::Error> {
        let mut env = Self::new();
        for (key, value) in descriptor.iter() {
            let name = format!("{}{}", ENV_PREFIX, key);
            match value {
                DescriptorValue::Null | DescriptorValue::Bool(false) => {}
                DescriptorValue::Bool(true) => env.set(name, "1"),
                other => env.set(name, other.to_string()),
            }
        }
        env.set(CONFIG_JSON_VAR, serde_json::to_string(descriptor)?);
        Ok(env)
    }

    /// Builder: add an environment variable.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Add an environment variable.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Get an environment variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|s| s.as_str())
    }

    /// Check if a variable exists.
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Get the number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Check if the environment is empty.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate over the environment variables.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }
}

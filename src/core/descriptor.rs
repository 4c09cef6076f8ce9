//! Job descriptors.
//!
//! A [`JobDescriptor`] is the open, string-keyed configuration record of one
//! mirror job. A handful of keys are reserved and interpreted by the engine;
//! everything else is passed through untouched to the executor (see
//! [`Environment::from_descriptor`](crate::core::environment::Environment::from_descriptor)).
//!
//! Readers never assume the shape of the map: every accessor checks presence
//! and type explicitly and applies its own default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Reserved key: unique job name.
pub const KEY_NAME: &str = "name";
/// Reserved key: executor variant.
pub const KEY_TYPE: &str = "type";
/// Reserved key: seconds between two scheduled runs.
pub const KEY_INTERVAL: &str = "interval";
/// Reserved key: attempts per trigger.
pub const KEY_RETRY: &str = "retry";
/// Reserved key: seconds to wait between failed attempts.
pub const KEY_RETRY_INTERVAL: &str = "retry_interval";
/// Reserved key: drop the job from the manager entirely.
pub const KEY_DISABLED: &str = "disabled";
/// Reserved key: keep the job out of status reports.
pub const KEY_HIDDEN: &str = "hidden";
/// Mirror directory, used for disk usage reporting.
pub const KEY_PATH: &str = "path";

/// Interval used when a descriptor has no usable `interval`: once a year.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(31_536_000);

/// Attempts per trigger when `retry` is absent.
pub const DEFAULT_RETRY: u32 = 3;

/// Delay between failed attempts when `retry_interval` is absent.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Errors raised while interpreting a descriptor.
#[derive(Debug, Error, PartialEq)]
pub enum DescriptorError {
    /// The descriptor has no string `name`.
    #[error("job descriptor has no name")]
    MissingName,

    /// A key the selected executor requires is absent.
    #[error("job '{job}': missing required key '{key}'")]
    MissingKey { job: String, key: String },

    /// A key is present but has the wrong type.
    #[error("job '{job}': '{key}' should be {expected} when present")]
    InvalidType {
        job: String,
        key: String,
        expected: &'static str,
    },

    /// A key has the right type but an unusable value.
    #[error("job '{job}': invalid value for '{key}': {reason}")]
    InvalidValue {
        job: String,
        key: String,
        reason: String,
    },

    /// The `type` key names no known executor.
    #[error("job '{job}': unsupported job type '{kind}'")]
    UnsupportedType { job: String, kind: String },
}

/// A scalar descriptor value.
///
/// Nested sequences and maps are rejected when configuration is loaded, so a
/// descriptor only ever holds scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DescriptorValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl DescriptorValue {
    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            DescriptorValue::Null => "null",
            DescriptorValue::Bool(_) => "a boolean",
            DescriptorValue::Int(_) => "an integer",
            DescriptorValue::Float(_) => "a float",
            DescriptorValue::String(_) => "a string",
        }
    }
}

impl fmt::Display for DescriptorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorValue::Null => Ok(()),
            DescriptorValue::Bool(b) => write!(f, "{}", b),
            DescriptorValue::Int(i) => write!(f, "{}", i),
            DescriptorValue::Float(x) => write!(f, "{}", x),
            DescriptorValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for DescriptorValue {
    fn from(v: bool) -> Self {
        DescriptorValue::Bool(v)
    }
}

impl From<i64> for DescriptorValue {
    fn from(v: i64) -> Self {
        DescriptorValue::Int(v)
    }
}

impl From<i32> for DescriptorValue {
    fn from(v: i32) -> Self {
        DescriptorValue::Int(v.into())
    }
}

impl From<f64> for DescriptorValue {
    fn from(v: f64) -> Self {
        DescriptorValue::Float(v)
    }
}

impl From<&str> for DescriptorValue {
    fn from(v: &str) -> Self {
        DescriptorValue::String(v.to_string())
    }
}

impl From<String> for DescriptorValue {
    fn from(v: String) -> Self {
        DescriptorValue::String(v)
    }
}

/// Open configuration record describing one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobDescriptor {
    values: BTreeMap<String, DescriptorValue>,
}

impl JobDescriptor {
    /// Create an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a descriptor from an existing map.
    pub fn from_map(values: BTreeMap<String, DescriptorValue>) -> Self {
        Self { values }
    }

    /// Builder: set a key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<DescriptorValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Set a key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DescriptorValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&DescriptorValue> {
        self.values.get(key)
    }

    /// Get a value if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(DescriptorValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Get a value if it is an integer.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(DescriptorValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get a value if it is a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(DescriptorValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Iterate over all keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DescriptorValue)> {
        self.values.iter()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the descriptor has no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The job name.
    pub fn name(&self) -> Result<&str, DescriptorError> {
        self.get_str(KEY_NAME).ok_or(DescriptorError::MissingName)
    }

    /// The executor variant, if any.
    pub fn kind(&self) -> Option<&str> {
        self.get_str(KEY_TYPE)
    }

    /// Seconds between scheduled runs.
    ///
    /// Absent, non-integer or negative values all fall back to
    /// [`DEFAULT_INTERVAL`], which in practice means "never auto-trigger".
    pub fn interval(&self) -> Duration {
        match self.get_int(KEY_INTERVAL) {
            Some(secs) if secs >= 0 => Duration::from_secs(secs as u64),
            _ => DEFAULT_INTERVAL,
        }
    }

    /// Whether `interval` is present but unusable.
    pub fn has_invalid_interval(&self) -> bool {
        self.get(KEY_INTERVAL).is_some() && !matches!(self.get_int(KEY_INTERVAL), Some(s) if s >= 0)
    }

    /// Attempts per trigger. Must be a positive integer when present.
    pub fn retry(&self) -> Result<u32, DescriptorError> {
        match self.get(KEY_RETRY) {
            None => Ok(DEFAULT_RETRY),
            Some(DescriptorValue::Int(n)) if *n >= 1 => {
                u32::try_from(*n).map_err(|_| self.invalid_value(KEY_RETRY, "too large"))
            }
            Some(DescriptorValue::Int(_)) => {
                Err(self.invalid_value(KEY_RETRY, "must be at least 1"))
            }
            Some(_) => Err(self.invalid_type(KEY_RETRY, "an integer")),
        }
    }

    /// Delay between failed attempts. Must be a non-negative integer when present.
    pub fn retry_interval(&self) -> Result<Duration, DescriptorError> {
        match self.get(KEY_RETRY_INTERVAL) {
            None => Ok(DEFAULT_RETRY_INTERVAL),
            Some(DescriptorValue::Int(n)) if *n >= 0 => Ok(Duration::from_secs(*n as u64)),
            Some(DescriptorValue::Int(_)) => {
                Err(self.invalid_value(KEY_RETRY_INTERVAL, "must not be negative"))
            }
            Some(_) => Err(self.invalid_type(KEY_RETRY_INTERVAL, "an integer")),
        }
    }

    /// Whether the job is excluded from the manager.
    pub fn is_disabled(&self) -> bool {
        self.get_bool(KEY_DISABLED).unwrap_or(false)
    }

    /// Whether the job is excluded from status reports.
    pub fn is_hidden(&self) -> bool {
        self.get_bool(KEY_HIDDEN).unwrap_or(false)
    }

    /// Mirror directory, if configured.
    pub fn path(&self) -> Option<&str> {
        self.get_str(KEY_PATH)
    }

    /// Look up a required string key.
    pub fn require_str(&self, key: &str) -> Result<&str, DescriptorError> {
        match self.get(key) {
            Some(DescriptorValue::String(s)) => Ok(s),
            Some(_) => Err(self.invalid_type(key, "a string")),
            None => Err(DescriptorError::MissingKey {
                job: self.display_name(),
                key: key.to_string(),
            }),
        }
    }

    pub(crate) fn invalid_type(&self, key: &str, expected: &'static str) -> DescriptorError {
        DescriptorError::InvalidType {
            job: self.display_name(),
            key: key.to_string(),
            expected,
        }
    }

    pub(crate) fn invalid_value(&self, key: &str, reason: impl Into<String>) -> DescriptorError {
        DescriptorError::InvalidValue {
            job: self.display_name(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    fn display_name(&self) -> String {
        self.get_str(KEY_NAME).unwrap_or("<unnamed>").to_string()
    }
}

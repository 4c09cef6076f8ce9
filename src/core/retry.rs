//! Retry policy for one trigger of a job.
//!
//! A trigger makes up to `max_attempts` attempts with a fixed delay between
//! failed attempts. There is no backoff beyond that: a job that exhausts its
//! attempts simply waits for its next scheduled interval.

use std::time::Duration;

use super::descriptor::{DescriptorError, JobDescriptor};

/// Retry policy for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts per trigger, including the first one. Always >= 1.
    pub max_attempts: u32,

    /// Fixed delay between failed attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy making a single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Create a policy with a fixed delay between attempts.
    ///
    /// `max_attempts` counts the initial attempt and is clamped to at least 1.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Read `retry` and `retry_interval` from a descriptor.
    pub fn from_descriptor(descriptor: &JobDescriptor) -> Result<Self, DescriptorError> {
        Ok(Self::fixed(descriptor.retry()?, descriptor.retry_interval()?))
    }

    /// Check if another attempt is allowed after `attempts` failed ones.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(
            crate::core::descriptor::DEFAULT_RETRY,
            crate::core::descriptor::DEFAULT_RETRY_INTERVAL,
        )
    }
}

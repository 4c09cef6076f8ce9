//! Pre-/post-execution hooks.
//!
//! Hooks wrap a single attempt. A failing hook is logged and the attempt goes
//! ahead anyway.

use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;

use crate::core::descriptor::{DescriptorValue, JobDescriptor};

/// Descriptor key holding the address space limit for the sync command.
pub const KEY_RLIMIT_MEM: &str = "rlimit_mem";

/// Errors raised by a hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook's configuration is unusable.
    #[error("invalid {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    /// The hook is not supported on this platform.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// Capability applied around one execution attempt.
pub trait ExecutionHook: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Called before the command is spawned.
    fn before_spawn(
        &self,
        descriptor: &JobDescriptor,
        command: &mut Command,
    ) -> Result<(), HookError>;

    /// Called once the attempt is over, whatever its outcome.
    fn after_attempt(&self, _descriptor: &JobDescriptor, _succeeded: bool) -> Result<(), HookError> {
        Ok(())
    }
}

/// Ordered set of hooks applied to every attempt of a job.
#[derive(Clone, Default)]
pub struct Hooks {
    hooks: Vec<Arc<dyn ExecutionHook>>,
}

impl Hooks {
    /// An empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The hooks every job gets by default.
    pub fn standard() -> Self {
        Self::new().with(Arc::new(RlimitHook))
    }

    /// Builder: append a hook.
    pub fn with(mut self, hook: Arc<dyn ExecutionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Number of hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Check if there are no hooks.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every `before_spawn` hook, logging failures.
    pub fn prepare(&self, descriptor: &JobDescriptor, command: &mut Command) {
        for hook in &self.hooks {
            tracing::debug!(hook = hook.name(), "Executing pre-hook");
            if let Err(e) = hook.before_spawn(descriptor, command) {
                tracing::error!(hook = hook.name(), error = %e, "Failed to execute pre-hook");
            }
        }
    }

    /// Run every `after_attempt` hook, logging failures.
    pub fn finish(&self, descriptor: &JobDescriptor, succeeded: bool) {
        for hook in &self.hooks {
            tracing::debug!(hook = hook.name(), "Executing post-hook");
            if let Err(e) = hook.after_attempt(descriptor, succeeded) {
                tracing::error!(hook = hook.name(), error = %e, "Failed to execute post-hook");
            }
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}

/// Limits the address space of the sync command to the descriptor's
/// `rlimit_mem`.
///
/// The limit is installed in the child between fork and exec, so the
/// scheduler process itself is never affected.
#[derive(Debug, Clone, Copy, Default)]
pub struct RlimitHook;

impl RlimitHook {
    fn limit(descriptor: &JobDescriptor) -> Result<Option<u64>, HookError> {
        match descriptor.get(KEY_RLIMIT_MEM) {
            None | Some(DescriptorValue::Null) => Ok(None),
            Some(DescriptorValue::Int(n)) if *n >= 0 => Ok(Some(*n as u64)),
            Some(DescriptorValue::String(s)) => parse_size(s).map(Some),
            Some(other) => Err(HookError::InvalidConfig {
                key: KEY_RLIMIT_MEM.to_string(),
                reason: format!("expected a size, got {}", other.type_name()),
            }),
        }
    }
}

impl ExecutionHook for RlimitHook {
    fn name(&self) -> &'static str {
        "rlimit"
    }

    fn before_spawn(
        &self,
        descriptor: &JobDescriptor,
        command: &mut Command,
    ) -> Result<(), HookError> {
        let Some(bytes) = Self::limit(descriptor)? else {
            return Ok(());
        };
        apply_address_space_limit(command, bytes)
    }
}

#[cfg(unix)]
fn apply_address_space_limit(command: &mut Command, bytes: u64) -> Result<(), HookError> {
    // SAFETY: the closure only calls getrlimit/setrlimit, both async-signal-safe.
    unsafe {
        command.pre_exec(move || {
            let mut limit = libc::rlimit {
                rlim_cur: 0,
                rlim_max: 0,
            };
            if libc::getrlimit(libc::RLIMIT_AS, &mut limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            limit.rlim_cur = bytes as libc::rlim_t;
            if libc::setrlimit(libc::RLIMIT_AS, &limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_address_space_limit(_command: &mut Command, _bytes: u64) -> Result<(), HookError> {
    Err(HookError::Unsupported(KEY_RLIMIT_MEM))
}

/// Parse a human-readable size such as `512M`, `1.5GiB` or `1048576`.
///
/// Decimal units (`k`, `M`, `G`, `T`, optionally followed by `B`) are powers
/// of 1000; binary units (`Ki`, `Mi`, ... optionally followed by `B`) are
/// powers of 1024. Units are case-insensitive.
pub fn parse_size(input: &str) -> Result<u64, HookError> {
    let invalid = |reason: &str| HookError::InvalidConfig {
        key: KEY_RLIMIT_MEM.to_string(),
        reason: format!("{} ({:?})", reason, input),
    };

    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("not a number"));
    }

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "m" | "mb" => 1_000_000,
        "g" | "gb" => 1_000_000_000,
        "t" | "tb" => 1_000_000_000_000,
        "ki" | "kib" => 1 << 10,
        "mi" | "mib" => 1 << 20,
        "gi" | "gib" => 1 << 30,
        "ti" | "tib" => 1 << 40,
        _ => return Err(invalid("unknown unit")),
    };

    let whole: u64 = whole.parse().map_err(|_| invalid("out of range"))?;
    let whole_bytes = whole
        .checked_mul(multiplier)
        .ok_or_else(|| invalid("out of range"))?;

    // Fraction digits past the 18th are ignored.
    let fraction = &fraction[..fraction.len().min(18)];
    let fraction_bytes = if fraction.is_empty() {
        0
    } else {
        let numerator: u128 = fraction.parse().map_err(|_| invalid("not a number"))?;
        let denominator = 10u128.pow(fraction.len() as u32);
        (numerator * u128::from(multiplier) / denominator) as u64
    };

    whole_bytes
        .checked_add(fraction_bytes)
        .ok_or_else(|| invalid("out of range"))
}

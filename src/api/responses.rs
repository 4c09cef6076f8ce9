//! API response types.
//!
//! Manager status is served as [`ManagerStatus`](crate::scheduler::ManagerStatus)
//! and [`ManagerSummary`](crate::scheduler::ManagerSummary) directly.

use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Generic message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response to a manual trigger.
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub job: String,
    pub message: String,
}

//! API request handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::metrics::Exporter;
use crate::scheduler::{ManagerHandle, ManagerStatus, ManagerSummary};

use super::errors::ApiError;
use super::responses::{HealthResponse, MessageResponse, TriggerResponse};

/// Shared application state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub handle: ManagerHandle,
    pub exporter: Exporter,
}

impl ApiState {
    /// Create the state served by the router.
    pub fn new(handle: ManagerHandle, exporter: Exporter) -> Self {
        Self { handle, exporter }
    }
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Detailed manager status, captured output included.
pub async fn get_manager(State(state): State<ApiState>) -> Json<ManagerStatus> {
    Json(state.handle.status().await)
}

/// Manager status without captured output.
pub async fn get_manager_summary(State(state): State<ApiState>) -> Json<ManagerSummary> {
    Json(state.handle.summary().await)
}

/// Resume admissions.
pub async fn start_manager(
    State(state): State<ApiState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.handle.start().await?;
    Ok(Json(MessageResponse::new("manager started")))
}

/// Pause admissions.
pub async fn stop_manager(
    State(state): State<ApiState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.handle.stop().await?;
    Ok(Json(MessageResponse::new("manager stopped")))
}

/// Stop the manager and terminate its decision loop.
pub async fn exit_manager(
    State(state): State<ApiState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.handle.exit().await?;
    Ok(Json(MessageResponse::new("manager exited")))
}

/// Trigger a job without waiting for it.
pub async fn trigger_job(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<TriggerResponse>, ApiError> {
    state.handle.trigger(&name)?;
    Ok(Json(TriggerResponse {
        message: format!("job '{}' triggered", name),
        job: name,
    }))
}

/// Prometheus text exposition of the sync metrics.
pub async fn metrics(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .exporter
        .render_prometheus()
        .map_err(|e| ApiError::Internal(format!("failed to encode metrics: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

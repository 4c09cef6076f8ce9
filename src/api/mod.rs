//! HTTP API module for the mirrorsync manager.
//!
//! Provides REST endpoints for querying status, controlling the manager and
//! triggering jobs, plus a Prometheus metrics endpoint.

mod errors;
mod handlers;
mod responses;

pub use errors::{ApiError, ErrorResponse};
pub use handlers::ApiState;
pub use responses::*;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{DEFAULT_API_ADDRESS, JsonApiConfig};

/// Configuration for the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Address to bind to, `host:port` or `:port`.
    pub address: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_ADDRESS)
    }
}

impl From<&JsonApiConfig> for ApiConfig {
    fn from(config: &JsonApiConfig) -> Self {
        Self::new(config.address.clone())
    }
}

impl ApiConfig {
    /// Create a new API config for an address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Address in a form the listener accepts. A bare `:port` binds every
    /// interface.
    pub fn bind_address(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }
}

/// Build the API router with all endpoints.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(handlers::health))
        // Manager control
        .route(
            "/api/v1/manager",
            get(handlers::get_manager).delete(handlers::exit_manager),
        )
        .route("/api/v1/manager/summary", get(handlers::get_manager_summary))
        .route("/api/v1/manager/start", post(handlers::start_manager))
        .route("/api/v1/manager/stop", post(handlers::stop_manager))
        // Jobs
        .route("/api/v1/jobs/{name}/trigger", post(handlers::trigger_job))
        // Metrics
        .route("/metrics", get(handlers::metrics))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Start the API server.
///
/// This function spawns the server and returns a handle to the task.
/// The server runs until the task is aborted or the process exits.
pub async fn start_server(
    config: ApiConfig,
    state: ApiState,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let router = build_router(state);
    let listener = TcpListener::bind(config.bind_address()).await?;
    let addr = listener.local_addr()?;
    tracing::info!("API server listening on http://{}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        assert_eq!(ApiConfig::new(":7001").bind_address(), "0.0.0.0:7001");
        assert_eq!(ApiConfig::new("127.0.0.1:80").bind_address(), "127.0.0.1:80");
        assert_eq!(ApiConfig::default().address, "127.0.0.1:7001");
    }

    #[test]
    fn test_from_json_api_config() {
        let config = ApiConfig::from(&JsonApiConfig {
            address: ":9000".into(),
        });

        assert_eq!(config.bind_address(), "0.0.0.0:9000");
    }
}

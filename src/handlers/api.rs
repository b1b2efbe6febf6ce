//! General API handlers

use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// Health check response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status, always "ok" when the server is responding
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Upstream connection state
    pub upstream: String,
    /// Number of attached relay connections
    pub connections: usize,
}

/// Health check endpoint
///
/// Reports the server status along with the current upstream connection
/// state and attached client count.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        upstream: state.session.upstream_state().await.to_string(),
        connections: state.session.connection_count(),
    })
}

//! Relay WebSocket route configuration
//!
//! Configures the WebSocket endpoint that bridges relay clients to the
//! upstream realtime speech API.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::relay::relay_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the Relay WebSocket router
///
/// # Endpoint
///
/// `GET /relay` - WebSocket upgrade for audio relaying
///
/// # Protocol
///
/// After WebSocket upgrade, clients send:
/// 1. `start_stream` to join the shared upstream session
/// 2. Binary audio frames (PCM 16-bit, 24kHz, mono)
/// 3. `create_response` to ask the model to speak
///
/// Server responds with:
/// - `stream_started` once the upstream session is ready
/// - Binary audio frames with the model's spoken output
/// - `response_done` when a response finishes
/// - `error` on failures
///
/// # Example
///
/// ```json
/// // Client joins the session
/// {"type": "start_stream"}
///
/// // Server responds
/// {"type": "stream_started", "connection_id": "...", "sample_rate": 24000}
///
/// // Client streams audio as binary frames, then asks for a reply
/// {"type": "create_response"}
/// ```
pub fn create_relay_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/relay", get(relay_handler))
        .layer(TraceLayer::new_for_http())
}

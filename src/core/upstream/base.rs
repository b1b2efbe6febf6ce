//! Base trait and types for the upstream realtime speech session.
//!
//! The upstream session owns the single connection to the realtime backend.
//! All attached client connections share it; lifecycle is driven by the
//! connection registry (first attach connects, last detach disconnects).
//!
//! # Audio Format
//!
//! Audio is PCM 16-bit signed little-endian at 24kHz, mono.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::error::{RelayError, RelayResult};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the upstream realtime session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API key for authentication
    pub api_key: String,

    /// Model to use (e.g., "gpt-4o-realtime-preview")
    #[serde(default)]
    pub model: String,

    /// Voice ID for synthesized output
    #[serde(default)]
    pub voice: Option<String>,

    /// System instructions for the assistant
    #[serde(default)]
    pub instructions: Option<String>,

    /// Temperature for response generation (0.0 to 2.0)
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Connect timeout in milliseconds. A bounded connect avoids hanging
    /// the first attach forever on an unreachable backend.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: String::new(),
            voice: None,
            instructions: None,
            temperature: None,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state of the upstream session.
///
/// Transitions: `Disconnected --ensure_connected--> Connecting --success-->
/// Connected`; `Connected --disconnect--> Disconnected`; `Connecting
/// --failure--> Disconnected` (the failure is reported to the caller, never
/// retried by the session itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to the backend
    #[default]
    Disconnected,
    /// Connect attempt in flight
    Connecting,
    /// Connected and ready
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

// =============================================================================
// Response Events
// =============================================================================

/// A decoded assistant audio payload from the upstream session.
#[derive(Debug, Clone)]
pub struct UpstreamAudio {
    /// Raw audio bytes (PCM 16-bit, 24kHz, mono, little-endian)
    pub data: Bytes,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Item ID from the backend
    pub item_id: Option<String>,
    /// Response ID from the backend
    pub response_id: Option<String>,
}

/// Callback type for assistant audio payloads.
pub type AudioCallback =
    Arc<dyn Fn(UpstreamAudio) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for upstream error events.
pub type ErrorCallback =
    Arc<dyn Fn(RelayError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for response completion, carrying the response ID.
pub type ResponseDoneCallback =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Base Trait
// =============================================================================

/// The upstream realtime speech session.
///
/// Implementations never reconnect automatically: a dropped connection mid
/// stream would silently reorder or duplicate audio across the rebuilt
/// connection, so connection errors are reported to the caller and a fresh
/// [`ensure_connected`](RealtimeUpstream::ensure_connected) is the caller's
/// decision.
#[async_trait]
pub trait RealtimeUpstream: Send + Sync {
    /// Connect to the backend if not already connected.
    ///
    /// Idempotent: returns immediately when already connected. On failure
    /// the session transitions back to `Disconnected` and the error is
    /// returned as [`RelayError::ConnectFailure`] or [`RelayError::Timeout`].
    async fn ensure_connected(&mut self) -> RelayResult<()>;

    /// Disconnect from the backend. Idempotent and safe to call when
    /// already disconnected.
    async fn disconnect(&mut self) -> RelayResult<()>;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Whether the session is connected and ready to accept frames.
    fn is_ready(&self) -> bool;

    /// Forward one PCM frame of input audio to the backend.
    ///
    /// Fails with [`RelayError::NotConnected`] unless the session is
    /// `Connected`; callers must `ensure_connected` first.
    async fn send_frame(&mut self, frame: Bytes) -> RelayResult<()>;

    /// Signal the backend to synthesize a reply from buffered input.
    ///
    /// Same `NotConnected` rule as [`send_frame`](RealtimeUpstream::send_frame).
    async fn request_response(&mut self) -> RelayResult<()>;

    /// Register a callback for assistant audio payloads.
    fn on_audio(&mut self, callback: AudioCallback);

    /// Register a callback for upstream error events.
    fn on_error(&mut self, callback: ErrorCallback);

    /// Register a callback for response completion.
    fn on_response_done(&mut self, callback: ResponseDoneCallback);
}

/// Boxed trait object for upstream sessions.
pub type BoxedUpstream = Box<dyn RealtimeUpstream>;

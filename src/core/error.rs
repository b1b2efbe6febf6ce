//! Error types shared across the relay core.
//!
//! Propagation policy: device and connect errors are reported to the invoking
//! caller/connection and logged. They are never silently swallowed and never
//! crash the process; one connection's failure must not affect the others.
//! Reconnection is caller-initiated, not automatic.

use thiserror::Error;

/// Errors that can occur during relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Operation attempted while the upstream session is not connected
    #[error("Not connected")]
    NotConnected,

    /// Upstream connect attempt failed
    #[error("Connection failed: {0}")]
    ConnectFailure(String),

    /// Empty or malformed audio response payload
    #[error("Invalid audio payload: {0}")]
    InvalidAudioPayload(String),

    /// Microphone/speaker failure
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Upstream provider reported an error
    #[error("Upstream error: {0}")]
    UpstreamError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    /// Short machine-readable code for the client-facing `error` message.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::NotConnected => "not_connected",
            RelayError::ConnectFailure(_) => "connect_failure",
            RelayError::InvalidAudioPayload(_) => "invalid_audio_payload",
            RelayError::DeviceError(_) => "device_error",
            RelayError::Timeout(_) => "timeout",
            RelayError::WebSocketError(_) => "websocket_error",
            RelayError::SerializationError(_) => "serialization_error",
            RelayError::UpstreamError(_) => "upstream_error",
            RelayError::InvalidConfiguration(_) => "invalid_configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelayError::ConnectFailure("dns".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = RelayError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(RelayError::NotConnected.code(), "not_connected");
        assert_eq!(
            RelayError::InvalidAudioPayload("empty".into()).code(),
            "invalid_audio_payload"
        );
        assert_eq!(RelayError::Timeout("connect".into()).code(), "timeout");
    }
}

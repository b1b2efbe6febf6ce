//! Relay WebSocket message types
//!
//! Defines the control-message protocol between relay clients and the
//! server. Audio travels as raw binary WebSocket frames in both directions;
//! JSON text frames carry the control events defined here.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Maximum allowed size for a JSON control message (16 KB)
pub const MAX_CONTROL_SIZE: usize = 16 * 1024;

/// Maximum allowed size for a single binary audio frame (1 MB)
pub const MAX_AUDIO_FRAME_SIZE: usize = 1024 * 1024;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket control messages from a relay client
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum RelayIncomingMessage {
    /// Begin streaming; the server attaches the connection to the shared
    /// session (connecting upstream if this is the first client)
    #[serde(rename = "start_stream")]
    StartStream,

    /// Request the model to generate a spoken response from the audio
    /// streamed so far
    #[serde(rename = "create_response")]
    CreateResponse,

    /// Discard any audio buffered since the last complete frame
    #[serde(rename = "reset_audio")]
    ResetAudio,
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Outgoing WebSocket control messages to a relay client
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum RelayOutgoingMessage {
    /// Streaming is active and the upstream session is ready
    #[serde(rename = "stream_started")]
    StreamStarted {
        /// Connection ID assigned by the server
        connection_id: String,
        /// PCM sample rate for both directions (Hz)
        sample_rate: u32,
    },

    /// Audio buffer was reset
    #[serde(rename = "audio_reset")]
    AudioReset {
        /// Bytes discarded from the partial frame buffer
        discarded_bytes: usize,
    },

    /// Response generation completed
    #[serde(rename = "response_done")]
    ResponseDone {
        /// Response ID
        response_id: String,
    },

    /// Error message
    #[serde(rename = "error")]
    Error {
        /// Error code (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// Error message
        message: String,
    },
}

// =============================================================================
// Message Routing
// =============================================================================

/// Message routing for the per-connection sender task
pub enum RelayMessageRoute {
    /// JSON text message
    Outgoing(RelayOutgoingMessage),
    /// Binary audio data
    Audio(Bytes),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stream_deserialization() {
        let json = r#"{"type": "start_stream"}"#;
        let msg: RelayIncomingMessage = serde_json::from_str(json).expect("Should deserialize");
        assert!(matches!(msg, RelayIncomingMessage::StartStream));
    }

    #[test]
    fn test_create_response_deserialization() {
        let json = r#"{"type": "create_response"}"#;
        let msg: RelayIncomingMessage = serde_json::from_str(json).expect("Should deserialize");
        assert!(matches!(msg, RelayIncomingMessage::CreateResponse));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"type": "mystery"}"#;
        assert!(serde_json::from_str::<RelayIncomingMessage>(json).is_err());
    }

    #[test]
    fn test_stream_started_serialization() {
        let msg = RelayOutgoingMessage::StreamStarted {
            connection_id: "conn_123".to_string(),
            sample_rate: 24000,
        };

        let json = serde_json::to_string(&msg).expect("Should serialize");
        assert!(json.contains(r#""type":"stream_started""#));
        assert!(json.contains(r#""connection_id":"conn_123""#));
        assert!(json.contains(r#""sample_rate":24000"#));
    }

    #[test]
    fn test_error_serialization() {
        let msg = RelayOutgoingMessage::Error {
            code: Some("not_connected".to_string()),
            message: "Upstream session is not connected".to_string(),
        };

        let json = serde_json::to_string(&msg).expect("Should serialize");
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""code":"not_connected""#));
    }

    #[test]
    fn test_error_serialization_without_code() {
        let msg = RelayOutgoingMessage::Error {
            code: None,
            message: "boom".to_string(),
        };

        let json = serde_json::to_string(&msg).expect("Should serialize");
        assert!(!json.contains("code"));
    }

    #[test]
    fn test_audio_reset_serialization() {
        let msg = RelayOutgoingMessage::AudioReset {
            discarded_bytes: 1200,
        };

        let json = serde_json::to_string(&msg).expect("Should serialize");
        assert!(json.contains(r#""type":"audio_reset""#));
        assert!(json.contains(r#""discarded_bytes":1200"#));
    }
}

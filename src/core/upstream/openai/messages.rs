//! OpenAI Realtime API WebSocket event types.
//!
//! JSON events exchanged over the upstream WebSocket. Only the subset the
//! relay uses is modeled here.
//!
//! Client events (sent to the backend):
//! - `session.update` - Configure session voice/format/turn detection
//! - `input_audio_buffer.append` - Append base64 audio to the input buffer
//! - `input_audio_buffer.commit` - Commit the buffered input
//! - `response.create` - Generate a response from committed input
//!
//! Server events (received from the backend):
//! - `session.created` / `session.updated`
//! - `response.audio.delta` - Base64 chunk of synthesized audio
//! - `response.done` - Response generation complete
//! - `error`

use base64::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent with `session.update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Input audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    /// Output audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    /// Turn detection configuration; `None {}` disables server VAD so the
    /// relay controls response timing explicitly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    /// Temperature for response generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Silence duration in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    /// No turn detection
    #[serde(rename = "none")]
    None {},
}

// =============================================================================
// Client Events (sent to the backend)
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append audio to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Commit the input audio buffer
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    /// Create an audio append event from raw PCM bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }
}

// =============================================================================
// Server Events (received from the backend)
// =============================================================================

/// Server events received from the OpenAI Realtime API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error {
        /// Error details
        error: ApiError,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        /// Session information
        session: Session,
    },

    /// Session updated
    #[serde(rename = "session.updated")]
    SessionUpdated {
        /// Session information
        session: Session,
    },

    /// Audio buffer committed
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {
        /// New item ID
        item_id: String,
    },

    /// Chunk of synthesized audio
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Response ID
        response_id: String,
        /// Item ID
        item_id: String,
        /// Base64-encoded audio data
        delta: String,
    },

    /// Audio generation for an item complete
    #[serde(rename = "response.audio.done")]
    AudioDone {
        /// Response ID
        response_id: String,
        /// Item ID
        item_id: String,
    },

    /// Response complete
    #[serde(rename = "response.done")]
    ResponseDone {
        /// Response summary
        response: ResponseSummary,
    },

    /// Any event type the relay does not act on
    #[serde(other)]
    Unhandled,
}

impl ServerEvent {
    /// Decode base64 audio from an `AudioDelta` event payload.
    pub fn decode_audio_delta(delta: &str) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(delta)
    }
}

/// Error details from the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

/// Session information from the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    /// Session ID
    pub id: String,
    /// Model in use
    #[serde(default)]
    pub model: Option<String>,
}

/// Response summary from `response.done`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseSummary {
    /// Response ID
    pub id: String,
    /// Final status (completed, cancelled, failed, incomplete)
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_append_round_trip() {
        let data = vec![1u8, 2, 3, 4];
        let event = ClientEvent::audio_append(&data);
        match &event {
            ClientEvent::InputAudioBufferAppend { audio } => {
                assert_eq!(BASE64_STANDARD.decode(audio).unwrap(), data);
            }
            _ => panic!("Expected InputAudioBufferAppend"),
        }

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"input_audio_buffer.append""#));
    }

    #[test]
    fn test_commit_serialization() {
        let json = serde_json::to_string(&ClientEvent::InputAudioBufferCommit).unwrap();
        assert_eq!(json, r#"{"type":"input_audio_buffer.commit"}"#);
    }

    #[test]
    fn test_session_update_skips_none_fields() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig {
                voice: Some("alloy".to_string()),
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""voice":"alloy""#));
        assert!(!json.contains("instructions"));
    }

    #[test]
    fn test_audio_delta_deserialization() {
        let encoded = BASE64_STANDARD.encode([0u8, 1, 2, 3]);
        let json = format!(
            r#"{{"type":"response.audio.delta","response_id":"resp_1","item_id":"item_1","delta":"{encoded}"}}"#
        );
        let event: ServerEvent = serde_json::from_str(&json).unwrap();
        match event {
            ServerEvent::AudioDelta { delta, item_id, .. } => {
                assert_eq!(item_id, "item_1");
                assert_eq!(
                    ServerEvent::decode_audio_delta(&delta).unwrap(),
                    vec![0, 1, 2, 3]
                );
            }
            _ => panic!("Expected AudioDelta"),
        }
    }

    #[test]
    fn test_error_deserialization() {
        let json = r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad"}}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::Error { error } => {
                assert_eq!(error.error_type, "invalid_request_error");
                assert_eq!(error.message, "bad");
            }
            _ => panic!("Expected Error"),
        }
    }

    #[test]
    fn test_unknown_event_is_unhandled() {
        let json = r#"{"type":"rate_limits.updated","rate_limits":[]}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::Unhandled));
    }
}

//! OpenAI Realtime API configuration types.

use serde::{Deserialize, Serialize};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Audio sample rate used by the Realtime API in pcm16 mode.
pub const OPENAI_REALTIME_SAMPLE_RATE: u32 = 24000;

/// Supported OpenAI Realtime models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenAiRealtimeModel {
    /// GPT-4o Realtime Preview model
    #[default]
    #[serde(rename = "gpt-4o-realtime-preview")]
    Gpt4oRealtimePreview,
    /// GPT-4o Realtime Preview 2024-12-17
    #[serde(rename = "gpt-4o-realtime-preview-2024-12-17")]
    Gpt4oRealtimePreview20241217,
    /// GPT-4o Mini Realtime Preview
    #[serde(rename = "gpt-4o-mini-realtime-preview")]
    Gpt4oMiniRealtimePreview,
}

impl OpenAiRealtimeModel {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4oRealtimePreview => "gpt-4o-realtime-preview",
            Self::Gpt4oRealtimePreview20241217 => "gpt-4o-realtime-preview-2024-12-17",
            Self::Gpt4oMiniRealtimePreview => "gpt-4o-mini-realtime-preview",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "gpt-4o-realtime-preview" => Self::Gpt4oRealtimePreview,
            "gpt-4o-realtime-preview-2024-12-17" => Self::Gpt4oRealtimePreview20241217,
            "gpt-4o-mini-realtime-preview" => Self::Gpt4oMiniRealtimePreview,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for OpenAiRealtimeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Available voices for the Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAiRealtimeVoice {
    /// Alloy voice (default)
    #[default]
    Alloy,
    /// Ash voice
    Ash,
    /// Coral voice
    Coral,
    /// Echo voice
    Echo,
    /// Sage voice
    Sage,
    /// Shimmer voice
    Shimmer,
    /// Verse voice
    Verse,
}

impl OpenAiRealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "alloy" => Self::Alloy,
            "ash" => Self::Ash,
            "coral" => Self::Coral,
            "echo" => Self::Echo,
            "sage" => Self::Sage,
            "shimmer" => Self::Shimmer,
            "verse" => Self::Verse,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for OpenAiRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_as_str() {
        assert_eq!(
            OpenAiRealtimeModel::Gpt4oRealtimePreview.as_str(),
            "gpt-4o-realtime-preview"
        );
    }

    #[test]
    fn test_model_from_str_falls_back() {
        assert_eq!(
            OpenAiRealtimeModel::from_str_or_default("unknown"),
            OpenAiRealtimeModel::Gpt4oRealtimePreview
        );
        assert_eq!(
            OpenAiRealtimeModel::from_str_or_default("gpt-4o-mini-realtime-preview"),
            OpenAiRealtimeModel::Gpt4oMiniRealtimePreview
        );
    }

    #[test]
    fn test_voice_from_str() {
        assert_eq!(
            OpenAiRealtimeVoice::from_str_or_default("SHIMMER"),
            OpenAiRealtimeVoice::Shimmer
        );
        assert_eq!(
            OpenAiRealtimeVoice::from_str_or_default("unknown"),
            OpenAiRealtimeVoice::Alloy
        );
    }
}

//! OpenAI Realtime API upstream implementation.

pub mod client;
pub mod config;
pub mod messages;

pub use client::OpenAiUpstream;
pub use config::{
    OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAiRealtimeModel, OpenAiRealtimeVoice,
};

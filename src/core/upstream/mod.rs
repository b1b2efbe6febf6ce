//! Upstream realtime session abstraction and implementations.

pub mod base;
pub mod openai;

pub use base::{
    AudioCallback, BoxedUpstream, ConnectionState, ErrorCallback, RealtimeUpstream,
    ResponseDoneCallback, UpstreamAudio, UpstreamConfig,
};
pub use openai::OpenAiUpstream;

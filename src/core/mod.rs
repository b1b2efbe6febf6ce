pub mod audio;
pub mod device;
pub mod error;
pub mod relay;
pub mod upstream;

// Re-export commonly used types for convenience
pub use audio::{AudioChunker, DEFAULT_FRAME_BYTES, RELAY_SAMPLE_RATE};

pub use error::{RelayError, RelayResult};

pub use relay::{
    BroadcastReport, Broadcaster, ConnectionRegistry, Delivery, DeliverySender, RelaySession,
    RelaySessionConfig,
};

pub use upstream::{
    AudioCallback, BoxedUpstream, ConnectionState, ErrorCallback, OpenAiUpstream,
    RealtimeUpstream, ResponseDoneCallback, UpstreamAudio, UpstreamConfig,
};

pub use device::{AudioSink, AudioSource, DeviceBridge, SourceEvent};

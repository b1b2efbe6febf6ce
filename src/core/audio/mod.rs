//! PCM audio buffering primitives.

pub mod chunker;

pub use chunker::{AudioChunker, DEFAULT_FRAME_BYTES};

/// Sample rate used by the upstream realtime session (Hz).
pub const RELAY_SAMPLE_RATE: u32 = 24000;

/// Bytes per 16-bit mono PCM sample.
pub const BYTES_PER_SAMPLE: usize = 2;

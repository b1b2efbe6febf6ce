//! Fixed-size PCM frame chunker.
//!
//! Accumulates raw PCM bytes and cuts them into fixed-size frames for the
//! upstream session. The frame size is a configuration constant and is not
//! renegotiated mid-stream.

use bytes::{Bytes, BytesMut};

/// Default frame size in bytes: 2400 samples of 16-bit mono PCM,
/// 0.1 s at 24 kHz.
pub const DEFAULT_FRAME_BYTES: usize = 4800;

/// Accumulates raw PCM bytes and emits fixed-size frames.
///
/// `append` grows the internal accumulator; `drain` splits complete frames
/// off the front, leaving any remainder (< frame size) buffered for the next
/// append. No frame is ever emitted twice and no byte is dropped except
/// through [`AudioChunker::reset`].
#[derive(Debug)]
pub struct AudioChunker {
    frame_bytes: usize,
    buffer: BytesMut,
}

impl AudioChunker {
    /// Create a chunker emitting frames of `frame_bytes` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `frame_bytes` is zero.
    pub fn new(frame_bytes: usize) -> Self {
        assert!(frame_bytes > 0, "frame size must be non-zero");
        Self {
            frame_bytes,
            buffer: BytesMut::with_capacity(frame_bytes * 2),
        }
    }

    /// The configured frame size in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Number of buffered bytes not yet emitted as a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append raw PCM bytes to the accumulator.
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Split all complete frames off the front of the accumulator.
    ///
    /// After a drain pass the remainder is always shorter than one frame.
    pub fn drain(&mut self) -> impl Iterator<Item = Bytes> + '_ {
        std::iter::from_fn(move || {
            if self.buffer.len() >= self.frame_bytes {
                Some(self.buffer.split_to(self.frame_bytes).freeze())
            } else {
                None
            }
        })
    }

    /// Emit the buffered remainder as one final short frame, if any.
    ///
    /// Used before requesting a response so trailing audio shorter than a
    /// frame is still forwarded upstream instead of being lost.
    pub fn flush(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.split().freeze())
        }
    }

    /// Discard any buffered remainder, returning how many bytes were lost.
    ///
    /// This is a deliberate data-loss point for stream restarts: whatever
    /// partial audio was buffered is not flushed upstream first. Callers
    /// should log the returned count.
    pub fn reset(&mut self) -> usize {
        let discarded = self.buffer.len();
        self.buffer.clear();
        discarded
    }
}

impl Default for AudioChunker {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_BYTES)
    }
}

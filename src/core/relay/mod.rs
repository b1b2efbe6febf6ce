//! The relay session core: connection registry, response broadcaster, and
//! the session object tying them to the upstream.

pub mod broadcast;
pub mod registry;
pub mod session;

use bytes::Bytes;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use registry::{ConnectionRegistry, DeliverySender};
pub use session::{RelaySession, RelaySessionConfig};

/// A payload delivered to an attached client connection.
///
/// The transport layer maps these onto its own wire format: audio as binary
/// frames, the rest as typed JSON messages.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Assistant audio payload (PCM 16-bit mono)
    Audio(Bytes),
    /// Upstream response generation completed
    ResponseDone(String),
    /// Error signal affecting the shared session
    Error {
        /// Machine-readable error code
        code: String,
        /// Human-readable reason
        message: String,
    },
}

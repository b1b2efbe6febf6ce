//! Relay WebSocket handler and message types

pub mod handler;
pub mod messages;

pub use handler::relay_handler;
pub use messages::{RelayIncomingMessage, RelayMessageRoute, RelayOutgoingMessage};

//! HTTP and WebSocket request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Health check endpoint
//! - `relay` - Relay WebSocket bridging clients to the upstream speech API

pub mod api;
pub mod relay;

// Re-export commonly used handlers for convenient access
pub use relay::relay_handler;

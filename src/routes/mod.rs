//! Route configuration

pub mod api;
pub mod relay;

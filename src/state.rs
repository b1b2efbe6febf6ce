//! Shared application state

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::error::RelayResult;
use crate::core::relay::RelaySession;
use crate::core::upstream::OpenAiUpstream;

/// Application state shared across all handlers.
///
/// Holds the server configuration and the single relay session every client
/// connection attaches to.
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// The shared relay session
    pub session: Arc<RelaySession>,
}

impl AppState {
    /// Create the application state, building the upstream session from the
    /// configuration. The upstream is not connected here; the first client
    /// to start streaming triggers the connect.
    pub fn new(config: ServerConfig) -> RelayResult<Arc<Self>> {
        let upstream = OpenAiUpstream::new(config.upstream_config()?)?;
        let session = RelaySession::new(Box::new(upstream), config.relay_config());
        Ok(Arc::new(Self { config, session }))
    }

    /// Create state around an existing session, used by tests to inject a
    /// scripted upstream.
    pub fn with_session(config: ServerConfig, session: Arc<RelaySession>) -> Arc<Self> {
        Arc::new(Self { config, session })
    }
}

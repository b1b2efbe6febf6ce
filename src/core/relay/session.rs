//! The relay session: one upstream realtime connection shared by all
//! attached client connections.
//!
//! Constructed once at process start and handed to every connection handler
//! through the application state; there is no global mutable session state.
//!
//! # Ordering
//!
//! A single async mutex over the session interior (chunker + upstream)
//! serializes append, drain, send, and lifecycle transitions, so input
//! frames reach the upstream in append order. Responses are broadcast in
//! arrival order by the broadcaster, which runs off the upstream callbacks
//! and only snapshots the registry. Detaching the last connection triggers
//! upstream teardown but never aborts a send already in flight: the send
//! holds the interior lock until it completes or fails.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::audio::{AudioChunker, DEFAULT_FRAME_BYTES, RELAY_SAMPLE_RATE};
use crate::core::error::RelayResult;
use crate::core::upstream::{BoxedUpstream, ConnectionState};

use super::broadcast::Broadcaster;
use super::registry::{ConnectionRegistry, DeliverySender};

/// Relay session tuning.
#[derive(Debug, Clone)]
pub struct RelaySessionConfig {
    /// Input frame size in bytes. Fixed for the session lifetime.
    pub frame_bytes: usize,
    /// PCM sample rate shared with clients and upstream (Hz).
    pub sample_rate: u32,
}

impl Default for RelaySessionConfig {
    fn default() -> Self {
        Self {
            frame_bytes: DEFAULT_FRAME_BYTES,
            sample_rate: RELAY_SAMPLE_RATE,
        }
    }
}

struct SessionInner {
    chunker: AudioChunker,
    upstream: BoxedUpstream,
}

/// One shared relay session.
pub struct RelaySession {
    config: RelaySessionConfig,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
    inner: Mutex<SessionInner>,
}

impl RelaySession {
    /// Build a session around an upstream implementation.
    ///
    /// Upstream callbacks are wired to the broadcaster here, before any
    /// connect, so no early response can slip past the fan-out.
    pub fn new(mut upstream: BoxedUpstream, config: RelaySessionConfig) -> Arc<Self> {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));

        let audio_broadcaster = broadcaster.clone();
        upstream.on_audio(Arc::new(move |audio| {
            let broadcaster = audio_broadcaster.clone();
            Box::pin(async move {
                // Invalid payloads are already reported as an error signal.
                let _ = broadcaster.broadcast_audio(&audio).await;
            })
        }));

        let error_broadcaster = broadcaster.clone();
        upstream.on_error(Arc::new(move |error| {
            let broadcaster = error_broadcaster.clone();
            Box::pin(async move {
                broadcaster.broadcast_error(&error).await;
            })
        }));

        let done_broadcaster = broadcaster.clone();
        upstream.on_response_done(Arc::new(move |response_id| {
            let broadcaster = done_broadcaster.clone();
            Box::pin(async move {
                broadcaster.broadcast_response_done(response_id).await;
            })
        }));

        Arc::new(Self {
            inner: Mutex::new(SessionInner {
                chunker: AudioChunker::new(config.frame_bytes),
                upstream,
            }),
            config,
            registry,
            broadcaster,
        })
    }

    /// Session tuning.
    pub fn config(&self) -> &RelaySessionConfig {
        &self.config
    }

    /// The broadcaster fanning out upstream payloads.
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Number of currently attached connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Current upstream connection state.
    pub async fn upstream_state(&self) -> ConnectionState {
        self.inner.lock().await.upstream.state()
    }

    /// Attach a client connection.
    ///
    /// The first attachment connects the upstream session. If that connect
    /// fails the attachment is rolled back and the error returned, leaving
    /// the session ready for the next attempt.
    pub async fn attach(&self, id: Uuid, sender: DeliverySender) -> RelayResult<()> {
        let mut inner = self.inner.lock().await;
        let first = self.registry.attach(id, sender);
        if first && let Err(e) = inner.upstream.ensure_connected().await {
            self.registry.detach(id);
            tracing::warn!(connection_id = %id, error = %e, "Upstream connect failed on first attach");
            return Err(e);
        }

        tracing::info!(
            connection_id = %id,
            attached = self.registry.len(),
            "Client connection attached"
        );
        Ok(())
    }

    /// Detach a client connection.
    ///
    /// When the last connection leaves, the upstream session is torn down
    /// and any buffered partial frame is discarded (the chunker's documented
    /// loss point; the discarded byte count is logged).
    pub async fn detach(&self, id: Uuid) {
        let mut inner = self.inner.lock().await;
        let now_empty = self.registry.detach(id);
        if now_empty {
            let discarded = inner.chunker.reset();
            if discarded > 0 {
                tracing::warn!(
                    discarded_bytes = discarded,
                    "Discarding partial input frame on last detach"
                );
            }
            if let Err(e) = inner.upstream.disconnect().await {
                tracing::error!(error = %e, "Upstream disconnect failed");
            }
        }

        tracing::info!(
            connection_id = %id,
            attached = self.registry.len(),
            "Client connection detached"
        );
    }

    /// Append raw PCM input and forward every complete frame upstream.
    ///
    /// Returns the number of frames forwarded. Frames go out in append
    /// order; a leftover remainder shorter than one frame stays buffered.
    pub async fn append_audio(&self, data: &[u8]) -> RelayResult<usize> {
        let mut inner = self.inner.lock().await;
        let SessionInner { chunker, upstream } = &mut *inner;

        chunker.append(data);
        let frames: Vec<Bytes> = chunker.drain().collect();
        let count = frames.len();
        for frame in frames {
            upstream.send_frame(frame).await?;
        }
        Ok(count)
    }

    /// Ask the upstream to synthesize a reply from the input streamed so
    /// far. Any buffered partial frame is flushed first so trailing audio
    /// is not lost.
    pub async fn request_response(&self) -> RelayResult<()> {
        let mut inner = self.inner.lock().await;
        let SessionInner { chunker, upstream } = &mut *inner;

        if let Some(tail) = chunker.flush() {
            tracing::debug!(bytes = tail.len(), "Flushing partial frame before response");
            upstream.send_frame(tail).await?;
        }
        upstream.request_response().await
    }

    /// Discard buffered input that has not been forwarded yet.
    ///
    /// Deliberate data loss for stream restarts; returns the number of
    /// bytes discarded.
    pub async fn reset_input(&self) -> usize {
        let discarded = self.inner.lock().await.chunker.reset();
        if discarded > 0 {
            tracing::warn!(discarded_bytes = discarded, "Input buffer reset");
        }
        discarded
    }
}

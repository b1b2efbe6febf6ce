//! Local audio device seam.
//!
//! Models the microphone and speaker collaborators behind traits so a local
//! capture/playback pair can ride the relay session exactly like a remote
//! client connection. OS-level device bindings live outside this crate;
//! implementations of these traits adapt them (or stand in for them in
//! tests).

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::error::{RelayError, RelayResult};
use crate::core::relay::{Delivery, RelaySession};

/// Buffer size for the bridge's delivery channel.
const BRIDGE_CHANNEL_SIZE: usize = 64;

/// An event produced by a capture device.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// Raw PCM bytes captured from the device
    Data(Bytes),
    /// Input has fallen idle beyond the device's silence threshold
    Silence,
}

/// A microphone-like capture device.
#[async_trait]
pub trait AudioSource: Send {
    /// Next capture event; `None` when the stream has ended.
    async fn next_event(&mut self) -> RelayResult<Option<SourceEvent>>;
}

/// A speaker-like playback device.
#[async_trait]
pub trait AudioSink: Send {
    /// Queue a PCM payload for playback, returning once the device has
    /// accepted it.
    async fn play(&mut self, audio: Bytes) -> RelayResult<()>;
}

/// Bridges one capture/playback device pair onto a relay session.
///
/// The bridge attaches as an ordinary connection: captured audio is
/// appended to the session, a silence event requests a response, and
/// broadcast audio is handed to the sink. Device errors are reported via
/// the returned result, never panicked on, and the bridge always detaches
/// on exit so the last-out-disconnects policy holds.
pub struct DeviceBridge {
    session: Arc<RelaySession>,
    id: Uuid,
}

impl DeviceBridge {
    /// Create a bridge for the given session.
    pub fn new(session: Arc<RelaySession>) -> Self {
        Self {
            session,
            id: Uuid::new_v4(),
        }
    }

    /// The bridge's connection ID in the session registry.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run the bridge until the source ends or a device/session error
    /// occurs.
    pub async fn run<S, K>(&self, mut source: S, mut sink: K) -> RelayResult<()>
    where
        S: AudioSource,
        K: AudioSink + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Delivery>(BRIDGE_CHANNEL_SIZE);
        self.session.attach(self.id, tx).await?;

        // Playback side: drain deliveries into the sink until the session
        // drops the channel or the sink fails.
        let playback = tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                match delivery {
                    Delivery::Audio(audio) => {
                        if let Err(e) = sink.play(audio).await {
                            tracing::error!(error = %e, "Speaker playback failed");
                            return Err(e);
                        }
                    }
                    Delivery::ResponseDone(response_id) => {
                        tracing::debug!(response_id = %response_id, "Playback response complete");
                    }
                    Delivery::Error { code, message } => {
                        tracing::warn!(code = %code, "Session error during playback: {}", message);
                    }
                }
            }
            Ok(())
        });

        // Capture side: pump the source into the session.
        let capture_result = self.pump_source(&mut source).await;

        self.session.detach(self.id).await;

        // Detaching closes the delivery channel, which ends the playback
        // task; surface whichever side failed first.
        let playback_result = match playback.await {
            Ok(result) => result,
            Err(e) => Err(RelayError::DeviceError(format!(
                "playback task panicked: {e}"
            ))),
        };
        capture_result.and(playback_result)
    }

    async fn pump_source<S: AudioSource>(&self, source: &mut S) -> RelayResult<()> {
        loop {
            match source.next_event().await? {
                Some(SourceEvent::Data(data)) => {
                    self.session.append_audio(&data).await?;
                }
                Some(SourceEvent::Silence) => {
                    tracing::debug!("Microphone silence, requesting response");
                    self.session.request_response().await?;
                }
                None => {
                    tracing::info!("Capture stream ended");
                    return Ok(());
                }
            }
        }
    }
}

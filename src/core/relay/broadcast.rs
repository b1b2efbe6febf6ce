//! Fan-out of upstream responses to attached client connections.

use std::sync::Arc;

use crate::core::audio::BYTES_PER_SAMPLE;
use crate::core::error::{RelayError, RelayResult};
use crate::core::upstream::UpstreamAudio;

use super::Delivery;
use super::registry::ConnectionRegistry;

/// Outcome of one broadcast pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections that received the payload
    pub delivered: usize,
    /// Connections whose delivery failed (dead channel)
    pub failed: usize,
}

/// Delivers upstream payloads to every attached connection in registry
/// order.
///
/// Delivery failures are isolated per connection: a dead channel is logged
/// once and counted, and never prevents delivery to the remaining
/// connections.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    /// Create a broadcaster over the given registry.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Validate and fan out one assistant audio payload.
    ///
    /// Empty payloads and payloads that are not whole 16-bit samples are
    /// dropped: an error signal is broadcast instead and
    /// [`RelayError::InvalidAudioPayload`] is returned.
    pub async fn broadcast_audio(&self, audio: &UpstreamAudio) -> RelayResult<BroadcastReport> {
        if audio.data.is_empty() {
            let err = RelayError::InvalidAudioPayload("empty audio payload".to_string());
            tracing::error!(item_id = ?audio.item_id, "{}", err);
            self.broadcast_error(&err).await;
            return Err(err);
        }
        if audio.data.len() % BYTES_PER_SAMPLE != 0 {
            let err = RelayError::InvalidAudioPayload(format!(
                "payload of {} bytes is not whole 16-bit samples",
                audio.data.len()
            ));
            tracing::error!(item_id = ?audio.item_id, "{}", err);
            self.broadcast_error(&err).await;
            return Err(err);
        }

        let mut report = BroadcastReport::default();
        for (id, sender) in self.registry.snapshot() {
            match sender.send(Delivery::Audio(audio.data.clone())).await {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    report.failed += 1;
                    tracing::warn!(connection_id = %id, "Audio delivery failed, connection is gone");
                }
            }
        }

        tracing::trace!(
            bytes = audio.data.len(),
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast audio payload"
        );
        Ok(report)
    }

    /// Fan out an upstream error signal.
    pub async fn broadcast_error(&self, error: &RelayError) -> BroadcastReport {
        self.deliver(Delivery::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        })
        .await
    }

    /// Fan out a response completion notification.
    pub async fn broadcast_response_done(&self, response_id: String) -> BroadcastReport {
        self.deliver(Delivery::ResponseDone(response_id)).await
    }

    async fn deliver(&self, delivery: Delivery) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for (id, sender) in self.registry.snapshot() {
            match sender.send(delivery.clone()).await {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    report.failed += 1;
                    tracing::warn!(connection_id = %id, "Delivery failed, connection is gone");
                }
            }
        }
        report
    }
}

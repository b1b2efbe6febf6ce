//! Attached client connection registry.
//!
//! Pure membership tracking in attach order. The owning
//! [`RelaySession`](super::session::RelaySession) applies the lifecycle
//! policy: the first attachment connects the upstream session, the last
//! detachment tears it down, so no individual connection ever owns the
//! upstream ("last-out disconnects").

use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::Delivery;

/// Sending half of an attached connection's delivery channel.
pub type DeliverySender = mpsc::Sender<Delivery>;

/// Registry of currently attached client connections.
///
/// Invariant maintained by the owning session: the upstream session is
/// Connected if and only if this registry is non-empty, modulo the
/// asynchronous window during connect/disconnect.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<Vec<(Uuid, DeliverySender)>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Returns `true` if it was the first attachment.
    ///
    /// Re-attaching an already-known ID replaces its sender without
    /// changing its position.
    pub fn attach(&self, id: Uuid, sender: DeliverySender) -> bool {
        let mut connections = self.connections.lock();
        if let Some(slot) = connections.iter_mut().find(|(cid, _)| *cid == id) {
            slot.1 = sender;
            return false;
        }
        connections.push((id, sender));
        connections.len() == 1
    }

    /// Remove a connection. Returns `true` if the registry is now empty
    /// and the connection was actually removed.
    pub fn detach(&self, id: Uuid) -> bool {
        let mut connections = self.connections.lock();
        let before = connections.len();
        connections.retain(|(cid, _)| *cid != id);
        before != connections.len() && connections.is_empty()
    }

    /// Number of attached connections.
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Whether no connections are attached.
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Snapshot of the attached connections in attach order.
    pub fn snapshot(&self) -> Vec<(Uuid, DeliverySender)> {
        self.connections.lock().clone()
    }
}

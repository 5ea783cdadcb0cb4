//! In-process paired transport.

use crate::adapter::{NetworkAdapter, NetworkEvent};
use crate::error::{NetworkError, Result};
use crate::message::RepoMessage;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tidemark_types::PeerId;
use tokio::sync::mpsc;
use tracing::debug;

/// One end of an in-process transport connecting exactly two repos.
///
/// [`ChannelAdapter::pair`] wires two ends together over unbounded channels:
/// messages sent on one end arrive on the other in order, and each end
/// announces `Ready` followed by a `PeerCandidate` for its remote as soon as
/// the pair exists. [`ChannelAdapter::disconnect`] tears the link down from
/// either side.
pub struct ChannelAdapter {
    local_id: PeerId,
    remote_id: PeerId,
    connected: Arc<AtomicBool>,
    local_events_tx: mpsc::UnboundedSender<NetworkEvent>,
    local_events_rx: Mutex<Option<mpsc::UnboundedReceiver<NetworkEvent>>>,
    remote_events_tx: mpsc::UnboundedSender<NetworkEvent>,
}

impl ChannelAdapter {
    /// Create a connected pair of adapters for the two named peers.
    ///
    /// The first adapter belongs to `left` (and talks to `right`), the
    /// second to `right`.
    pub fn pair(left: PeerId, right: PeerId) -> (Arc<Self>, Arc<Self>) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));

        let left_end = Arc::new(Self {
            local_id: left.clone(),
            remote_id: right.clone(),
            connected: Arc::clone(&connected),
            local_events_tx: left_tx.clone(),
            local_events_rx: Mutex::new(Some(left_rx)),
            remote_events_tx: right_tx.clone(),
        });
        let right_end = Arc::new(Self {
            local_id: right.clone(),
            remote_id: left.clone(),
            connected,
            local_events_tx: right_tx.clone(),
            local_events_rx: Mutex::new(Some(right_rx)),
            remote_events_tx: left_tx.clone(),
        });

        // Channel transports have no setup phase: announce readiness and the
        // remote peer immediately.
        let _ = left_tx.send(NetworkEvent::Ready);
        let _ = left_tx.send(NetworkEvent::PeerCandidate {
            peer_id: right.clone(),
        });
        let _ = right_tx.send(NetworkEvent::Ready);
        let _ = right_tx.send(NetworkEvent::PeerCandidate { peer_id: left });

        (left_end, right_end)
    }

    /// The peer this end belongs to.
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    /// The peer this end talks to.
    pub fn remote_id(&self) -> &PeerId {
        &self.remote_id
    }

    /// Tear down the link from either end.
    ///
    /// Both ends observe a `PeerDisconnected` event; later sends on either
    /// end fail with [`NetworkError::Disconnected`]. Disconnecting twice is
    /// a no-op.
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!("channel {} <-> {} closed", self.local_id, self.remote_id);
            let _ = self.local_events_tx.send(NetworkEvent::PeerDisconnected {
                peer_id: self.remote_id.clone(),
            });
            let _ = self.remote_events_tx.send(NetworkEvent::PeerDisconnected {
                peer_id: self.local_id.clone(),
            });
        }
    }
}

#[async_trait]
impl NetworkAdapter for ChannelAdapter {
    async fn send(&self, message: RepoMessage) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(NetworkError::Disconnected);
        }
        self.remote_events_tx
            .send(NetworkEvent::Message(message))
            .map_err(|e| NetworkError::SendFailed(e.to_string()))
    }

    fn events(&self) -> Option<mpsc::UnboundedReceiver<NetworkEvent>> {
        self.local_events_rx.lock().take()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

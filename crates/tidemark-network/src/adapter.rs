//! The network adapter capability.

use crate::error::Result;
use crate::message::RepoMessage;
use async_trait::async_trait;
use tidemark_types::PeerId;
use tokio::sync::mpsc;

/// Events a network adapter surfaces to the repo.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    /// A remote peer became reachable over this adapter.
    ///
    /// Authentication and handshakes are transport concerns; the repo treats
    /// a candidate as a connected peer.
    PeerCandidate {
        /// The remote peer.
        peer_id: PeerId,
    },

    /// A previously announced peer is gone.
    PeerDisconnected {
        /// The remote peer.
        peer_id: PeerId,
    },

    /// A message arrived from the transport.
    Message(RepoMessage),

    /// The transport finished its own setup and can carry messages.
    Ready,
}

/// A bidirectional message transport between this repo and remote peers.
///
/// Adapters own transport-level framing; the repo only ever sees structured
/// [`RepoMessage`]s. An adapter may multiplex any number of remote peers.
#[async_trait]
pub trait NetworkAdapter: Send + Sync {
    /// Deliver `message` to its target peer.
    async fn send(&self, message: RepoMessage) -> Result<()>;

    /// Take the adapter's event stream.
    ///
    /// There is a single consumer: the first call returns the receiver,
    /// subsequent calls return `None`.
    fn events(&self) -> Option<mpsc::UnboundedReceiver<NetworkEvent>>;

    /// Whether the adapter can currently carry messages.
    fn is_connected(&self) -> bool;
}

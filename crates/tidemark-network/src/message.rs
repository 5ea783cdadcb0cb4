//! Wire messages exchanged between repos.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use tidemark_types::{DocumentId, PeerId};

/// A protocol message addressed from one repo to another.
///
/// `Sync` and `Request` carry an opaque CRDT sync payload; a request is a
/// sync message sent by a repo that does not hold the document yet and wants
/// it. `DocUnavailable` signals that the sender cannot supply the document.
/// `Ephemeral` carries transient application data (presence, cursors) that
/// never touches the document itself.
///
/// Transport handshakes (`arrive`/`welcome` and friends) are transport-local
/// and intentionally absent here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RepoMessage {
    /// CRDT sync payload for a document both ends know about.
    Sync {
        /// Sending repo.
        sender_id: PeerId,
        /// Receiving repo.
        target_id: PeerId,
        /// Document the payload belongs to.
        document_id: DocumentId,
        /// Encoded CRDT sync message.
        data: Vec<u8>,
    },

    /// Sync payload from a repo that does not hold the document.
    Request {
        /// Sending repo.
        sender_id: PeerId,
        /// Receiving repo.
        target_id: PeerId,
        /// Document being requested.
        document_id: DocumentId,
        /// Encoded CRDT sync message.
        data: Vec<u8>,
    },

    /// The sender cannot supply the document.
    DocUnavailable {
        /// Sending repo.
        sender_id: PeerId,
        /// Receiving repo.
        target_id: PeerId,
        /// Document the sender does not have.
        document_id: DocumentId,
    },

    /// Transient application payload scoped to a document.
    Ephemeral {
        /// Sending repo.
        sender_id: PeerId,
        /// Receiving repo.
        target_id: PeerId,
        /// Document the payload is scoped to.
        document_id: DocumentId,
        /// Opaque application bytes.
        data: Vec<u8>,
    },
}

impl RepoMessage {
    /// The document this message concerns.
    pub fn document_id(&self) -> &DocumentId {
        match self {
            RepoMessage::Sync { document_id, .. }
            | RepoMessage::Request { document_id, .. }
            | RepoMessage::DocUnavailable { document_id, .. }
            | RepoMessage::Ephemeral { document_id, .. } => document_id,
        }
    }

    /// The repo that sent this message.
    pub fn sender_id(&self) -> &PeerId {
        match self {
            RepoMessage::Sync { sender_id, .. }
            | RepoMessage::Request { sender_id, .. }
            | RepoMessage::DocUnavailable { sender_id, .. }
            | RepoMessage::Ephemeral { sender_id, .. } => sender_id,
        }
    }

    /// The repo this message is addressed to.
    pub fn target_id(&self) -> &PeerId {
        match self {
            RepoMessage::Sync { target_id, .. }
            | RepoMessage::Request { target_id, .. }
            | RepoMessage::DocUnavailable { target_id, .. }
            | RepoMessage::Ephemeral { target_id, .. } => target_id,
        }
    }

    /// Serialize for transports that frame raw bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(Into::into)
    }

    /// Deserialize a message framed by [`RepoMessage::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(Into::into)
    }
}

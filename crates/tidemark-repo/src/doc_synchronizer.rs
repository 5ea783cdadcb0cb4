//! Per-document synchronization with every known peer.

use crate::error::{RepoError, Result};
use crate::handle::{DocHandle, HandleState};
use automerge::sync::{self, SyncDoc};
use std::collections::{HashMap, HashSet, VecDeque};
use tidemark_network::RepoMessage;
use tidemark_types::{DocumentId, PeerId};
use tracing::{debug, info, warn};

/// What a peer is believed to know about this document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PeerDocState {
    /// No signal either way yet.
    Unknown,
    /// The peer has sent us heads, or we have sent heads to it.
    HasDoc,
    /// The peer told us it cannot supply the document.
    DocUnavailable,
    /// We asked the peer for the document.
    Requesting,
}

/// Drives the sync conversation for one document.
///
/// Owned exclusively by the repo's event loop; methods are synchronous and
/// return the outbound messages they produce, which the loop routes to the
/// network. Sync states are kept for every peer ever seen so a reconnecting
/// peer resumes where it left off.
pub(crate) struct DocSynchronizer {
    document_id: DocumentId,
    local_peer: PeerId,
    handle: DocHandle,
    /// Peers currently syncing this document, in join order.
    peers: Vec<PeerId>,
    peer_states: HashMap<PeerId, PeerDocState>,
    sync_states: HashMap<PeerId, sync::State>,
    /// Every peer we have ever sent to or received from.
    recognized_peers: HashSet<PeerId>,
    /// Messages that arrived before the document was materialized.
    pending_messages: VecDeque<RepoMessage>,
    /// Peers whose first sync is deferred until the handle is active.
    pending_peers: Vec<PeerId>,
    sync_started: bool,
}

/// Handle states in which sync messages can be processed.
const ACTIVE: &[HandleState] = &[HandleState::Ready, HandleState::Requesting];

impl DocSynchronizer {
    pub fn new(document_id: DocumentId, local_peer: PeerId, handle: DocHandle) -> Self {
        Self {
            document_id,
            local_peer,
            handle,
            peers: Vec::new(),
            peer_states: HashMap::new(),
            sync_states: HashMap::new(),
            recognized_peers: HashSet::new(),
            pending_messages: VecDeque::new(),
            pending_peers: Vec::new(),
            sync_started: false,
        }
    }

    pub fn handle(&self) -> &DocHandle {
        &self.handle
    }

    pub fn has_peer(&self, peer: &PeerId) -> bool {
        self.peers.contains(peer)
    }

    /// Begin (or queue) syncing with `peers`.
    ///
    /// If the handle is not yet active the peers are queued and the first
    /// messages go out from [`DocSynchronizer::on_handle_active`].
    pub fn begin_sync(&mut self, peers: &[PeerId]) -> Vec<RepoMessage> {
        if !self.handle.in_state(ACTIVE) {
            for peer in peers {
                if !self.pending_peers.contains(peer) {
                    self.pending_peers.push(peer.clone());
                }
            }
            return Vec::new();
        }
        self.start_sync(peers)
    }

    /// The handle just became ready or requesting: apply buffered messages
    /// in arrival order, then start sync with any queued peers.
    pub fn on_handle_active(&mut self) -> Vec<RepoMessage> {
        let mut out = self.drain_pending_messages();
        let queued = std::mem::take(&mut self.pending_peers);
        if !queued.is_empty() {
            out.extend(self.start_sync(&queued));
        }
        out
    }

    fn start_sync(&mut self, peers: &[PeerId]) -> Vec<RepoMessage> {
        self.sync_started = true;
        let mut out = Vec::new();
        for peer in peers {
            self.ensure_peer(peer);

            // Round-trip the sync state through its encoding. This drops the
            // in-flight bookkeeping a previous connection left behind; without
            // it a peer that vanished mid-send can wedge the conversation in
            // an endless exchange.
            if let Some(state) = self.sync_states.remove(peer) {
                let restored = sync::State::decode(&state.encode())
                    .unwrap_or_else(|_| sync::State::new());
                self.sync_states.insert(peer.clone(), restored);
            }

            if let Some(message) = self.generate_sync_message(peer) {
                out.push(message);
            }
            self.recognized_peers.insert(peer.clone());
        }
        out.extend(self.check_unavailable());
        out
    }

    /// Stop syncing with `peer`.
    ///
    /// Its sync state is kept so a reconnection resumes instead of starting
    /// over, and its document status keeps counting toward unavailability.
    pub fn end_sync(&mut self, peer: &PeerId) {
        debug!("{}: ending sync with {peer}", self.document_id);
        self.peers.retain(|p| p != peer);
        self.pending_peers.retain(|p| p != peer);
    }

    /// Handle an inbound message for this document.
    pub fn receive_message(&mut self, message: RepoMessage) -> Result<Vec<RepoMessage>> {
        if message.document_id() != &self.document_id {
            return Err(RepoError::ProtocolViolation(format!(
                "message for {} delivered to synchronizer for {}",
                message.document_id(),
                self.document_id
            )));
        }
        self.recognized_peers.insert(message.sender_id().clone());

        if !self.handle.in_state(ACTIVE) {
            debug!(
                "{}: buffering {} message from {} while {:?}",
                self.document_id,
                message_kind(&message),
                message.sender_id(),
                self.handle.state()
            );
            self.pending_messages.push_back(message);
            return Ok(Vec::new());
        }

        let mut out = self.drain_pending_messages();
        out.extend(self.process_message(message));
        Ok(out)
    }

    /// One tailored sync message per active peer. Called after every change
    /// to the document, local or remote; this is also what relays changes
    /// onward through partially connected topologies.
    pub fn on_doc_change(&mut self) -> Vec<RepoMessage> {
        if !self.handle.in_state(ACTIVE) {
            return Vec::new();
        }
        let peers = self.peers.clone();
        peers
            .iter()
            .filter_map(|peer| self.generate_sync_message(peer))
            .collect()
    }

    /// Send an ephemeral payload to every active peer.
    pub fn broadcast_ephemeral(&mut self, data: Vec<u8>) -> Vec<RepoMessage> {
        self.peers
            .iter()
            .map(|peer| RepoMessage::Ephemeral {
                sender_id: self.local_peer.clone(),
                target_id: peer.clone(),
                document_id: self.document_id.clone(),
                data: data.clone(),
            })
            .collect()
    }

    fn ensure_peer(&mut self, peer: &PeerId) {
        if !self.peers.contains(peer) {
            self.peers.push(peer.clone());
        }
        self.peer_states
            .entry(peer.clone())
            .or_insert(PeerDocState::Unknown);
    }

    fn drain_pending_messages(&mut self) -> Vec<RepoMessage> {
        let mut out = Vec::new();
        while let Some(message) = self.pending_messages.pop_front() {
            out.extend(self.process_message(message));
        }
        out
    }

    fn process_message(&mut self, message: RepoMessage) -> Vec<RepoMessage> {
        match message {
            RepoMessage::DocUnavailable { sender_id, .. } => {
                self.peer_states
                    .insert(sender_id, PeerDocState::DocUnavailable);
                self.check_unavailable()
            }
            RepoMessage::Request {
                sender_id, data, ..
            } => {
                // A request tells us the sender has no document either.
                self.peer_states
                    .insert(sender_id.clone(), PeerDocState::DocUnavailable);
                let mut out = self.check_unavailable();
                out.extend(self.apply_sync_payload(&sender_id, &data));
                out
            }
            RepoMessage::Sync {
                sender_id, data, ..
            } => self.apply_sync_payload(&sender_id, &data),
            RepoMessage::Ephemeral {
                sender_id, data, ..
            } => {
                self.handle.emit_ephemeral(sender_id, data);
                Vec::new()
            }
        }
    }

    fn apply_sync_payload(&mut self, sender: &PeerId, data: &[u8]) -> Vec<RepoMessage> {
        let message = match sync::Message::decode(data) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    "{}: dropping malformed sync message from {sender}: {err}",
                    self.document_id
                );
                return Vec::new();
            }
        };
        let sender_has_doc = !message.heads.is_empty();

        let handle = self.handle.clone();
        let state = self
            .sync_states
            .entry(sender.clone())
            .or_insert_with(sync::State::new);
        let applied = handle.update(|doc| {
            doc.sync()
                .receive_sync_message(&mut *state, message)
                .map_err(RepoError::from)
        });
        if let Err(err) = applied {
            warn!(
                "{}: dropping sync message from {sender}: {err}",
                self.document_id
            );
            return Vec::new();
        }

        if sender_has_doc {
            self.peer_states
                .insert(sender.clone(), PeerDocState::HasDoc);
        }
        if self.handle.in_state(&[HandleState::Requesting]) && !self.handle.heads().is_empty() {
            self.handle.set_ready();
        }

        let mut out = Vec::new();
        if let Some(response) = self.generate_sync_message(sender) {
            out.push(response);
        }
        out.extend(self.check_unavailable());
        out
    }

    /// Produce the next sync message for `peer`, if the protocol has one.
    ///
    /// The first message to an unrecognized peer while we hold nothing of
    /// the document goes out as a request; everything else is a plain sync.
    fn generate_sync_message(&mut self, peer: &PeerId) -> Option<RepoMessage> {
        let handle = self.handle.clone();
        let state = self
            .sync_states
            .entry(peer.clone())
            .or_insert_with(sync::State::new);

        let (message, our_heads) = handle.with_doc_mut(|doc| {
            let message = doc.sync().generate_sync_message(&mut *state);
            let our_heads = doc.get_heads();
            (message, our_heads)
        });
        let message = message?;
        let message_has_heads = !message.heads.is_empty();
        let shared_heads_empty = state.shared_heads.is_empty();
        let data = message.encode();

        let is_request = our_heads.is_empty()
            && shared_heads_empty
            && !self
                .peer_states
                .values()
                .any(|s| *s == PeerDocState::HasDoc)
            && !self.recognized_peers.contains(peer)
            && matches!(
                self.peer_states.get(peer),
                None | Some(PeerDocState::Unknown)
            );

        self.recognized_peers.insert(peer.clone());
        if is_request {
            self.peer_states
                .insert(peer.clone(), PeerDocState::Requesting);
            Some(RepoMessage::Request {
                sender_id: self.local_peer.clone(),
                target_id: peer.clone(),
                document_id: self.document_id.clone(),
                data,
            })
        } else {
            if message_has_heads {
                self.peer_states
                    .insert(peer.clone(), PeerDocState::HasDoc);
            }
            Some(RepoMessage::Sync {
                sender_id: self.local_peer.clone(),
                target_id: peer.clone(),
                document_id: self.document_id.clone(),
                data,
            })
        }
    }

    /// Declare the document unavailable once every active peer has declined.
    ///
    /// This is the only path by which a handle reaches
    /// [`HandleState::Unavailable`].
    fn check_unavailable(&mut self) -> Vec<RepoMessage> {
        if !self.sync_started
            || !self.handle.in_state(&[HandleState::Requesting])
            || self.peers.is_empty()
        {
            return Vec::new();
        }
        let all_declined = self.peers.iter().all(|peer| {
            matches!(
                self.peer_states.get(peer),
                Some(PeerDocState::DocUnavailable)
            )
        });
        if !all_declined {
            return Vec::new();
        }

        info!(
            "{}: unavailable, all {} peers declined",
            self.document_id,
            self.peers.len()
        );
        let out = self
            .peers
            .iter()
            .map(|peer| RepoMessage::DocUnavailable {
                sender_id: self.local_peer.clone(),
                target_id: peer.clone(),
                document_id: self.document_id.clone(),
            })
            .collect();
        self.handle.mark_unavailable();
        out
    }

    #[cfg(test)]
    fn peer_state(&self, peer: &PeerId) -> Option<PeerDocState> {
        self.peer_states.get(peer).copied()
    }

    #[cfg(test)]
    fn assert_invariants(&self) {
        for peer in &self.peers {
            assert!(
                self.recognized_peers.contains(peer),
                "active peer {peer} not recognized"
            );
            assert!(
                self.peer_states.contains_key(peer),
                "active peer {peer} has no document status"
            );
        }
    }
}

fn message_kind(message: &RepoMessage) -> &'static str {
    match message {
        RepoMessage::Sync { .. } => "sync",
        RepoMessage::Request { .. } => "request",
        RepoMessage::DocUnavailable { .. } => "doc-unavailable",
        RepoMessage::Ephemeral { .. } => "ephemeral",
    }
}

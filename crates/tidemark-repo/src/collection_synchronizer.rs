//! Fan-out of peers and messages across per-document synchronizers.

use crate::doc_synchronizer::DocSynchronizer;
use crate::error::Result;
use crate::handle::DocHandle;
use std::collections::{HashMap, HashSet};
use tidemark_network::RepoMessage;
use tidemark_types::{DocumentId, PeerId};
use tracing::debug;

/// One per repo. Routes inbound messages to the right [`DocSynchronizer`],
/// creates synchronizers on demand, and fans peer arrivals and departures
/// out to every document.
///
/// Share-policy verdicts are asynchronous and arrive through the repo's
/// event loop; this component itself is purely synchronous state.
pub(crate) struct CollectionSynchronizer {
    local_peer: PeerId,
    /// All peers the repo is currently connected to.
    peers: HashSet<PeerId>,
    doc_synchronizers: HashMap<DocumentId, DocSynchronizer>,
    /// Documents already announced to peers.
    doc_set_up: HashSet<DocumentId>,
}

impl CollectionSynchronizer {
    pub fn new(local_peer: PeerId) -> Self {
        Self {
            local_peer,
            peers: HashSet::new(),
            doc_synchronizers: HashMap::new(),
            doc_set_up: HashSet::new(),
        }
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.iter()
    }

    pub fn synchronizer(&mut self, document_id: &DocumentId) -> Option<&mut DocSynchronizer> {
        self.doc_synchronizers.get_mut(document_id)
    }

    /// A peer connected. Returns the documents whose share policy should be
    /// consulted for it; an already known peer yields nothing.
    pub fn add_peer(&mut self, peer: PeerId) -> Vec<DocumentId> {
        if !self.peers.insert(peer.clone()) {
            return Vec::new();
        }
        debug!("peer {peer} joined");
        self.doc_synchronizers.keys().cloned().collect()
    }

    /// A peer disconnected: stop syncing it everywhere.
    pub fn remove_peer(&mut self, peer: &PeerId) {
        if self.peers.remove(peer) {
            debug!("peer {peer} left");
        }
        for synchronizer in self.doc_synchronizers.values_mut() {
            synchronizer.end_sync(peer);
        }
    }

    pub fn contains_peer(&self, peer: &PeerId) -> bool {
        self.peers.contains(peer)
    }

    /// Register a document. Returns the connected peers whose share policy
    /// should be consulted, or nothing if the document was already set up.
    pub fn add_document(&mut self, document_id: DocumentId, handle: DocHandle) -> Vec<PeerId> {
        if !self.doc_set_up.insert(document_id.clone()) {
            return Vec::new();
        }
        self.ensure_synchronizer(document_id, handle);
        self.peers.iter().cloned().collect()
    }

    /// Drop a document's synchronizer entirely.
    pub fn remove_document(&mut self, document_id: &DocumentId) {
        self.doc_synchronizers.remove(document_id);
        self.doc_set_up.remove(document_id);
    }

    /// Route an inbound message to its document's synchronizer.
    ///
    /// Returns the outbound responses plus the connected peers the document
    /// is not yet syncing with, for the caller to policy-check.
    pub fn receive_message(
        &mut self,
        message: RepoMessage,
        handle: DocHandle,
    ) -> Result<(Vec<RepoMessage>, Vec<PeerId>)> {
        let document_id = message.document_id().clone();
        self.doc_set_up.insert(document_id.clone());

        let local_peer = self.local_peer.clone();
        let synchronizer = self
            .doc_synchronizers
            .entry(document_id.clone())
            .or_insert_with(|| DocSynchronizer::new(document_id, local_peer, handle));
        let out = synchronizer.receive_message(message)?;
        let candidates = self
            .peers
            .iter()
            .filter(|peer| !synchronizer.has_peer(peer))
            .cloned()
            .collect();
        Ok((out, candidates))
    }

    fn ensure_synchronizer(
        &mut self,
        document_id: DocumentId,
        handle: DocHandle,
    ) -> &mut DocSynchronizer {
        let local_peer = self.local_peer.clone();
        self.doc_synchronizers
            .entry(document_id.clone())
            .or_insert_with(|| DocSynchronizer::new(document_id, local_peer, handle))
    }
}

//! The repo: composition root and event loop.

use crate::collection_synchronizer::CollectionSynchronizer;
use crate::error::{RepoError, Result};
use crate::handle::{DocHandle, HandleState};
use crate::share_policy::{share_generously, SharePolicy};
use crate::storage::StorageCoordinator;
use automerge::AutoCommit;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tidemark_network::{NetworkAdapter, NetworkEvent, RepoMessage};
use tidemark_storage::StorageAdapter;
use tidemark_types::{DocumentId, PeerId};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, warn};

/// Capacity of the repo-level event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Handle states in which a document is materialized.
const ACTIVE: &[HandleState] = &[HandleState::Ready, HandleState::Requesting];

/// Work items for the repo's event loop.
///
/// Everything that mutates synchronizer state funnels through this queue,
/// which gives the repo one logical execution context: handlers run to
/// completion one at a time, and anything that must suspend (storage IO,
/// share policy, network readiness) is spawned and re-enters the queue with
/// its result.
pub(crate) enum RepoInput {
    /// A handle was created or found and must be wired up.
    DocumentRegistered { document_id: DocumentId },
    /// The document behind a handle changed, locally or via sync.
    DocChanged { document_id: DocumentId },
    /// A storage load finished.
    StorageLoaded {
        document_id: DocumentId,
        doc: Option<Box<AutoCommit>>,
    },
    /// The network is ready and the document should be fetched from peers.
    RequestDocument { document_id: DocumentId },
    /// A share-policy verdict came back: begin syncing with these peers.
    BeginSync {
        document_id: DocumentId,
        peers: Vec<PeerId>,
    },
    /// A handle reached the unavailable state.
    HandleUnavailable { document_id: DocumentId },
    /// An ephemeral payload should go out to the document's peers.
    Broadcast {
        document_id: DocumentId,
        data: Vec<u8>,
    },
    /// A document was deleted locally.
    DeleteDocument { document_id: DocumentId },
    /// A network adapter was attached.
    AdapterAdded {
        adapter_index: usize,
        outbound: mpsc::UnboundedSender<RepoMessage>,
    },
    /// An adapter reported readiness.
    AdapterReady { adapter_index: usize },
    /// A peer became reachable through an adapter.
    PeerJoined {
        peer_id: PeerId,
        adapter_index: usize,
    },
    /// A peer disconnected.
    PeerLeft { peer_id: PeerId },
    /// A message arrived from the network.
    MessageReceived { message: RepoMessage },
    /// Wait for background storage writes issued so far.
    Flush { ack: oneshot::Sender<()> },
    /// Stop the event loop.
    Shutdown { ack: oneshot::Sender<()> },
}

impl std::fmt::Debug for RepoInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoInput::DocumentRegistered { document_id } => {
                f.debug_struct("DocumentRegistered").field("document_id", document_id).finish()
            }
            RepoInput::DocChanged { document_id } => {
                f.debug_struct("DocChanged").field("document_id", document_id).finish()
            }
            RepoInput::StorageLoaded { document_id, doc } => f
                .debug_struct("StorageLoaded")
                .field("document_id", document_id)
                .field("loaded", &doc.is_some())
                .finish(),
            RepoInput::RequestDocument { document_id } => {
                f.debug_struct("RequestDocument").field("document_id", document_id).finish()
            }
            RepoInput::BeginSync { document_id, peers } => f
                .debug_struct("BeginSync")
                .field("document_id", document_id)
                .field("peers", peers)
                .finish(),
            RepoInput::HandleUnavailable { document_id } => {
                f.debug_struct("HandleUnavailable").field("document_id", document_id).finish()
            }
            RepoInput::Broadcast { document_id, .. } => {
                f.debug_struct("Broadcast").field("document_id", document_id).finish()
            }
            RepoInput::DeleteDocument { document_id } => {
                f.debug_struct("DeleteDocument").field("document_id", document_id).finish()
            }
            RepoInput::AdapterAdded { adapter_index, .. } => {
                f.debug_struct("AdapterAdded").field("adapter_index", adapter_index).finish()
            }
            RepoInput::AdapterReady { adapter_index } => {
                f.debug_struct("AdapterReady").field("adapter_index", adapter_index).finish()
            }
            RepoInput::PeerJoined { peer_id, adapter_index } => f
                .debug_struct("PeerJoined")
                .field("peer_id", peer_id)
                .field("adapter_index", adapter_index)
                .finish(),
            RepoInput::PeerLeft { peer_id } => {
                f.debug_struct("PeerLeft").field("peer_id", peer_id).finish()
            }
            RepoInput::MessageReceived { message } => {
                f.debug_struct("MessageReceived").field("message", message).finish()
            }
            RepoInput::Flush { .. } => f.debug_struct("Flush").finish(),
            RepoInput::Shutdown { .. } => f.debug_struct("Shutdown").finish(),
        }
    }
}

/// Repo-level events for subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoEvent {
    /// A document was created or found.
    DocumentAdded {
        /// The document.
        document_id: DocumentId,
    },
    /// A document was deleted locally.
    DocumentDeleted {
        /// The document.
        document_id: DocumentId,
    },
    /// Every known peer declined to supply a requested document.
    DocumentUnavailable {
        /// The document.
        document_id: DocumentId,
    },
}

/// Configuration for a [`Repo`].
pub struct RepoConfig {
    /// This repo's identity on the network.
    pub peer_id: PeerId,
    /// Optional persistence backend.
    pub storage: Option<Arc<dyn StorageAdapter>>,
    /// Which documents to offer to which peers.
    pub share_policy: SharePolicy,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            peer_id: PeerId::random(),
            storage: None,
            share_policy: share_generously(),
        }
    }
}

impl RepoConfig {
    /// Configuration with an explicit peer id and defaults otherwise.
    pub fn with_peer_id(peer_id: impl Into<PeerId>) -> Self {
        Self {
            peer_id: peer_id.into(),
            ..Default::default()
        }
    }

    /// Attach a storage adapter.
    pub fn storage(mut self, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(adapter);
        self
    }

    /// Replace the generous default share policy.
    pub fn share_policy(mut self, policy: SharePolicy) -> Self {
        self.share_policy = policy;
        self
    }
}

struct RepoShared {
    peer_id: PeerId,
    tx: mpsc::UnboundedSender<RepoInput>,
    handles: DashMap<DocumentId, DocHandle>,
    storage: Option<Arc<StorageCoordinator>>,
    share_policy: SharePolicy,
    network_ready_tx: watch::Sender<bool>,
    events_tx: broadcast::Sender<RepoEvent>,
    next_adapter_index: AtomicUsize,
}

impl RepoShared {
    /// Return the cached handle for `document_id`, creating and registering
    /// a fresh one when the document is first seen.
    fn ensure_handle(&self, document_id: DocumentId) -> (DocHandle, bool) {
        match self.handles.entry(document_id.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let handle = DocHandle::new(
                    document_id.clone(),
                    false,
                    HandleState::Idle,
                    AutoCommit::new(),
                    self.tx.clone(),
                );
                entry.insert(handle.clone());
                let _ = self
                    .tx
                    .send(RepoInput::DocumentRegistered { document_id });
                (handle, true)
            }
        }
    }
}

/// A collection of documents kept convergent with remote peers.
///
/// Cheap to clone. Construction spawns the repo's event loop on the ambient
/// tokio runtime, so a `Repo` must be created inside one. The loop runs
/// until [`Repo::shutdown`].
///
/// # Example
///
/// ```
/// use tidemark_repo::{Repo, RepoConfig};
/// use automerge::transaction::Transactable;
/// use automerge::ROOT;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> tidemark_repo::Result<()> {
/// let repo = Repo::new(RepoConfig::with_peer_id("alice"));
/// let handle = repo.create();
/// handle.update(|doc| {
///     doc.put(ROOT, "title", "hello")?;
///     Ok(())
/// })?;
/// let found = repo.find(&handle.url())?;
/// assert_eq!(found.document_id(), handle.document_id());
/// repo.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Repo {
    shared: Arc<RepoShared>,
}

impl Repo {
    /// Create a repo and start its event loop.
    pub fn new(config: RepoConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (network_ready_tx, _) = watch::channel(false);

        let shared = Arc::new(RepoShared {
            peer_id: config.peer_id.clone(),
            tx,
            handles: DashMap::new(),
            storage: config
                .storage
                .map(|adapter| Arc::new(StorageCoordinator::new(adapter))),
            share_policy: config.share_policy,
            network_ready_tx,
            events_tx,
            next_adapter_index: AtomicUsize::new(0),
        });

        let driver = RepoDriver {
            shared: Arc::clone(&shared),
            rx,
            collection: CollectionSynchronizer::new(config.peer_id),
            adapter_outbound: HashMap::new(),
            peer_routes: HashMap::new(),
        };
        tokio::spawn(driver.run());

        Self { shared }
    }

    /// This repo's identity.
    pub fn peer_id(&self) -> &PeerId {
        &self.shared.peer_id
    }

    /// Create a new, empty document. The handle is ready immediately.
    pub fn create(&self) -> DocHandle {
        let document_id = DocumentId::random();
        let handle = DocHandle::new(
            document_id.clone(),
            true,
            HandleState::Ready,
            AutoCommit::new(),
            self.shared.tx.clone(),
        );
        self.shared.handles.insert(document_id.clone(), handle.clone());
        let _ = self
            .shared
            .tx
            .send(RepoInput::DocumentRegistered { document_id });
        handle
    }

    /// Look up a document by URL.
    ///
    /// Returns the cached handle when present; otherwise constructs one and
    /// starts the load-or-fetch flow. The returned handle may still be
    /// loading or requesting; use [`DocHandle::wait_for_state`] to await an
    /// outcome.
    pub fn find(&self, url: &str) -> Result<DocHandle> {
        let document_id = DocumentId::from_url(url)?;
        Ok(self.find_by_id(document_id))
    }

    /// Look up a document by id. See [`Repo::find`].
    pub fn find_by_id(&self, document_id: DocumentId) -> DocHandle {
        let (handle, created) = self.shared.ensure_handle(document_id.clone());
        if !created && handle.state() == HandleState::Unavailable {
            // Re-announce so subscribers that missed the original event hear it.
            let _ = self
                .shared
                .tx
                .send(RepoInput::HandleUnavailable { document_id });
        }
        handle
    }

    /// Copy a ready document into a fresh one with its own id and history
    /// ancestry shared with the source.
    pub fn clone_document(&self, source: &DocHandle) -> Result<DocHandle> {
        if !source.in_state(&[HandleState::Ready]) {
            return Err(RepoError::CloneNotReady(source.document_id().clone()));
        }
        let document_id = DocumentId::random();
        let handle = DocHandle::new(
            document_id.clone(),
            true,
            HandleState::Ready,
            source.fork_doc(),
            self.shared.tx.clone(),
        );
        self.shared.handles.insert(document_id.clone(), handle.clone());
        let _ = self
            .shared
            .tx
            .send(RepoInput::DocumentRegistered { document_id });
        Ok(handle)
    }

    /// Delete a document: drop it from the cache and remove its persisted
    /// state. Peers are not told; a peer that still holds the document can
    /// re-supply it to a later `find`.
    pub fn delete(&self, document_id: &DocumentId) -> Result<()> {
        if let Some((_, handle)) = self.shared.handles.remove(document_id) {
            handle.mark_deleted();
        }
        self.shared
            .tx
            .send(RepoInput::DeleteDocument {
                document_id: document_id.clone(),
            })
            .map_err(|_| RepoError::Shutdown)
    }

    /// Attach a network adapter.
    ///
    /// The repo consumes the adapter's event stream and routes outbound
    /// messages for the peers it announces. Multiple adapters may be
    /// attached; the network counts as ready once any adapter reports it.
    pub fn add_network_adapter(&self, adapter: Arc<dyn NetworkAdapter>) -> Result<()> {
        let mut events = adapter.events().ok_or_else(|| {
            RepoError::Network("adapter event stream already consumed".to_string())
        })?;
        let adapter_index = self
            .shared
            .next_adapter_index
            .fetch_add(1, Ordering::Relaxed);

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<RepoMessage>();
        // Register the outbound route before any inbound event can race it.
        self.shared
            .tx
            .send(RepoInput::AdapterAdded {
                adapter_index,
                outbound: outbound_tx,
            })
            .map_err(|_| RepoError::Shutdown)?;

        // Outbound pump: one sequential sender per adapter keeps per-peer
        // ordering.
        {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move {
                while let Some(message) = outbound_rx.recv().await {
                    if let Err(err) = adapter.send(message).await {
                        warn!("outbound send failed: {err}");
                    }
                }
            });
        }

        // Inbound pump: adapter events become loop inputs.
        {
            let tx = self.shared.tx.clone();
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    let input = match event {
                        NetworkEvent::Ready => RepoInput::AdapterReady { adapter_index },
                        NetworkEvent::PeerCandidate { peer_id } => RepoInput::PeerJoined {
                            peer_id,
                            adapter_index,
                        },
                        NetworkEvent::PeerDisconnected { peer_id } => {
                            RepoInput::PeerLeft { peer_id }
                        }
                        NetworkEvent::Message(message) => RepoInput::MessageReceived { message },
                    };
                    if tx.send(input).is_err() {
                        break;
                    }
                }
            });
        }
        Ok(())
    }

    /// Subscribe to repo-level events.
    pub fn subscribe(&self) -> broadcast::Receiver<RepoEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Wait until every storage write issued so far has completed.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .shared
            .tx
            .send(RepoInput::Flush { ack: ack_tx })
            .is_ok()
        {
            let _ = ack_rx.await;
        }
    }

    /// Flush storage and stop the event loop.
    pub async fn shutdown(&self) {
        self.flush().await;
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .shared
            .tx
            .send(RepoInput::Shutdown { ack: ack_tx })
            .is_ok()
        {
            let _ = ack_rx.await;
        }
    }
}

/// The event loop: exclusive owner of all synchronizer state.
struct RepoDriver {
    shared: Arc<RepoShared>,
    rx: mpsc::UnboundedReceiver<RepoInput>,
    collection: CollectionSynchronizer,
    adapter_outbound: HashMap<usize, mpsc::UnboundedSender<RepoMessage>>,
    peer_routes: HashMap<PeerId, usize>,
}

impl RepoDriver {
    async fn run(mut self) {
        debug!("repo {}: event loop started", self.shared.peer_id);
        while let Some(input) = self.rx.recv().await {
            match input {
                RepoInput::Shutdown { ack } => {
                    let _ = ack.send(());
                    break;
                }
                RepoInput::Flush { ack } => {
                    if let Some(storage) = &self.shared.storage {
                        storage.flush().await;
                    }
                    let _ = ack.send(());
                }
                other => self.handle_input(other),
            }
        }
        debug!("repo {}: event loop stopped", self.shared.peer_id);
    }

    fn handle_input(&mut self, input: RepoInput) {
        match input {
            RepoInput::DocumentRegistered { document_id } => {
                self.on_document_registered(document_id)
            }
            RepoInput::DocChanged { document_id } => self.on_doc_changed(&document_id),
            RepoInput::StorageLoaded { document_id, doc } => {
                self.on_storage_loaded(&document_id, doc)
            }
            RepoInput::RequestDocument { document_id } => self.on_request_document(&document_id),
            RepoInput::BeginSync { document_id, peers } => {
                self.on_begin_sync(&document_id, &peers)
            }
            RepoInput::HandleUnavailable { document_id } => {
                let _ = self
                    .shared
                    .events_tx
                    .send(RepoEvent::DocumentUnavailable { document_id });
            }
            RepoInput::Broadcast { document_id, data } => {
                if let Some(synchronizer) = self.collection.synchronizer(&document_id) {
                    let out = synchronizer.broadcast_ephemeral(data);
                    self.dispatch(out);
                }
            }
            RepoInput::DeleteDocument { document_id } => self.on_delete_document(document_id),
            RepoInput::AdapterAdded {
                adapter_index,
                outbound,
            } => {
                self.adapter_outbound.insert(adapter_index, outbound);
            }
            RepoInput::AdapterReady { adapter_index } => {
                debug!(
                    "repo {}: adapter {adapter_index} ready",
                    self.shared.peer_id
                );
                self.shared.network_ready_tx.send_replace(true);
            }
            RepoInput::PeerJoined {
                peer_id,
                adapter_index,
            } => self.on_peer_joined(peer_id, adapter_index),
            RepoInput::PeerLeft { peer_id } => {
                self.peer_routes.remove(&peer_id);
                self.collection.remove_peer(&peer_id);
            }
            RepoInput::MessageReceived { message } => self.on_message_received(message),
            RepoInput::Flush { .. } | RepoInput::Shutdown { .. } => {
                // Handled in run().
            }
        }
    }

    fn lookup_handle(&self, document_id: &DocumentId) -> Option<DocHandle> {
        self.shared
            .handles
            .get(document_id)
            .map(|entry| entry.clone())
    }

    fn on_document_registered(&mut self, document_id: DocumentId) {
        let Some(handle) = self.lookup_handle(&document_id) else {
            return;
        };
        let _ = self.shared.events_tx.send(RepoEvent::DocumentAdded {
            document_id: document_id.clone(),
        });

        if handle.is_new() {
            if let Some(storage) = &self.shared.storage {
                storage.save_initial(&document_id, &handle);
            }
        } else if handle.in_state(&[HandleState::Idle]) {
            handle.begin_loading();
            if let Some(storage) = &self.shared.storage {
                let storage = Arc::clone(storage);
                let tx = self.shared.tx.clone();
                let id = document_id.clone();
                tokio::spawn(async move {
                    let doc = match storage.load_doc(&id).await {
                        Ok(doc) => doc,
                        Err(err) => {
                            error!("storage load for {id} failed: {err}");
                            None
                        }
                    };
                    let _ = tx.send(RepoInput::StorageLoaded {
                        document_id: id,
                        doc: doc.map(Box::new),
                    });
                });
            } else {
                self.spawn_request_when_network_ready(document_id.clone());
            }
        }

        let candidates = self
            .collection
            .add_document(document_id.clone(), handle.clone());
        self.spawn_share_policy_check(document_id.clone(), candidates);

        if handle.in_state(ACTIVE) {
            self.on_handle_active(&document_id);
        }
    }

    fn on_storage_loaded(&mut self, document_id: &DocumentId, doc: Option<Box<AutoCommit>>) {
        let Some(handle) = self.lookup_handle(document_id) else {
            return;
        };
        // The handle may have moved on (deleted, say) while the load ran.
        if handle.state() != HandleState::Loading {
            return;
        }
        match doc {
            Some(doc) => {
                if handle.load_ready(*doc) {
                    self.on_handle_active(document_id);
                }
            }
            None => self.spawn_request_when_network_ready(document_id.clone()),
        }
    }

    fn on_request_document(&mut self, document_id: &DocumentId) {
        let Some(handle) = self.lookup_handle(document_id) else {
            return;
        };
        if handle.in_state(&[HandleState::Idle, HandleState::Loading]) && handle.request() {
            self.on_handle_active(document_id);
        }
    }

    fn on_begin_sync(&mut self, document_id: &DocumentId, peers: &[PeerId]) {
        // The policy ran off-loop; peers may have disconnected since.
        let peers: Vec<PeerId> = peers
            .iter()
            .filter(|peer| self.collection.contains_peer(peer))
            .cloned()
            .collect();
        if peers.is_empty() {
            return;
        }
        if let Some(synchronizer) = self.collection.synchronizer(document_id) {
            let out = synchronizer.begin_sync(&peers);
            self.dispatch(out);
        }
    }

    fn on_handle_active(&mut self, document_id: &DocumentId) {
        if let Some(synchronizer) = self.collection.synchronizer(document_id) {
            let out = synchronizer.on_handle_active();
            self.dispatch(out);
        }
    }

    fn on_doc_changed(&mut self, document_id: &DocumentId) {
        if let Some(handle) = self.lookup_handle(document_id) {
            if let Some(storage) = &self.shared.storage {
                storage.append_change(document_id, &handle);
            }
        }
        if let Some(synchronizer) = self.collection.synchronizer(document_id) {
            let out = synchronizer.on_doc_change();
            self.dispatch(out);
        }
    }

    fn on_delete_document(&mut self, document_id: DocumentId) {
        self.collection.remove_document(&document_id);
        if let Some(storage) = &self.shared.storage {
            storage.spawn_remove(document_id.clone());
        }
        let _ = self
            .shared
            .events_tx
            .send(RepoEvent::DocumentDeleted { document_id });
    }

    fn on_peer_joined(&mut self, peer_id: PeerId, adapter_index: usize) {
        self.peer_routes.insert(peer_id.clone(), adapter_index);
        let documents = self.collection.add_peer(peer_id.clone());
        // One policy consultation per document, concurrently; each verdict
        // re-enters the loop on its own.
        for document_id in documents {
            self.spawn_share_policy_check(document_id, vec![peer_id.clone()]);
        }
    }

    fn on_message_received(&mut self, message: RepoMessage) {
        if message.target_id() != &self.shared.peer_id {
            warn!(
                "repo {}: dropping message addressed to {}",
                self.shared.peer_id,
                message.target_id()
            );
            return;
        }
        let document_id = message.document_id().clone();
        let (handle, _) = self.shared.ensure_handle(document_id.clone());
        match self.collection.receive_message(message, handle) {
            Ok((out, candidates)) => {
                self.dispatch(out);
                self.spawn_share_policy_check(document_id, candidates);
            }
            Err(err) => error!("repo {}: {err}", self.shared.peer_id),
        }
    }

    /// Route outbound messages to the adapter their target peer arrived on.
    fn dispatch(&self, messages: Vec<RepoMessage>) {
        for message in messages {
            let route = self
                .peer_routes
                .get(message.target_id())
                .and_then(|index| self.adapter_outbound.get(index));
            match route {
                Some(outbound) => {
                    let _ = outbound.send(message);
                }
                None => debug!(
                    "repo {}: no route to {}, dropping message",
                    self.shared.peer_id,
                    message.target_id()
                ),
            }
        }
    }

    /// Consult the share policy for `peers` and begin sync with the generous
    /// subset. Runs off-loop; the verdict re-enters as `BeginSync`.
    fn spawn_share_policy_check(&self, document_id: DocumentId, peers: Vec<PeerId>) {
        if peers.is_empty() {
            return;
        }
        let policy = Arc::clone(&self.shared.share_policy);
        let tx = self.shared.tx.clone();
        tokio::spawn(async move {
            let verdicts = join_all(peers.into_iter().map(|peer| {
                let policy = Arc::clone(&policy);
                let document_id = document_id.clone();
                async move {
                    let allowed = policy(peer.clone(), Some(document_id)).await;
                    (peer, allowed)
                }
            }))
            .await;
            let allowed: Vec<PeerId> = verdicts
                .into_iter()
                .filter(|(_, allowed)| *allowed)
                .map(|(peer, _)| peer)
                .collect();
            if !allowed.is_empty() {
                let _ = tx.send(RepoInput::BeginSync {
                    document_id,
                    peers: allowed,
                });
            }
        });
    }

    /// Once the network reports ready, ask peers for the document.
    fn spawn_request_when_network_ready(&self, document_id: DocumentId) {
        let mut ready_rx = self.shared.network_ready_tx.subscribe();
        let tx = self.shared.tx.clone();
        tokio::spawn(async move {
            if ready_rx.wait_for(|ready| *ready).await.is_ok() {
                let _ = tx.send(RepoInput::RequestDocument { document_id });
            }
        });
    }
}

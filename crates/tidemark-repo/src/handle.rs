//! Per-document handles and their lifecycle state machine.

use crate::error::{RepoError, Result};
use crate::repo::RepoInput;
use automerge::{AutoCommit, ChangeHash};
use parking_lot::RwLock;
use std::sync::Arc;
use tidemark_types::{DocumentId, PeerId};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::debug;

/// Capacity of the per-handle subscriber channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle state of a [`DocHandle`].
///
/// `Idle` is the constructed-but-unregistered state; the repo drives a found
/// handle through `Loading` into `Ready` (storage had the document) or
/// `Requesting` (it must be fetched from peers). `Requesting` resolves to
/// `Ready` on the first sync message that brings the document past empty, or
/// to `Unavailable` once every known peer has declined. All other
/// transitions are monotone; `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Constructed, not yet picked up by the repo.
    Idle,
    /// Waiting for the storage layer.
    Loading,
    /// Waiting for a peer to supply the document.
    Requesting,
    /// The document is materialized and editable.
    Ready,
    /// Every known peer declined to supply the document.
    Unavailable,
    /// The document was deleted from this repo.
    Deleted,
}

/// Events emitted to [`DocHandle::subscribe`]rs.
#[derive(Debug, Clone)]
pub enum DocHandleEvent {
    /// The document changed, locally or via sync.
    Changed {
        /// The document's heads after the change.
        heads: Vec<ChangeHash>,
    },
    /// An ephemeral payload arrived from a peer.
    Ephemeral {
        /// The peer that sent it.
        sender_id: PeerId,
        /// Opaque application bytes.
        data: Vec<u8>,
    },
    /// The document became unavailable.
    Unavailable,
    /// The document was deleted.
    Deleted,
}

struct HandleInner {
    document_id: DocumentId,
    is_new: bool,
    doc: RwLock<AutoCommit>,
    state_tx: watch::Sender<HandleState>,
    events_tx: broadcast::Sender<DocHandleEvent>,
    repo_tx: mpsc::UnboundedSender<RepoInput>,
}

/// A client-facing reference to one document in a repo.
///
/// Cheap to clone; all clones observe the same document and state. The
/// document value is only materialized while the handle is in
/// [`HandleState::Ready`] or [`HandleState::Requesting`].
#[derive(Clone)]
pub struct DocHandle {
    inner: Arc<HandleInner>,
}

impl DocHandle {
    pub(crate) fn new(
        document_id: DocumentId,
        is_new: bool,
        initial_state: HandleState,
        doc: AutoCommit,
        repo_tx: mpsc::UnboundedSender<RepoInput>,
    ) -> Self {
        let (state_tx, _) = watch::channel(initial_state);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(HandleInner {
                document_id,
                is_new,
                doc: RwLock::new(doc),
                state_tx,
                events_tx,
                repo_tx,
            }),
        }
    }

    /// The id of the document this handle refers to.
    pub fn document_id(&self) -> &DocumentId {
        &self.inner.document_id
    }

    /// The document's URL form.
    pub fn url(&self) -> String {
        self.inner.document_id.to_url()
    }

    /// Whether this handle was created fresh rather than found.
    pub fn is_new(&self) -> bool {
        self.inner.is_new
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HandleState {
        *self.inner.state_tx.borrow()
    }

    /// Whether the current state is one of `states`.
    pub fn in_state(&self, states: &[HandleState]) -> bool {
        states.contains(&self.state())
    }

    /// Wait until the handle enters one of `states`, returning the state it
    /// settled in.
    pub async fn wait_for_state(&self, states: &[HandleState]) -> HandleState {
        let mut rx = self.inner.state_tx.subscribe();
        rx.wait_for(|state| states.contains(state))
            .await
            .map(|state| *state)
            .unwrap_or_else(|_| self.state())
    }

    /// Mutate the document.
    ///
    /// Runs `f` with exclusive access to the document, then notifies the
    /// repo and all subscribers if the document's heads moved. Fails with
    /// [`RepoError::NotReady`] while the document is not materialized.
    pub fn update<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut AutoCommit) -> Result<T>,
    {
        if !self.in_state(&[HandleState::Ready, HandleState::Requesting]) {
            return Err(RepoError::NotReady(self.inner.document_id.clone()));
        }

        let (result, heads, changed) = {
            let mut doc = self.inner.doc.write();
            let before = doc.get_heads();
            let result = f(&mut doc)?;
            let after = doc.get_heads();
            let changed = before != after;
            (result, after, changed)
        };

        if changed {
            let _ = self.inner.events_tx.send(DocHandleEvent::Changed { heads });
            let _ = self.inner.repo_tx.send(RepoInput::DocChanged {
                document_id: self.inner.document_id.clone(),
            });
        }
        Ok(result)
    }

    /// Read from the document.
    pub fn with_doc<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&AutoCommit) -> Result<T>,
    {
        if !self.in_state(&[HandleState::Ready, HandleState::Requesting]) {
            return Err(RepoError::NotReady(self.inner.document_id.clone()));
        }
        let doc = self.inner.doc.read();
        f(&doc)
    }

    /// The document's current heads; empty iff the document is empty.
    pub fn heads(&self) -> Vec<ChangeHash> {
        self.inner.doc.write().get_heads()
    }

    /// Subscribe to change, ephemeral, unavailable and deleted events.
    pub fn subscribe(&self) -> broadcast::Receiver<DocHandleEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Send an ephemeral payload to every peer currently syncing this
    /// document. The payload never touches the document itself.
    pub fn broadcast(&self, data: Vec<u8>) -> Result<()> {
        self.inner
            .repo_tx
            .send(RepoInput::Broadcast {
                document_id: self.inner.document_id.clone(),
                data,
            })
            .map_err(|_| RepoError::Shutdown)
    }

    // Internal state machine. Illegal transitions are ignored so that late
    // events (a storage load completing after a delete, say) cannot walk a
    // handle backwards.

    fn transition(&self, to: HandleState) -> bool {
        let mut accepted = false;
        self.inner.state_tx.send_if_modified(|state| {
            accepted = matches!(
                (*state, to),
                (HandleState::Idle, HandleState::Loading)
                    | (HandleState::Idle, HandleState::Requesting)
                    | (HandleState::Loading, HandleState::Ready)
                    | (HandleState::Loading, HandleState::Requesting)
                    | (HandleState::Requesting, HandleState::Ready)
                    | (HandleState::Requesting, HandleState::Unavailable)
                    | (HandleState::Ready, HandleState::Deleted)
                    | (HandleState::Requesting, HandleState::Deleted)
                    | (HandleState::Unavailable, HandleState::Deleted)
            );
            if accepted {
                *state = to;
            }
            accepted
        });
        if !accepted {
            debug!(
                "ignoring illegal handle transition {:?} -> {:?} for {}",
                self.state(),
                to,
                self.inner.document_id
            );
        }
        accepted
    }

    pub(crate) fn begin_loading(&self) -> bool {
        self.transition(HandleState::Loading)
    }

    pub(crate) fn request(&self) -> bool {
        self.transition(HandleState::Requesting)
    }

    pub(crate) fn set_ready(&self) -> bool {
        self.transition(HandleState::Ready)
    }

    /// Install a document loaded from storage and become ready.
    pub(crate) fn load_ready(&self, doc: AutoCommit) -> bool {
        *self.inner.doc.write() = doc;
        self.transition(HandleState::Ready)
    }

    pub(crate) fn mark_unavailable(&self) -> bool {
        let accepted = self.transition(HandleState::Unavailable);
        if accepted {
            let _ = self.inner.events_tx.send(DocHandleEvent::Unavailable);
            let _ = self.inner.repo_tx.send(RepoInput::HandleUnavailable {
                document_id: self.inner.document_id.clone(),
            });
        }
        accepted
    }

    pub(crate) fn mark_deleted(&self) {
        if self.transition(HandleState::Deleted) {
            let _ = self.inner.events_tx.send(DocHandleEvent::Deleted);
        }
    }

    pub(crate) fn emit_ephemeral(&self, sender_id: PeerId, data: Vec<u8>) {
        let _ = self
            .inner
            .events_tx
            .send(DocHandleEvent::Ephemeral { sender_id, data });
    }

    /// Run `f` with exclusive access without emitting change events. For
    /// sync-message generation and persistence, which never move the heads.
    pub(crate) fn with_doc_mut<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut AutoCommit) -> T,
    {
        let mut doc = self.inner.doc.write();
        f(&mut doc)
    }

    /// Changes since the last save, marking them saved.
    pub(crate) fn save_incremental_bytes(&self) -> Vec<u8> {
        self.inner.doc.write().save_incremental()
    }

    /// The full document, marking everything saved.
    pub(crate) fn save_full_bytes(&self) -> Vec<u8> {
        self.inner.doc.write().save()
    }

    /// Fork the document with its full history.
    pub(crate) fn fork_doc(&self) -> AutoCommit {
        self.inner.doc.write().fork()
    }
}

impl std::fmt::Debug for DocHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocHandle")
            .field("document_id", &self.inner.document_id)
            .field("state", &self.state())
            .finish()
    }
}

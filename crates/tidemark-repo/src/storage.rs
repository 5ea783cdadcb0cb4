//! Persistence of documents and sync states over a storage adapter.

use crate::error::{RepoError, Result};
use crate::handle::DocHandle;
use automerge::sync;
use automerge::AutoCommit;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tidemark_storage::{StorageAdapter, StorageKey};
use tidemark_types::{DocumentId, PeerId};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Key component under which full-document snapshots are stored.
const SNAPSHOT: &str = "snapshot";
/// Key component under which incremental change chunks are stored.
const INCREMENTAL: &str = "incremental";
/// Key component under which per-peer sync states are stored.
const SYNC_STATE: &str = "sync-state";

/// A full snapshot is written alongside every n-th chunk.
const SNAPSHOT_EVERY: u64 = 10;

/// Serializes documents and per-peer sync states under a hierarchical key
/// scheme:
///
/// - `[documentId, "snapshot", <seq>]`: full document bytes
/// - `[documentId, "incremental", <seq>]`: incremental change chunks
/// - `[documentId, "sync-state", <peerId>]`: encoded sync states
///
/// Document writes happen in the background and never interrupt the sync
/// loop: failures are logged and swallowed. Reads are explicit and
/// propagate their errors.
pub(crate) struct StorageCoordinator {
    adapter: Arc<dyn StorageAdapter>,
    /// Next chunk sequence number per document. Restored from storage on
    /// load so a restarted repo appends instead of overwriting.
    sequences: DashMap<DocumentId, u64>,
    /// In-flight background writes, awaited by [`StorageCoordinator::flush`].
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl StorageCoordinator {
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            adapter,
            sequences: DashMap::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn doc_prefix(document_id: &DocumentId) -> StorageKey {
        StorageKey::from_components([document_id.to_string()])
    }

    fn chunk_key(document_id: &DocumentId, kind: &str, seq: u64) -> StorageKey {
        StorageKey::from_components([document_id.to_string(), kind.to_string(), format!("{seq:016}")])
    }

    fn sync_state_key(document_id: &DocumentId, peer: &PeerId) -> StorageKey {
        StorageKey::from_components([
            document_id.to_string(),
            SYNC_STATE.to_string(),
            peer.to_string(),
        ])
    }

    fn next_seq(&self, document_id: &DocumentId) -> u64 {
        let mut entry = self.sequences.entry(document_id.clone()).or_insert(0);
        let seq = *entry;
        *entry += 1;
        seq
    }

    fn spawn_save(&self, key: StorageKey, data: Vec<u8>) {
        let adapter = Arc::clone(&self.adapter);
        let task = tokio::spawn(async move {
            if let Err(err) = adapter.save(&key, Bytes::from(data)).await {
                warn!("background save of {key} failed: {err}");
            }
        });
        self.tasks.lock().push(task);
    }

    /// Persist a freshly created document as its first snapshot.
    pub fn save_initial(&self, document_id: &DocumentId, handle: &DocHandle) {
        let seq = self.next_seq(document_id);
        let bytes = handle.save_full_bytes();
        self.spawn_save(Self::chunk_key(document_id, SNAPSHOT, seq), bytes);
    }

    /// Persist whatever changed since the last save as a new chunk.
    ///
    /// The snapshot cadence is deterministic in the number of saves: every
    /// [`SNAPSHOT_EVERY`]-th chunk is accompanied by a full snapshot.
    pub fn append_change(&self, document_id: &DocumentId, handle: &DocHandle) {
        let chunk = handle.save_incremental_bytes();
        if chunk.is_empty() {
            return;
        }
        let seq = self.next_seq(document_id);
        self.spawn_save(Self::chunk_key(document_id, INCREMENTAL, seq), chunk);
        if seq % SNAPSHOT_EVERY == 0 {
            let snapshot = handle.save_full_bytes();
            self.spawn_save(Self::chunk_key(document_id, SNAPSHOT, seq), snapshot);
        }
    }

    /// Load and materialize a document from all of its stored chunks.
    ///
    /// Returns `None` when nothing is stored under the document's prefix.
    /// Chunks fold in key order; the CRDT deduplicates changes that appear
    /// in both a snapshot and an incremental chunk.
    pub async fn load_doc(&self, document_id: &DocumentId) -> Result<Option<AutoCommit>> {
        let chunks = self.adapter.load_range(&Self::doc_prefix(document_id)).await?;

        let mut doc = AutoCommit::new();
        let mut found = false;
        let mut next_seq = 0u64;
        for chunk in &chunks {
            let components = chunk.key.components();
            match components.get(1).map(String::as_str) {
                Some(SNAPSHOT) | Some(INCREMENTAL) => {
                    doc.load_incremental(&chunk.data)
                        .map_err(RepoError::from)?;
                    found = true;
                    if let Some(seq) = components.get(2).and_then(|c| c.parse::<u64>().ok()) {
                        next_seq = next_seq.max(seq + 1);
                    }
                }
                _ => {}
            }
        }

        if !found {
            return Ok(None);
        }
        debug!(
            "loaded {} from {} chunks, resuming at sequence {next_seq}",
            document_id,
            chunks.len()
        );
        self.sequences.insert(document_id.clone(), next_seq);
        Ok(Some(doc))
    }

    /// Remove everything stored under the document's prefix.
    pub async fn remove_doc(&self, document_id: &DocumentId) -> Result<()> {
        self.sequences.remove(document_id);
        self.adapter
            .remove_range(&Self::doc_prefix(document_id))
            .await
            .map_err(Into::into)
    }

    /// Background variant of [`StorageCoordinator::remove_doc`]; covered by
    /// [`StorageCoordinator::flush`].
    pub fn spawn_remove(self: &Arc<Self>, document_id: DocumentId) {
        let coordinator = Arc::clone(self);
        let task = tokio::spawn(async move {
            if let Err(err) = coordinator.remove_doc(&document_id).await {
                warn!("failed to remove stored state for {document_id}: {err}");
            }
        });
        self.tasks.lock().push(task);
    }

    /// Persist a peer's sync state under the reserved key. A checkpoint
    /// hook for reconnection; the sync loop itself never calls this, the
    /// in-memory state is authoritative within a process.
    pub async fn save_sync_state(
        &self,
        document_id: &DocumentId,
        peer: &PeerId,
        state: &sync::State,
    ) -> Result<()> {
        self.adapter
            .save(
                &Self::sync_state_key(document_id, peer),
                Bytes::from(state.encode()),
            )
            .await
            .map_err(Into::into)
    }

    /// Load a peer's persisted sync state, if any.
    pub async fn load_sync_state(
        &self,
        document_id: &DocumentId,
        peer: &PeerId,
    ) -> Result<Option<sync::State>> {
        let bytes = self
            .adapter
            .load(&Self::sync_state_key(document_id, peer))
            .await?;
        match bytes {
            Some(bytes) => {
                let state = sync::State::decode(&bytes)
                    .map_err(|err| RepoError::Automerge(err.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Wait for every background write issued so far.
    pub async fn flush(&self) {
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
    }
}

//! Persistence round-trips through a shared storage adapter.

mod common;

use automerge::transaction::Transactable;
use automerge::ROOT;
use common::{get_string, wait_until};
use std::sync::Arc;
use tidemark_repo::{HandleState, Repo, RepoConfig};
use tidemark_storage::{MemoryStorage, StorageKey};

fn repo_with_storage(name: &str, storage: &MemoryStorage) -> Repo {
    Repo::new(RepoConfig::with_peer_id(name).storage(Arc::new(storage.clone())))
}

/// Create, mutate, shut down, restart: the document comes back from storage
/// alone, with no network attached anywhere.
#[tokio::test(flavor = "multi_thread")]
async fn restart_restores_documents_without_network() {
    let storage = MemoryStorage::new();

    let first = repo_with_storage("alice", &storage);
    let doc = first.create();
    doc.update(|d| {
        d.put(ROOT, "title", "field notes")?;
        Ok(())
    })
    .unwrap();
    doc.update(|d| {
        d.put(ROOT, "body", "low tide at noon")?;
        Ok(())
    })
    .unwrap();
    let url = doc.url();
    let heads = doc.heads();
    first.shutdown().await;

    let second = repo_with_storage("alice", &storage);
    let restored = second.find(&url).unwrap();
    let settled = restored
        .wait_for_state(&[HandleState::Ready, HandleState::Unavailable])
        .await;

    assert_eq!(settled, HandleState::Ready);
    assert_eq!(get_string(&restored, "title").as_deref(), Some("field notes"));
    assert_eq!(
        get_string(&restored, "body").as_deref(),
        Some("low tide at noon")
    );
    assert_eq!(restored.heads(), heads);
    second.shutdown().await;
}

/// A freshly created document is persisted even before its first edit.
#[tokio::test(flavor = "multi_thread")]
async fn new_documents_are_persisted_immediately() {
    let storage = MemoryStorage::new();
    let repo = repo_with_storage("alice", &storage);

    let doc = repo.create();
    repo.flush().await;

    let prefix = StorageKey::from_components([doc.document_id().to_string()]);
    assert!(storage.keys().iter().any(|key| key.starts_with(&prefix)));
    repo.shutdown().await;
}

/// Edits persist incrementally as they happen, without an explicit save call.
#[tokio::test(flavor = "multi_thread")]
async fn edits_persist_incrementally() {
    let storage = MemoryStorage::new();
    let repo = repo_with_storage("alice", &storage);

    let doc = repo.create();
    repo.flush().await;
    let baseline = storage.len();

    doc.update(|d| {
        d.put(ROOT, "n", 1i64)?;
        Ok(())
    })
    .unwrap();
    repo.flush().await;

    assert!(storage.len() > baseline);
    repo.shutdown().await;
}

/// Deleting a document removes every key under its prefix.
#[tokio::test(flavor = "multi_thread")]
async fn delete_removes_persisted_state() {
    let storage = MemoryStorage::new();
    let repo = repo_with_storage("alice", &storage);

    let doc = repo.create();
    doc.update(|d| {
        d.put(ROOT, "title", "ephemeral")?;
        Ok(())
    })
    .unwrap();
    repo.flush().await;
    assert!(!storage.is_empty());

    let document_id = doc.document_id().clone();
    repo.delete(&document_id).unwrap();

    let prefix = StorageKey::from_components([document_id.to_string()]);
    wait_until("stored state is removed", || {
        !storage.keys().iter().any(|key| key.starts_with(&prefix))
    })
    .await;
    repo.shutdown().await;
}

/// Finding a document that was never stored falls back to the network path
/// instead of reporting a phantom ready state.
#[tokio::test(flavor = "multi_thread")]
async fn missing_document_does_not_load() {
    let storage = MemoryStorage::new();
    let repo = repo_with_storage("alice", &storage);

    let handle = repo.find_by_id(tidemark_types::DocumentId::random());
    // No network is attached, so the handle parks short of ready.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(handle.in_state(&[HandleState::Loading, HandleState::Requesting]));
    assert_ne!(handle.state(), HandleState::Ready);
    repo.shutdown().await;
}

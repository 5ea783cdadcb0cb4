//! In-memory reference adapter.

use crate::error::Result;
use crate::key::StorageKey;
use crate::{Chunk, StorageAdapter};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory storage adapter backed by an ordered map.
///
/// Clones share the same underlying map, so a "restarted" repo handed a
/// clone of this adapter sees everything the previous instance persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: std::sync::Arc<RwLock<BTreeMap<StorageKey, Bytes>>>,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All keys currently stored, in order.
    pub fn keys(&self) -> Vec<StorageKey> {
        self.entries.read().keys().cloned().collect()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn load(&self, key: &StorageKey) -> Result<Option<Bytes>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn save(&self, key: &StorageKey, data: Bytes) -> Result<()> {
        self.entries.write().insert(key.clone(), data);
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn load_range(&self, prefix: &StorageKey) -> Result<Vec<Chunk>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| Chunk {
                key: key.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn remove_range(&self, prefix: &StorageKey) -> Result<()> {
        self.entries
            .write()
            .retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(components: &[&str]) -> StorageKey {
        StorageKey::from_components(components.iter().copied())
    }

    #[tokio::test]
    async fn test_save_then_load_returns_bytes_exactly() {
        let storage = MemoryStorage::new();
        let k = key(&["doc-1", "snapshot", "0"]);
        let data = Bytes::from_static(b"\x00\x01\xff");

        storage.save(&k, data.clone()).await.unwrap();
        assert_eq!(storage.load(&k).await.unwrap(), Some(data));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let storage = MemoryStorage::new();
        let k = key(&["doc-1", "snapshot", "0"]);

        storage.save(&k, Bytes::from_static(b"old")).await.unwrap();
        storage.save(&k, Bytes::from_static(b"new")).await.unwrap();
        assert_eq!(
            storage.load(&k).await.unwrap(),
            Some(Bytes::from_static(b"new"))
        );
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load(&key(&["nope"])).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let storage = MemoryStorage::new();
        let k = key(&["doc-1", "snapshot", "0"]);
        storage.save(&k, Bytes::from_static(b"x")).await.unwrap();

        storage.remove(&k).await.unwrap();
        storage.remove(&k).await.unwrap();
        assert_eq!(storage.load(&k).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_range_returns_exactly_the_prefix() {
        let storage = MemoryStorage::new();
        storage
            .save(&key(&["doc-1", "incremental", "0"]), Bytes::from_static(b"a"))
            .await
            .unwrap();
        storage
            .save(&key(&["doc-1", "incremental", "1"]), Bytes::from_static(b"b"))
            .await
            .unwrap();
        storage
            .save(&key(&["doc-1", "snapshot", "0"]), Bytes::from_static(b"c"))
            .await
            .unwrap();
        // Same leading string bytes but a different component; must not match.
        storage
            .save(&key(&["doc-10", "incremental", "0"]), Bytes::from_static(b"d"))
            .await
            .unwrap();

        let chunks = storage.load_range(&key(&["doc-1"])).await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.key.starts_with(&key(&["doc-1"]))));

        let incremental = storage
            .load_range(&key(&["doc-1", "incremental"]))
            .await
            .unwrap();
        assert_eq!(incremental.len(), 2);
        // BTreeMap iteration keeps chunks in key order.
        assert_eq!(incremental[0].data, Bytes::from_static(b"a"));
        assert_eq!(incremental[1].data, Bytes::from_static(b"b"));
    }

    #[tokio::test]
    async fn test_remove_range_removes_exactly_the_prefix() {
        let storage = MemoryStorage::new();
        storage
            .save(&key(&["doc-1", "incremental", "0"]), Bytes::from_static(b"a"))
            .await
            .unwrap();
        storage
            .save(&key(&["doc-1", "sync-state", "bob"]), Bytes::from_static(b"b"))
            .await
            .unwrap();
        storage
            .save(&key(&["doc-2", "snapshot", "0"]), Bytes::from_static(b"c"))
            .await
            .unwrap();

        storage.remove_range(&key(&["doc-1"])).await.unwrap();

        assert!(storage.load_range(&key(&["doc-1"])).await.unwrap().is_empty());
        assert_eq!(
            storage
                .load(&key(&["doc-2", "snapshot", "0"]))
                .await
                .unwrap(),
            Some(Bytes::from_static(b"c"))
        );
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage
            .save(&key(&["doc-1", "snapshot", "0"]), Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert_eq!(other.len(), 1);
    }
}

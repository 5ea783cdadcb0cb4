//! Platform-agnostic storage capability for Tidemark persistence.
//!
//! This crate defines the [`StorageAdapter`] trait every persistence backend
//! implements, the hierarchical [`StorageKey`] scheme the sync engine stores
//! under, and [`MemoryStorage`], the in-process reference adapter used by
//! tests and ephemeral repos.
//!
//! # Example
//!
//! ```
//! use tidemark_storage::{MemoryStorage, StorageAdapter, StorageKey};
//! use bytes::Bytes;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tidemark_storage::Result<()> {
//! let storage = MemoryStorage::new();
//! let key = StorageKey::from_components(["doc-1", "snapshot", "0"]);
//! storage.save(&key, Bytes::from_static(b"bytes")).await?;
//! assert_eq!(storage.load(&key).await?, Some(Bytes::from_static(b"bytes")));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod key;
pub mod memory;

pub use error::{Result, StorageError};
pub use key::StorageKey;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use bytes::Bytes;

/// A key/value pair returned by range loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Full key the value is stored under.
    pub key: StorageKey,
    /// Stored bytes.
    pub data: Bytes,
}

/// Platform-agnostic storage adapter.
///
/// Keys are ordered sequences of short strings; values are byte sequences.
/// Implementations must uphold:
///
/// - `save(k, d)` followed by `load(k)` returns exactly `d`; saving over an
///   existing key overwrites it.
/// - `load_range(p)` returns every entry whose key has `p` as a componentwise
///   initial subsequence (and nothing else), sorted by key.
/// - `remove_range(p)` removes exactly the entries `load_range(p)` would
///   return.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Load the value stored under `key`, or `None` if absent.
    async fn load(&self, key: &StorageKey) -> Result<Option<Bytes>>;

    /// Store `data` under `key`, overwriting any previous value.
    async fn save(&self, key: &StorageKey, data: Bytes) -> Result<()>;

    /// Remove the value stored under `key`. Removing an absent key is a no-op.
    async fn remove(&self, key: &StorageKey) -> Result<()>;

    /// Load all entries whose key starts with `prefix`, sorted by key.
    async fn load_range(&self, prefix: &StorageKey) -> Result<Vec<Chunk>>;

    /// Remove all entries whose key starts with `prefix`.
    async fn remove_range(&self, prefix: &StorageKey) -> Result<()>;
}

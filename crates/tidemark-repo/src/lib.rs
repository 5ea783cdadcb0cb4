//! Peer-to-peer CRDT document synchronization engine.
//!
//! A [`Repo`] keeps local replicas of Automerge documents convergent with
//! replicas held by other peers. It mediates between three collaborators:
//! the CRDT library (opaque sync messages per document), pluggable network
//! adapters (addressed message delivery), and pluggable storage adapters
//! (persistence of documents and sync state).
//!
//! - [`DocHandle`] is the client-facing reference to one document, with a
//!   lifecycle state machine and change events.
//! - The per-document and per-repo synchronizers decide when to request a
//!   document, when to offer it, and when to declare it unavailable, and
//!   produce the exact message sequence the CRDT sync protocol requires.
//! - The storage coordinator persists documents as incremental chunks with
//!   periodic snapshots under a hierarchical key scheme.
//!
//! All synchronizer state is owned by one event loop per repo, so arbitrary
//! interleavings of storage completions, network arrivals and local edits
//! are applied in a single serialized order.
//!
//! # Example
//!
//! ```
//! use tidemark_repo::{Repo, RepoConfig, HandleState};
//! use tidemark_network::ChannelAdapter;
//! use tidemark_types::PeerId;
//! use automerge::transaction::Transactable;
//! use automerge::ROOT;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tidemark_repo::Result<()> {
//! let alice = Repo::new(RepoConfig::with_peer_id("alice"));
//! let bob = Repo::new(RepoConfig::with_peer_id("bob"));
//!
//! let (alice_end, bob_end) =
//!     ChannelAdapter::pair(PeerId::from("alice"), PeerId::from("bob"));
//! alice.add_network_adapter(alice_end)?;
//! bob.add_network_adapter(bob_end)?;
//!
//! let handle = alice.create();
//! handle.update(|doc| {
//!     doc.put(ROOT, "greeting", "hello")?;
//!     Ok(())
//! })?;
//!
//! let found = bob.find(&handle.url())?;
//! found.wait_for_state(&[HandleState::Ready]).await;
//! # alice.shutdown().await;
//! # bob.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod collection_synchronizer;
mod doc_synchronizer;
pub mod error;
pub mod handle;
pub mod repo;
pub mod share_policy;
mod storage;

pub use error::{RepoError, Result};
pub use handle::{DocHandle, DocHandleEvent, HandleState};
pub use repo::{Repo, RepoConfig, RepoEvent};
pub use share_policy::{share_generously, share_policy_fn, SharePolicy};

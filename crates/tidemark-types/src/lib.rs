//! Shared identifier types for the Tidemark sync engine.
//!
//! This crate holds the two identifiers every other layer speaks in:
//! [`DocumentId`], a 16-byte document identifier with a Base58-check URL
//! form, and [`PeerId`], the opaque string naming a remote repo instance.

pub mod document_id;
pub mod error;
pub mod peer_id;

pub use document_id::DocumentId;
pub use error::{Result, TypesError};
pub use peer_id::PeerId;

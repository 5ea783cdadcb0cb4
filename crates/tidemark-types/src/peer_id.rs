//! Peer identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An opaque short string identifying a remote repo instance.
///
/// Uniqueness is assumed within a repo; collisions are undefined behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Construct a peer id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a random peer id.
    pub fn random() -> Self {
        Self(format!("peer-{}", &Uuid::new_v4().simple().to_string()[..8]))
    }

    /// The peer id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Error types for the repo core.

use thiserror::Error;
use tidemark_types::DocumentId;

/// Result type alias for repo operations.
pub type Result<T> = std::result::Result<T, RepoError>;

/// Errors surfaced by the repo core.
///
/// Document unavailability is deliberately not here: it is a handle state
/// transition plus an event, never an error.
#[derive(Error, Debug)]
pub enum RepoError {
    /// A message arrived with a mismatched document id.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// A document URL failed to parse.
    #[error("Invalid document URL: {0}")]
    InvalidUrl(#[from] tidemark_types::TypesError),

    /// `clone_document` was called on a handle that is not ready.
    #[error("Cannot clone document {0}: handle is not ready")]
    CloneNotReady(DocumentId),

    /// The handle's document is not materialized in its current state.
    #[error("Document {0} is not available in this handle state")]
    NotReady(DocumentId),

    /// Storage failure during an explicit load or delete.
    #[error("Storage error: {0}")]
    Storage(#[from] tidemark_storage::StorageError),

    /// Network adapter misuse or failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The CRDT rejected an operation.
    #[error("Automerge error: {0}")]
    Automerge(String),

    /// The repo's event loop has stopped.
    #[error("Repo is shut down")]
    Shutdown,
}

impl From<automerge::AutomergeError> for RepoError {
    fn from(err: automerge::AutomergeError) -> Self {
        RepoError::Automerge(err.to_string())
    }
}

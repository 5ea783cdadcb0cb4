//! Error types for the network layer.

use thiserror::Error;

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Network error types.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// The adapter is no longer connected to its remote.
    #[error("Adapter disconnected")]
    Disconnected,

    /// A send failed at the transport level.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for NetworkError {
    fn from(err: bincode::Error) -> Self {
        NetworkError::Serialization(err.to_string())
    }
}

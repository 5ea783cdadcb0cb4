//! Error types for identifier parsing.

use thiserror::Error;

/// Result type alias for identifier operations.
pub type Result<T> = std::result::Result<T, TypesError>;

/// Errors raised while parsing identifiers and document URLs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// The string is not a valid document URL.
    #[error("Invalid document URL: {0}")]
    InvalidUrl(String),

    /// A decoded document id had the wrong number of bytes.
    #[error("Invalid document id length: expected 16 bytes, got {0}")]
    InvalidLength(usize),
}

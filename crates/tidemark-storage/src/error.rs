//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage error types.
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unsupported feature.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::Backend("disk on fire".to_string());
        assert_eq!(err.to_string(), "Backend error: disk on fire");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = StorageError::from(io_err);
        assert!(err.to_string().contains("IO error"));
    }
}

//! Error types for storage operations.

use thiserror::Error;

/// Errors reported by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backend failed to serve the request.
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// The backend is shut down or otherwise not accepting requests.
    #[error("storage unavailable")]
    Unavailable,
}

/// Convenience type alias for storage reads.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

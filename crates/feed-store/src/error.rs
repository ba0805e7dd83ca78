use std::time::Duration;

use feed_storage::StorageError;
use feed_types::TypeError;

/// Errors from feed store operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedStoreError {
    /// A storage read failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Storage rejected a commit; nothing from the batch was applied.
    #[error("commit failed: {operation}")]
    CommitFailed { operation: &'static str },

    /// Storage dropped the completion callback without firing it.
    #[error("interrupted waiting for {operation}")]
    Interrupted { operation: &'static str },

    /// The completion callback did not fire within the configured limit.
    ///
    /// For a commit this means the batch was withdrawn before it reached
    /// storage and was not applied.
    #[error("timed out after {timeout:?} waiting for {operation}")]
    TimedOut {
        operation: &'static str,
        timeout: Duration,
    },

    /// The wait timed out after the commit had already been handed to
    /// storage. The batch may or may not have been applied.
    #[error("{operation} outcome unknown: commit started but did not report within {timeout:?}")]
    CommitUnresolved {
        operation: &'static str,
        timeout: Duration,
    },

    /// The HEAD session cannot be removed.
    #[error("cannot remove the HEAD session")]
    HeadRemoval,

    /// A content id is unusable for the requested write.
    #[error("invalid content id {content_id:?}: {reason}")]
    InvalidContentId { content_id: String, reason: String },

    /// A blocking store call was made on the main thread.
    #[error("{operation} must not be called on the main thread")]
    OnMainThread { operation: &'static str },

    /// A record could not be encoded for writing.
    #[error("codec error: {0}")]
    Codec(#[from] TypeError),

    /// The configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for feed store operations.
pub type FeedStoreResult<T> = Result<T, FeedStoreError>;

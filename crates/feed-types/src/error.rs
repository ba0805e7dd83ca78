use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("content id {id:?} uses reserved prefix {prefix:?}")]
    ReservedPrefix { id: String, prefix: &'static str },

    #[error("empty content id")]
    EmptyContentId,

    #[error("empty record: zero-length blobs are reserved for the journal sentinel")]
    EmptyRecord,

    #[error("serialization error: {0}")]
    Serialization(String),
}

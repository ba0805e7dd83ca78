//! The [`ContentStorage`] and [`JournalStorage`] traits.
//!
//! Any backend (in-memory, SQLite, a platform key-value service) implements
//! these traits. Calls return immediately and report their outcome through
//! the supplied [`Callback`], possibly on another thread.

use std::collections::HashMap;

use crate::error::StorageResult;
use crate::mutation::{CommitResult, ContentMutation, JournalMutation};

/// One-shot completion callback.
pub type Callback<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Key-value storage for content payloads.
///
/// Implementations must be thread-safe (`Send + Sync`). Keys are opaque
/// strings; namespacing is the caller's business.
pub trait ContentStorage: Send + Sync {
    /// Fetch the given keys. Missing keys are simply absent from the map.
    fn get(&self, keys: Vec<String>, callback: Callback<StorageResult<HashMap<String, Vec<u8>>>>);

    /// Fetch every entry whose key starts with `prefix`.
    ///
    /// Pass `""` to fetch the whole store.
    fn get_all(&self, prefix: String, callback: Callback<StorageResult<HashMap<String, Vec<u8>>>>);

    /// Apply a batch of upserts and deletes atomically.
    fn commit(&self, mutation: ContentMutation, callback: Callback<CommitResult>);
}

/// Named, ordered, append-only logs of blobs.
///
/// Implementations must be thread-safe (`Send + Sync`) and keep at most one
/// commit in flight per journal.
pub trait JournalStorage: Send + Sync {
    /// Read a journal in append order. A missing journal reads as empty.
    fn read(&self, journal_name: String, callback: Callback<StorageResult<Vec<Vec<u8>>>>);

    /// List the names of every existing journal.
    fn get_all_journals(&self, callback: Callback<StorageResult<Vec<String>>>);

    /// Apply a batch of append/copy/delete operations atomically.
    fn commit(&self, mutation: JournalMutation, callback: Callback<CommitResult>);
}

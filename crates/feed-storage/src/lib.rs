//! Storage contracts consumed by the feed store.
//!
//! The store sits on two platform-provided backends that it never
//! interprets: a key-value **content storage** and a set of named,
//! append-only **journals**. Both are asynchronous by contract and report
//! completion through a one-shot callback.
//!
//! # Modules
//!
//! - [`error`] -- Error types for storage operations
//! - [`mutation`] -- Batched, atomic mutations and [`CommitResult`]
//! - [`traits`] -- The [`ContentStorage`] and [`JournalStorage`] traits
//! - [`thread`] -- The [`MainThreadRunner`] commits are dispatched through
//! - [`memory`] -- In-memory backends for tests and embedding
//!
//! # Contract
//!
//! 1. Every operation fires its callback exactly once, or drops it if the
//!    backend shuts down mid-flight.
//! 2. A commit applies all of its operations or none of them.
//! 3. Missing keys are absent from a `get` result, never an error.
//! 4. Reading a journal that does not exist yields an empty list.

pub mod error;
pub mod memory;
pub mod mutation;
pub mod thread;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::{InMemoryContentStorage, InMemoryJournalStorage};
pub use mutation::{
    CommitResult, ContentMutation, ContentOperation, JournalMutation, JournalOperation,
};
pub use thread::{DedicatedMainThread, InlineMainThread, MainThreadRunner, Task};
pub use traits::{Callback, ContentStorage, JournalStorage};

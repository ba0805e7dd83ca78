//! Persistent content and session store for the feed.
//!
//! [`FeedStore`] keeps four kinds of state on top of the callback-based
//! storage contracts in `feed-storage`:
//!
//! - content payloads and shared state, keyed by content id
//! - per-session structure journals, with `$HEAD` as the baseline that new
//!   sessions are forked from
//! - semantic properties attached to content ids
//! - append-only journals of user actions
//!
//! Writes are staged in a [`MutationBuilder`] and committed as one atomic
//! batch. A population sweep ([`ContentGc`]) removes content that no session
//! references.
//!
//! # Threading
//!
//! Every storage-touching call blocks until the backend answers. Commits are
//! dispatched through the [`MainThreadRunner`](feed_storage::MainThreadRunner)
//! while the caller waits on its own thread, so blocking calls made on the
//! main thread are rejected with [`FeedStoreError::OnMainThread`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use feed_storage::{InMemoryContentStorage, InMemoryJournalStorage, InlineMainThread};
//! use feed_store::{FeedStore, FeedStoreConfig};
//! use feed_types::{StreamPayload, StreamStructure};
//!
//! # fn main() -> feed_store::FeedStoreResult<()> {
//! let store = FeedStore::new(
//!     Arc::new(InMemoryContentStorage::new()),
//!     Arc::new(InMemoryJournalStorage::new()),
//!     Arc::new(InlineMainThread),
//!     FeedStoreConfig::default(),
//! );
//!
//! store
//!     .edit_content()
//!     .add_payload("card-1", StreamPayload::Content(b"card".to_vec()))
//!     .commit()?;
//! store
//!     .edit_session(&store.get_head_session())
//!     .add_structure(StreamStructure::update_or_append("card-1", None))
//!     .commit()?;
//!
//! let session = store.create_new_session()?;
//! assert_eq!(store.get_stream_structures(&session)?.len(), 1);
//! # Ok(())
//! # }
//! ```

mod bridge;
pub mod clock;
pub mod config;
pub mod error;
pub mod gc;
pub mod mutation;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::FeedStoreConfig;
pub use error::{FeedStoreError, FeedStoreResult};
pub use gc::{ContentGc, GcOutcome, GcReport};
pub use mutation::{
    ActionMutationBuilder, ContentMutationBuilder, MutationBuilder, PendingAction,
    SemanticPropertiesMutationBuilder, SessionMutationBuilder,
};
pub use store::FeedStore;

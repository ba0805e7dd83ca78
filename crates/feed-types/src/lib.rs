//! Foundation types for the feed store.
//!
//! This crate provides the vocabulary shared by the storage contracts and
//! the store itself. Every other feed crate depends on `feed-types`.
//!
//! # Key Types
//!
//! - [`ContentKey`] -- Tagged content-storage key (plain, shared state, semantic properties)
//! - [`Session`] -- Handle naming a session journal; [`Session::head`] is the baseline
//! - [`StreamPayload`] -- Content payload or shared state, keyed by content id
//! - [`StreamStructure`] -- One structural operation recorded in a session journal
//! - [`StreamAction`] -- A timestamped user action (e.g. a dismissal)
//! - [`SemanticProperties`] -- Opaque per-item metadata bytes

pub mod action;
pub mod codec;
pub mod error;
pub mod key;
pub mod payload;
pub mod session;
pub mod structure;

pub use action::{ActionType, StreamAction};
pub use codec::{decode_record, encode_record};
pub use error::TypeError;
pub use key::{ContentKey, SEMANTIC_PROPERTIES_PREFIX, SHARED_STATE_PREFIX};
pub use payload::{PayloadWithId, SemanticProperties, StreamPayload, StreamSharedState};
pub use session::{Session, HEAD_TOKEN};
pub use structure::{live_content_ids, StreamStructure, StructureOperation};

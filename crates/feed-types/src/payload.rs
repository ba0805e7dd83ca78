use serde::{Deserialize, Serialize};

use crate::key::ContentKey;

/// A content record as written by the refresh pipeline.
///
/// The variant decides where the bytes land in content storage: shared
/// state is stored once under the `shared-state:` namespace, everything
/// else under the bare content id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamPayload {
    /// An opaque content record (card, cluster, feature, ...).
    Content(Vec<u8>),
    /// Opaque state shared across all sessions.
    SharedState(Vec<u8>),
}

impl StreamPayload {
    /// Returns `true` if this payload is shared state.
    pub fn is_shared_state(&self) -> bool {
        matches!(self, Self::SharedState(_))
    }

    /// The content-storage key for this payload under `content_id`.
    pub fn key_for(&self, content_id: &str) -> ContentKey {
        match self {
            Self::Content(_) => ContentKey::Content(content_id.to_string()),
            Self::SharedState(_) => ContentKey::SharedState(content_id.to_string()),
        }
    }

    /// The opaque bytes carried by this payload.
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Content(data) | Self::SharedState(data) => data,
        }
    }
}

/// A decoded payload paired with the content id it was stored under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadWithId {
    pub content_id: String,
    pub payload: StreamPayload,
}

impl PayloadWithId {
    pub fn new(content_id: impl Into<String>, payload: StreamPayload) -> Self {
        Self {
            content_id: content_id.into(),
            payload,
        }
    }
}

/// A shared-state entry read back from content storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSharedState {
    /// Content id with the namespace prefix stripped.
    pub content_id: String,
    pub data: Vec<u8>,
}

/// Semantic properties for one content id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SemanticProperties {
    pub content_id: String,
    pub data: Vec<u8>,
}

impl SemanticProperties {
    pub fn new(content_id: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            content_id: content_id.into(),
            data: data.into(),
        }
    }
}

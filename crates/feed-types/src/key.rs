use std::fmt;

use crate::error::TypeError;

/// Storage-key prefix for state shared across every session.
pub const SHARED_STATE_PREFIX: &str = "shared-state:";

/// Storage-key prefix for per-item semantic properties.
pub const SEMANTIC_PROPERTIES_PREFIX: &str = "semantic-properties:";

/// A key in content storage, tagged by namespace.
///
/// Content storage is a flat string-keyed map, so the namespaces are encoded
/// as string prefixes on the wire. Inside the store the namespace travels as
/// the enum variant and the prefix is only applied or stripped at the
/// storage boundary ([`ContentKey::storage_key`] / [`ContentKey::parse`]).
///
/// Shared-state and semantic-properties keys have their own lifecycle and are
/// never removed by a population sweep; see [`ContentKey::is_gc_exempt`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentKey {
    /// A plain content payload, stored under its bare id.
    Content(String),
    /// Shared state, stored under `shared-state:<id>`.
    SharedState(String),
    /// Semantic properties, stored under `semantic-properties:<id>`.
    SemanticProperties(String),
}

impl ContentKey {
    /// Build a plain content key, rejecting ids that would alias a
    /// prefixed namespace.
    pub fn content(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::EmptyContentId);
        }
        for prefix in [SHARED_STATE_PREFIX, SEMANTIC_PROPERTIES_PREFIX] {
            if id.starts_with(prefix) {
                return Err(TypeError::ReservedPrefix { id, prefix });
            }
        }
        Ok(Self::Content(id))
    }

    /// Classify a raw storage key by its prefix.
    pub fn parse(raw: &str) -> Self {
        if let Some(id) = raw.strip_prefix(SHARED_STATE_PREFIX) {
            Self::SharedState(id.to_string())
        } else if let Some(id) = raw.strip_prefix(SEMANTIC_PROPERTIES_PREFIX) {
            Self::SemanticProperties(id.to_string())
        } else {
            Self::Content(raw.to_string())
        }
    }

    /// The content id without any namespace prefix.
    pub fn id(&self) -> &str {
        match self {
            Self::Content(id) | Self::SharedState(id) | Self::SemanticProperties(id) => id,
        }
    }

    /// The string key under which this entry lives in content storage.
    pub fn storage_key(&self) -> String {
        match self {
            Self::Content(id) => id.clone(),
            Self::SharedState(id) => format!("{SHARED_STATE_PREFIX}{id}"),
            Self::SemanticProperties(id) => format!("{SEMANTIC_PROPERTIES_PREFIX}{id}"),
        }
    }

    /// Returns `true` for namespaces that a population GC sweep must skip.
    pub fn is_gc_exempt(&self) -> bool {
        !matches!(self, Self::Content(_))
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

//! Accumulate-then-commit builders for store writes.
//!
//! A builder only collects changes. [`MutationBuilder::commit`] hands the
//! whole batch to the commit function supplied by the store, which is the
//! one place that talks to storage.

use feed_types::{ActionType, PayloadWithId, SemanticProperties, StreamPayload, StreamStructure};

use crate::error::FeedStoreResult;

type Committer<'a, T> = Box<dyn FnOnce(Vec<T>) -> FeedStoreResult<()> + 'a>;

/// A batch of changes of one kind, committed together.
pub struct MutationBuilder<'a, T> {
    changes: Vec<T>,
    committer: Committer<'a, T>,
}

/// Content payload upserts.
pub type ContentMutationBuilder<'a> = MutationBuilder<'a, PayloadWithId>;
/// Structure records appended to one session.
pub type SessionMutationBuilder<'a> = MutationBuilder<'a, StreamStructure>;
/// Semantic property upserts.
pub type SemanticPropertiesMutationBuilder<'a> = MutationBuilder<'a, SemanticProperties>;
/// User actions, routed to per-type journals.
pub type ActionMutationBuilder<'a> = MutationBuilder<'a, PendingAction>;

/// An action queued in an [`ActionMutationBuilder`], not yet timestamped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAction {
    pub action_type: ActionType,
    pub content_id: String,
}

impl<'a, T> MutationBuilder<'a, T> {
    pub(crate) fn new(committer: impl FnOnce(Vec<T>) -> FeedStoreResult<()> + 'a) -> Self {
        Self {
            changes: Vec::new(),
            committer: Box::new(committer),
        }
    }

    /// Number of queued changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if nothing has been queued.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Commit every queued change as one batch.
    pub fn commit(self) -> FeedStoreResult<()> {
        (self.committer)(self.changes)
    }

    fn push(mut self, change: T) -> Self {
        self.changes.push(change);
        self
    }
}

impl<'a> MutationBuilder<'a, PayloadWithId> {
    /// Upsert `payload` under `content_id`.
    pub fn add_payload(self, content_id: impl Into<String>, payload: StreamPayload) -> Self {
        self.push(PayloadWithId::new(content_id, payload))
    }
}

impl<'a> MutationBuilder<'a, StreamStructure> {
    /// Append one structure record.
    pub fn add_structure(self, structure: StreamStructure) -> Self {
        self.push(structure)
    }

    /// Append several structure records in order.
    pub fn add_structures(mut self, structures: impl IntoIterator<Item = StreamStructure>) -> Self {
        self.changes.extend(structures);
        self
    }
}

impl<'a> MutationBuilder<'a, SemanticProperties> {
    /// Upsert the semantic properties of `content_id`.
    pub fn add(self, content_id: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.push(SemanticProperties::new(content_id, data))
    }
}

impl<'a> MutationBuilder<'a, PendingAction> {
    /// Record an action of any type.
    pub fn add_action(self, action_type: ActionType, content_id: impl Into<String>) -> Self {
        self.push(PendingAction {
            action_type,
            content_id: content_id.into(),
        })
    }

    /// Record a dismissal of `content_id`.
    pub fn dismiss(self, content_id: impl Into<String>) -> Self {
        self.add_action(ActionType::Dismiss, content_id)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for MutationBuilder<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationBuilder")
            .field("changes", &self.changes)
            .finish()
    }
}

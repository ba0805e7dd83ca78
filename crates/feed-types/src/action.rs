use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of user action being recorded.
///
/// Each recognized type has its own append-only journal.
/// [`ActionType::Unspecified`] has none and is skipped on commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionType {
    Unspecified,
    Dismiss,
}

impl ActionType {
    /// Every type that owns a journal.
    pub const JOURNALED: [ActionType; 1] = [ActionType::Dismiss];

    /// Name of the journal this type's records are appended to.
    pub fn journal_name(&self) -> Option<&'static str> {
        match self {
            Self::Dismiss => Some("action:dismiss"),
            Self::Unspecified => None,
        }
    }

    /// Returns `true` if `name` is the journal of some action type.
    pub fn is_action_journal(name: &str) -> bool {
        Self::JOURNALED
            .iter()
            .any(|t| t.journal_name() == Some(name))
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => f.write_str("unspecified"),
            Self::Dismiss => f.write_str("dismiss"),
        }
    }
}

/// A user action against a content id, stamped when it was committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAction {
    pub action_type: ActionType,
    pub content_id: String,
    /// Seconds since the Unix epoch.
    pub timestamp_seconds: u64,
}

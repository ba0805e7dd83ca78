use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// The kind of change a structure record applies to a session's view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureOperation {
    /// Drop everything the session referenced so far.
    ClearAll,
    /// Insert the content id, or refresh it in place if already present.
    UpdateOrAppend,
    /// Stop referencing the content id.
    Remove,
    /// Reference content the view needs but does not display directly.
    RequiredContent,
}

/// One structural operation in a session journal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStructure {
    pub operation: StructureOperation,
    /// Empty for [`StructureOperation::ClearAll`].
    pub content_id: String,
    /// The parent in the view tree, if any.
    pub parent_content_id: Option<String>,
}

impl StreamStructure {
    pub fn clear_all() -> Self {
        Self {
            operation: StructureOperation::ClearAll,
            content_id: String::new(),
            parent_content_id: None,
        }
    }

    pub fn update_or_append(content_id: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            operation: StructureOperation::UpdateOrAppend,
            content_id: content_id.into(),
            parent_content_id: parent.map(str::to_string),
        }
    }

    pub fn remove(content_id: impl Into<String>) -> Self {
        Self {
            operation: StructureOperation::Remove,
            content_id: content_id.into(),
            parent_content_id: None,
        }
    }

    pub fn required_content(content_id: impl Into<String>) -> Self {
        Self {
            operation: StructureOperation::RequiredContent,
            content_id: content_id.into(),
            parent_content_id: None,
        }
    }
}

/// Replay a session's structure records and return the content ids it
/// still references at the end.
pub fn live_content_ids<'a, I>(structures: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a StreamStructure>,
{
    let mut live = HashSet::new();
    for structure in structures {
        match structure.operation {
            StructureOperation::ClearAll => live.clear(),
            StructureOperation::UpdateOrAppend | StructureOperation::RequiredContent => {
                live.insert(structure.content_id.clone());
            }
            StructureOperation::Remove => {
                live.remove(&structure.content_id);
            }
        }
    }
    live
}

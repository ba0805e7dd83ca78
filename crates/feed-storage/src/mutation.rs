//! Batched mutations handed to a storage `commit`.

/// Outcome of a storage commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitResult {
    Success,
    Failure,
}

impl CommitResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One change to content storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentOperation {
    Upsert { key: String, value: Vec<u8> },
    Delete { key: String },
}

/// An atomic batch of content-storage changes, applied in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentMutation {
    operations: Vec<ContentOperation>,
}

impl ContentMutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.operations.push(ContentOperation::Upsert {
            key: key.into(),
            value,
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.operations.push(ContentOperation::Delete { key: key.into() });
        self
    }

    pub fn operations(&self) -> &[ContentOperation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<ContentOperation> {
        self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// One change to a journal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalOperation {
    /// Append a blob, creating the journal if needed.
    Append(Vec<u8>),
    /// Replace the contents of `to` with this journal's current contents.
    Copy { to: String },
    /// Remove the journal and everything in it.
    Delete,
}

/// An atomic batch of changes to one named journal, applied in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JournalMutation {
    journal_name: String,
    operations: Vec<JournalOperation>,
}

impl JournalMutation {
    pub fn new(journal_name: impl Into<String>) -> Self {
        Self {
            journal_name: journal_name.into(),
            operations: Vec::new(),
        }
    }

    pub fn append(mut self, value: Vec<u8>) -> Self {
        self.operations.push(JournalOperation::Append(value));
        self
    }

    pub fn copy_to(mut self, to: impl Into<String>) -> Self {
        self.operations.push(JournalOperation::Copy { to: to.into() });
        self
    }

    pub fn delete(mut self) -> Self {
        self.operations.push(JournalOperation::Delete);
        self
    }

    pub fn journal_name(&self) -> &str {
        &self.journal_name
    }

    pub fn operations(&self) -> &[JournalOperation] {
        &self.operations
    }

    pub fn into_parts(self) -> (String, Vec<JournalOperation>) {
        (self.journal_name, self.operations)
    }
}

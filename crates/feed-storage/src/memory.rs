//! In-memory storage backends for testing and embedding.
//!
//! Both backends keep their data in a `BTreeMap` behind a `RwLock` and fire
//! callbacks either inline or from a short-lived thread. They also carry
//! fault switches so callers can exercise failing reads, failing commits,
//! and callbacks that never fire.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::thread;

use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::mutation::{CommitResult, ContentMutation, ContentOperation, JournalMutation, JournalOperation};
use crate::traits::{Callback, ContentStorage, JournalStorage};

/// Fault switches and callback delivery shared by both backends.
#[derive(Debug, Default)]
struct Faults {
    fail_reads: AtomicBool,
    fail_commits: AtomicBool,
    drop_callbacks: AtomicBool,
    threaded_callbacks: AtomicBool,
    commits: AtomicUsize,
}

impl Faults {
    fn deliver<T: Send + 'static>(&self, callback: Callback<T>, value: T) {
        if self.drop_callbacks.load(Ordering::SeqCst) {
            debug!("dropping storage callback");
            return;
        }
        if self.threaded_callbacks.load(Ordering::SeqCst) {
            thread::spawn(move || callback(value));
        } else {
            callback(value);
        }
    }

    fn read_error(&self) -> Option<StorageError> {
        self.fail_reads
            .load(Ordering::SeqCst)
            .then(|| StorageError::Backend("injected read failure".into()))
    }

    fn commit_blocked(&self) -> bool {
        self.fail_commits.load(Ordering::SeqCst)
    }
}

macro_rules! fault_switches {
    ($ty:ty) => {
        impl $ty {
            /// Make every subsequent read report a backend failure.
            pub fn set_fail_reads(&self, fail: bool) {
                self.faults.fail_reads.store(fail, Ordering::SeqCst);
            }

            /// Make every subsequent commit report [`CommitResult::Failure`].
            pub fn set_fail_commits(&self, fail: bool) {
                self.faults.fail_commits.store(fail, Ordering::SeqCst);
            }

            /// Drop callbacks instead of firing them.
            pub fn set_drop_callbacks(&self, drop: bool) {
                self.faults.drop_callbacks.store(drop, Ordering::SeqCst);
            }

            /// Fire callbacks from a spawned thread instead of inline.
            pub fn set_threaded_callbacks(&self, threaded: bool) {
                self.faults.threaded_callbacks.store(threaded, Ordering::SeqCst);
            }

            /// Number of commits applied successfully so far.
            pub fn commit_count(&self) -> usize {
                self.faults.commits.load(Ordering::SeqCst)
            }
        }
    };
}

/// In-memory [`ContentStorage`].
#[derive(Debug, Default)]
pub struct InMemoryContentStorage {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    faults: Faults,
}

fault_switches!(InMemoryContentStorage);

impl InMemoryContentStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write raw bytes directly, bypassing the commit path.
    pub fn insert_raw(&self, key: impl Into<String>, value: Vec<u8>) {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(key.into(), value);
    }

    /// Read raw bytes directly, bypassing the callback path.
    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().expect("lock poisoned").get(key).cloned()
    }

    /// Return a sorted list of every key in the store.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    fn apply(&self, mutation: ContentMutation) -> CommitResult {
        if self.faults.commit_blocked() {
            warn!(ops = mutation.len(), "content commit rejected by fault switch");
            return CommitResult::Failure;
        }
        let Ok(mut entries) = self.entries.write() else {
            return CommitResult::Failure;
        };
        let ops = mutation.len();
        for operation in mutation.into_operations() {
            match operation {
                ContentOperation::Upsert { key, value } => {
                    entries.insert(key, value);
                }
                ContentOperation::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }
        self.faults.commits.fetch_add(1, Ordering::SeqCst);
        debug!(ops, "content commit applied");
        CommitResult::Success
    }
}

impl ContentStorage for InMemoryContentStorage {
    fn get(&self, keys: Vec<String>, callback: Callback<StorageResult<HashMap<String, Vec<u8>>>>) {
        let result: StorageResult<HashMap<String, Vec<u8>>> = match self.faults.read_error() {
            Some(err) => Err(err),
            None => self
                .entries
                .read()
                .map_err(|e| StorageError::Backend(format!("lock poisoned: {e}")))
                .map(|entries| {
                    keys.into_iter()
                        .filter_map(|key| entries.get(&key).cloned().map(|value| (key, value)))
                        .collect()
                }),
        };
        self.faults.deliver(callback, result);
    }

    fn get_all(&self, prefix: String, callback: Callback<StorageResult<HashMap<String, Vec<u8>>>>) {
        let result: StorageResult<HashMap<String, Vec<u8>>> = match self.faults.read_error() {
            Some(err) => Err(err),
            None => self
                .entries
                .read()
                .map_err(|e| StorageError::Backend(format!("lock poisoned: {e}")))
                .map(|entries| {
                    entries
                        .range(prefix.clone()..)
                        .take_while(|(key, _)| key.starts_with(&prefix))
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect()
                }),
        };
        self.faults.deliver(callback, result);
    }

    fn commit(&self, mutation: ContentMutation, callback: Callback<CommitResult>) {
        let result = self.apply(mutation);
        self.faults.deliver(callback, result);
    }
}

/// In-memory [`JournalStorage`].
#[derive(Debug, Default)]
pub struct InMemoryJournalStorage {
    journals: RwLock<BTreeMap<String, Vec<Vec<u8>>>>,
    faults: Faults,
}

fault_switches!(InMemoryJournalStorage);

impl InMemoryJournalStorage {
    /// Create a new storage with no journals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes directly, bypassing the commit path.
    pub fn append_raw(&self, journal_name: impl Into<String>, value: Vec<u8>) {
        self.journals
            .write()
            .expect("lock poisoned")
            .entry(journal_name.into())
            .or_default()
            .push(value);
    }

    /// Read a journal directly, bypassing the callback path.
    pub fn entries(&self, journal_name: &str) -> Option<Vec<Vec<u8>>> {
        self.journals
            .read()
            .expect("lock poisoned")
            .get(journal_name)
            .cloned()
    }

    /// Returns `true` if the named journal exists.
    pub fn contains(&self, journal_name: &str) -> bool {
        self.journals
            .read()
            .expect("lock poisoned")
            .contains_key(journal_name)
    }

    fn apply(&self, mutation: JournalMutation) -> CommitResult {
        if self.faults.commit_blocked() {
            warn!(journal = %mutation.journal_name(), "journal commit rejected by fault switch");
            return CommitResult::Failure;
        }
        let Ok(mut journals) = self.journals.write() else {
            return CommitResult::Failure;
        };
        let (name, operations) = mutation.into_parts();

        // Stage against a working copy so the batch lands all at once.
        let mut working = journals.get(&name).cloned();
        let mut copies = Vec::new();
        for operation in operations {
            match operation {
                JournalOperation::Append(value) => {
                    working.get_or_insert_with(Vec::new).push(value);
                }
                JournalOperation::Copy { to } => {
                    copies.push((to, working.clone().unwrap_or_default()));
                }
                JournalOperation::Delete => working = None,
            }
        }

        for (to, contents) in copies {
            journals.insert(to, contents);
        }
        match working {
            Some(contents) => {
                journals.insert(name.clone(), contents);
            }
            None => {
                journals.remove(&name);
            }
        }
        self.faults.commits.fetch_add(1, Ordering::SeqCst);
        debug!(journal = %name, "journal commit applied");
        CommitResult::Success
    }
}

impl JournalStorage for InMemoryJournalStorage {
    fn read(&self, journal_name: String, callback: Callback<StorageResult<Vec<Vec<u8>>>>) {
        let result = match self.faults.read_error() {
            Some(err) => Err(err),
            None => self
                .journals
                .read()
                .map_err(|e| StorageError::Backend(format!("lock poisoned: {e}")))
                .map(|journals| journals.get(&journal_name).cloned().unwrap_or_default()),
        };
        self.faults.deliver(callback, result);
    }

    fn get_all_journals(&self, callback: Callback<StorageResult<Vec<String>>>) {
        let result: StorageResult<Vec<String>> = match self.faults.read_error() {
            Some(err) => Err(err),
            None => self
                .journals
                .read()
                .map_err(|e| StorageError::Backend(format!("lock poisoned: {e}")))
                .map(|journals| journals.keys().cloned().collect()),
        };
        self.faults.deliver(callback, result);
    }

    fn commit(&self, mutation: JournalMutation, callback: Callback<CommitResult>) {
        let result = self.apply(mutation);
        self.faults.deliver(callback, result);
    }
}

//! Blocking adapter over the callback-based storage contracts.
//!
//! Every storage call goes through [`wait_for`]: the backend receives a
//! callback that fills a one-slot channel, and the calling thread blocks on
//! the other end. Commits are additionally routed through the
//! [`MainThreadRunner`] while the wait stays on the caller's thread. A
//! commit whose wait times out before it reaches storage is withdrawn.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{bounded, RecvTimeoutError};
use feed_storage::{
    Callback, CommitResult, ContentMutation, ContentStorage, JournalMutation, JournalStorage,
    MainThreadRunner,
};
use tracing::{debug, warn};

use crate::error::{FeedStoreError, FeedStoreResult};

/// Block until `start`'s callback fires exactly once.
pub(crate) fn wait_for<T, F>(
    operation: &'static str,
    timeout: Option<Duration>,
    start: F,
) -> FeedStoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(Callback<T>),
{
    let (sender, receiver) = bounded::<T>(1);
    start(Box::new(move |value| {
        // The receiver is gone only if the waiter already timed out.
        // Commits guard against that case in `commit_on_main_thread`.
        let _ = sender.send(value);
    }));

    let outcome = match timeout {
        Some(limit) => receiver.recv_timeout(limit).map_err(|e| match e {
            RecvTimeoutError::Timeout => FeedStoreError::TimedOut {
                operation,
                timeout: limit,
            },
            RecvTimeoutError::Disconnected => FeedStoreError::Interrupted { operation },
        }),
        None => receiver
            .recv()
            .map_err(|_| FeedStoreError::Interrupted { operation }),
    };
    if let Err(e) = &outcome {
        warn!(operation, error = %e, "storage callback did not complete");
    }
    outcome
}

/// Shared handles to both storages plus the runner commits go through.
#[derive(Clone)]
pub(crate) struct StorageBridge {
    content: Arc<dyn ContentStorage>,
    journal: Arc<dyn JournalStorage>,
    main_thread: Arc<dyn MainThreadRunner>,
    timeout: Option<Duration>,
    enforce_off_main_thread: bool,
}

impl StorageBridge {
    pub(crate) fn new(
        content: Arc<dyn ContentStorage>,
        journal: Arc<dyn JournalStorage>,
        main_thread: Arc<dyn MainThreadRunner>,
        timeout: Option<Duration>,
        enforce_off_main_thread: bool,
    ) -> Self {
        Self {
            content,
            journal,
            main_thread,
            timeout,
            enforce_off_main_thread,
        }
    }

    /// Fail fast instead of blocking the thread that runs the callbacks.
    pub(crate) fn ensure_off_main_thread(&self, operation: &'static str) -> FeedStoreResult<()> {
        if self.enforce_off_main_thread && self.main_thread.is_main_thread() {
            warn!(operation, "blocking store call on the main thread");
            return Err(FeedStoreError::OnMainThread { operation });
        }
        Ok(())
    }

    pub(crate) fn get_content(
        &self,
        operation: &'static str,
        keys: Vec<String>,
    ) -> FeedStoreResult<HashMap<String, Vec<u8>>> {
        self.ensure_off_main_thread(operation)?;
        let result = wait_for(operation, self.timeout, |callback| {
            self.content.get(keys, callback)
        })?;
        Ok(result?)
    }

    pub(crate) fn get_all_content(
        &self,
        operation: &'static str,
        prefix: &str,
    ) -> FeedStoreResult<HashMap<String, Vec<u8>>> {
        self.ensure_off_main_thread(operation)?;
        let result = wait_for(operation, self.timeout, |callback| {
            self.content.get_all(prefix.to_string(), callback)
        })?;
        Ok(result?)
    }

    pub(crate) fn read_journal(
        &self,
        operation: &'static str,
        journal_name: &str,
    ) -> FeedStoreResult<Vec<Vec<u8>>> {
        self.ensure_off_main_thread(operation)?;
        let result = wait_for(operation, self.timeout, |callback| {
            self.journal.read(journal_name.to_string(), callback)
        })?;
        Ok(result?)
    }

    pub(crate) fn list_journals(&self, operation: &'static str) -> FeedStoreResult<Vec<String>> {
        self.ensure_off_main_thread(operation)?;
        let result = wait_for(operation, self.timeout, |callback| {
            self.journal.get_all_journals(callback)
        })?;
        Ok(result?)
    }

    pub(crate) fn commit_content(
        &self,
        operation: &'static str,
        mutation: ContentMutation,
    ) -> FeedStoreResult<()> {
        let content = Arc::clone(&self.content);
        self.commit_on_main_thread(operation, move |callback| content.commit(mutation, callback))
    }

    pub(crate) fn commit_journal(
        &self,
        operation: &'static str,
        mutation: JournalMutation,
    ) -> FeedStoreResult<()> {
        let journal = Arc::clone(&self.journal);
        self.commit_on_main_thread(operation, move |callback| journal.commit(mutation, callback))
    }

    /// Queue `commit` on the main thread and wait for its result.
    ///
    /// The waiter and the queued task race to claim the commit. If the wait
    /// times out before the task starts, the task finds the claim taken and
    /// skips storage, so the batch is never applied and the caller gets
    /// `TimedOut`. If the task started first, the outcome is unknown and the
    /// caller gets `CommitUnresolved`.
    fn commit_on_main_thread<F>(&self, operation: &'static str, commit: F) -> FeedStoreResult<()>
    where
        F: FnOnce(Callback<CommitResult>) + Send + 'static,
    {
        self.ensure_off_main_thread(operation)?;
        let claimed = Arc::new(AtomicBool::new(false));
        let task_claim = Arc::clone(&claimed);
        let outcome = wait_for(operation, self.timeout, |callback| {
            self.main_thread.execute(
                operation,
                Box::new(move || {
                    if task_claim.swap(true, Ordering::SeqCst) {
                        debug!(operation, "commit withdrawn by its waiter; skipping storage");
                        return;
                    }
                    commit(callback);
                }),
            )
        });
        match outcome {
            Ok(result) => check_commit(operation, result),
            Err(FeedStoreError::TimedOut { operation, timeout }) => {
                if claimed.swap(true, Ordering::SeqCst) {
                    warn!(operation, ?timeout, "commit started before the wait timed out; outcome unknown");
                    Err(FeedStoreError::CommitUnresolved { operation, timeout })
                } else {
                    Err(FeedStoreError::TimedOut { operation, timeout })
                }
            }
            Err(e) => Err(e),
        }
    }
}

fn check_commit(operation: &'static str, result: CommitResult) -> FeedStoreResult<()> {
    if result.is_success() {
        Ok(())
    } else {
        warn!(operation, "storage rejected commit");
        Err(FeedStoreError::CommitFailed { operation })
    }
}

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{FeedStoreError, FeedStoreResult};

/// Configuration for the [`FeedStore`](crate::FeedStore).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeedStoreConfig {
    /// Upper bound on how long a call waits for a storage callback.
    ///
    /// `None` waits indefinitely: a backend that never answers hangs the
    /// calling thread.
    pub wait_timeout_ms: Option<u64>,
    /// Reject blocking calls made on the main thread instead of
    /// deadlocking on them.
    pub enforce_off_main_thread: bool,
    /// Leave the per-action-type journals out of `get_all_sessions`.
    pub exclude_action_journals_from_sessions: bool,
}

impl Default for FeedStoreConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: None,
            enforce_off_main_thread: true,
            exclude_action_journals_from_sessions: true,
        }
    }
}

impl FeedStoreConfig {
    /// The wait timeout as a [`Duration`].
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }

    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(raw: &str) -> FeedStoreResult<Self> {
        toml::from_str(raw).map_err(|e| FeedStoreError::Config(e.to_string()))
    }

    /// Load a TOML configuration file.
    pub fn load(path: &Path) -> FeedStoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

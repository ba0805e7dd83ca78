//! Population sweep over content storage.
//!
//! A [`ContentGc`] is built by the store but does nothing until
//! [`ContentGc::run`] is called. One run walks these phases in order:
//!
//! ```text
//! ComputePopulation -> SubtractAccessible -> SubtractReserved
//!     -> FilterPrefixed -> Delete
//! ```
//!
//! Nothing persists between runs. The run never returns an error: failures
//! are logged and reported in the [`GcReport`].

use std::collections::HashSet;

use feed_storage::ContentMutation;
use feed_types::ContentKey;
use tracing::{debug, info, warn};

use crate::bridge::StorageBridge;
use crate::error::FeedStoreResult;

pub(crate) type AccessibleSupplier = Box<dyn FnOnce() -> FeedStoreResult<HashSet<String>> + Send>;

/// How a GC run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GcOutcome {
    /// Every collectable key was deleted.
    Completed,
    /// The population held nothing collectable, so nothing was committed.
    NothingToDelete,
    /// Listing content storage failed; nothing was deleted.
    PopulationUnavailable,
    /// Computing the accessible set failed; nothing was deleted.
    AccessibleUnavailable,
    /// The delete commit failed; the dead content remains.
    DeleteFailed,
}

/// Counts gathered by one GC run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GcReport {
    /// Keys in content storage when the run started.
    pub population: usize,
    /// Keys skipped because of their namespace.
    pub exempt: usize,
    /// Plain content keys kept because they are accessible or reserved.
    pub retained: usize,
    /// Keys removed (zero unless the outcome is `Completed`).
    pub deleted: usize,
    pub outcome: GcOutcome,
}

impl GcReport {
    fn aborted(outcome: GcOutcome, population: usize) -> Self {
        Self {
            population,
            exempt: 0,
            retained: 0,
            deleted: 0,
            outcome,
        }
    }
}

/// Deferred garbage collection of unreferenced content.
pub struct ContentGc {
    bridge: StorageBridge,
    reserved: HashSet<String>,
    accessible: AccessibleSupplier,
}

impl ContentGc {
    pub(crate) fn new(
        bridge: StorageBridge,
        reserved: HashSet<String>,
        accessible: AccessibleSupplier,
    ) -> Self {
        Self {
            bridge,
            reserved,
            accessible,
        }
    }

    /// Run the sweep. Blocks until the delete commit completes.
    pub fn run(self) -> GcReport {
        debug!(phase = "compute_population", "content gc");
        let population = match self.bridge.get_all_content("content_gc", "") {
            Ok(entries) => entries.into_keys().collect::<Vec<_>>(),
            Err(e) => {
                warn!(error = %e, "content gc could not list content storage");
                return GcReport::aborted(GcOutcome::PopulationUnavailable, 0);
            }
        };
        let population_size = population.len();

        debug!(phase = "subtract_accessible", population = population_size, "content gc");
        let accessible = match (self.accessible)() {
            Ok(accessible) => accessible,
            Err(e) => {
                warn!(error = %e, "content gc could not compute accessible content");
                return GcReport::aborted(GcOutcome::AccessibleUnavailable, population_size);
            }
        };

        let sweep = Sweep::partition(population, &accessible, &self.reserved);
        let mut report = GcReport {
            population: population_size,
            exempt: sweep.exempt,
            retained: sweep.retained,
            deleted: 0,
            outcome: GcOutcome::NothingToDelete,
        };
        if sweep.collectable.is_empty() {
            debug!(population = population_size, "content gc found nothing to delete");
            return report;
        }

        debug!(phase = "delete", count = sweep.collectable.len(), "content gc");
        let count = sweep.collectable.len();
        let mutation = sweep
            .collectable
            .into_iter()
            .fold(ContentMutation::new(), |mutation, key| mutation.delete(key));
        match self.bridge.commit_content("content_gc", mutation) {
            Ok(()) => {
                report.deleted = count;
                report.outcome = GcOutcome::Completed;
                info!(
                    population = population_size,
                    deleted = count,
                    exempt = report.exempt,
                    retained = report.retained,
                    "content gc completed"
                );
            }
            Err(e) => {
                report.outcome = GcOutcome::DeleteFailed;
                warn!(count, error = %e, "content gc delete failed; content left in place");
            }
        }
        report
    }
}

impl std::fmt::Debug for ContentGc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentGc")
            .field("reserved", &self.reserved.len())
            .finish()
    }
}

/// The in-memory set algebra of one run.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Sweep {
    /// Sorted keys to delete.
    pub(crate) collectable: Vec<String>,
    pub(crate) exempt: usize,
    pub(crate) retained: usize,
}

impl Sweep {
    pub(crate) fn partition(
        population: impl IntoIterator<Item = String>,
        accessible: &HashSet<String>,
        reserved: &HashSet<String>,
    ) -> Self {
        let mut sweep = Sweep::default();
        for key in population {
            if ContentKey::parse(&key).is_gc_exempt() {
                sweep.exempt += 1;
            } else if accessible.contains(&key) || reserved.contains(&key) {
                sweep.retained += 1;
            } else {
                sweep.collectable.push(key);
            }
        }
        sweep.collectable.sort();
        sweep
    }
}

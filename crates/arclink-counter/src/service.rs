//! The counter update entry point used by the document service.

use std::sync::Arc;

use tracing::trace;

use crate::cache::{CounterCache, CounterKind, CounterSnapshot};

/// Records document accesses into the shared [`CounterCache`].
#[derive(Debug, Clone, Default)]
pub struct CounterService {
    cache: Arc<CounterCache>,
}

impl CounterService {
    /// Creates a service over a fresh cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service over a shared cache.
    #[must_use]
    pub fn with_cache(cache: Arc<CounterCache>) -> Self {
        Self { cache }
    }

    /// Returns the underlying cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<CounterCache> {
        &self.cache
    }

    /// Adds `v` to one counter field of a repository.
    ///
    /// Zero and negative values never touch the stored counters; the call
    /// is a silent no-op.
    pub fn update_counter(&self, cont_rep: &str, kind: CounterKind, v: i64) {
        if v <= 0 {
            return;
        }
        trace!(cont_rep, ?kind, v, "counter update");
        self.cache.get_or_create(cont_rep).add(kind, v.unsigned_abs());
    }

    /// Reads the current values for a repository without resetting them.
    #[must_use]
    pub fn snapshot(&self, cont_rep: &str) -> Option<CounterSnapshot> {
        self.cache.get(cont_rep).map(|c| c.snapshot())
    }
}

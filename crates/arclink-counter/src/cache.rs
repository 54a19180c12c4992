//! The in-memory counter cache.
//!
//! One [`ArchiveCounter`] per content repository, four lock-free fields
//! each. The cache supports two operations: get-or-create for the hot
//! increment path, and an atomic entry swap used by the flusher. The swap
//! replaces the map entry with a fresh zero counter and hands the old one
//! back, so every increment that completed before the swap is captured in
//! exactly one persisted snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// The kinds of counted accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    /// Document or component creations.
    Create,
    /// Deletions.
    Delete,
    /// Updates and appends.
    Update,
    /// Reads (get, docGet, info, search).
    View,
}

/// Access counters for one content repository.
#[derive(Debug, Default)]
pub struct ArchiveCounter {
    create: AtomicU64,
    delete: AtomicU64,
    update: AtomicU64,
    view: AtomicU64,
}

impl ArchiveCounter {
    /// Creates a zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `v` to the field selected by `kind`.
    pub fn add(&self, kind: CounterKind, v: u64) {
        self.field(kind).fetch_add(v, Ordering::Relaxed);
    }

    /// Returns the current value of one field.
    #[must_use]
    pub fn get(&self, kind: CounterKind) -> u64 {
        self.field(kind).load(Ordering::Relaxed)
    }

    /// Returns `true` when every field is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.create.load(Ordering::Relaxed) == 0
            && self.delete.load(Ordering::Relaxed) == 0
            && self.update.load(Ordering::Relaxed) == 0
            && self.view.load(Ordering::Relaxed) == 0
    }

    /// Reads all four fields into an immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            create: self.create.load(Ordering::Relaxed),
            delete: self.delete.load(Ordering::Relaxed),
            update: self.update.load(Ordering::Relaxed),
            view: self.view.load(Ordering::Relaxed),
        }
    }

    fn field(&self, kind: CounterKind) -> &AtomicU64 {
        match kind {
            CounterKind::Create => &self.create,
            CounterKind::Delete => &self.delete,
            CounterKind::Update => &self.update,
            CounterKind::View => &self.view,
        }
    }
}

/// A point-in-time copy of one repository's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Creations since the last flush.
    pub create: u64,
    /// Deletions since the last flush.
    pub delete: u64,
    /// Updates since the last flush.
    pub update: u64,
    /// Reads since the last flush.
    pub view: u64,
}

impl CounterSnapshot {
    /// Returns `true` when every field is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.create == 0 && self.delete == 0 && self.update == 0 && self.view == 0
    }
}

/// Concurrent map from repository name to its live counter.
#[derive(Debug, Default)]
pub struct CounterCache {
    counters: DashMap<String, Arc<ArchiveCounter>>,
}

impl CounterCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter for a repository, creating it on first access.
    #[must_use]
    pub fn get_or_create(&self, cont_rep: &str) -> Arc<ArchiveCounter> {
        if let Some(counter) = self.counters.get(cont_rep) {
            return Arc::clone(counter.value());
        }
        Arc::clone(
            self.counters
                .entry(cont_rep.to_string())
                .or_default()
                .value(),
        )
    }

    /// Returns the counter for a repository, when one exists.
    #[must_use]
    pub fn get(&self, cont_rep: &str) -> Option<Arc<ArchiveCounter>> {
        self.counters.get(cont_rep).map(|c| Arc::clone(c.value()))
    }

    /// Lists the repositories with a counter entry.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.counters.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of counter entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the cache has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Atomically replaces a repository's counter with a fresh zero one
    /// and returns the snapshot of the replaced counter.
    ///
    /// Returns `None` for a missing entry or one with all fields zero;
    /// zero counters are left in place untouched.
    #[must_use]
    pub fn take(&self, cont_rep: &str) -> Option<CounterSnapshot> {
        {
            let current = self.counters.get(cont_rep)?;
            if current.is_zero() {
                return None;
            }
        }
        let old = self
            .counters
            .insert(cont_rep.to_string(), Arc::new(ArchiveCounter::new()))?;
        let snapshot = old.snapshot();
        if snapshot.is_zero() {
            return None;
        }
        Some(snapshot)
    }
}

//! Per-repository access counters for arclink.
//!
//! Reads, creations, updates and deletions are tallied in a lock-free
//! in-memory cache and written back to the storage backend on a schedule:
//!
//! - [`CounterCache`] / [`ArchiveCounter`] - one four-field atomic counter
//!   per content repository
//! - [`CounterService`] - the increment entry point used by the document
//!   service
//! - [`CounterFlusher`] - the interval loop that swaps non-zero counters
//!   for fresh ones and persists the retired values through a
//!   [`CounterStore`]

pub mod cache;
pub mod flusher;
pub mod service;

pub use cache::{ArchiveCounter, CounterCache, CounterKind, CounterSnapshot};
pub use flusher::{CounterFlusher, CounterStore, DEFAULT_FLUSH_INTERVAL};
pub use service::CounterService;

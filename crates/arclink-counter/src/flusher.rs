//! Scheduled counter persistence.
//!
//! The flusher runs an interval loop on the runtime (default one hour).
//! Each round it snapshots the repository keys, swaps every non-zero
//! counter for a fresh zero one, and hands the retired values to the
//! backing store. A persistence failure is logged and the round continues
//! with the next repository; the loop itself never exits on error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use arclink_core::ArchiveResult;

use crate::cache::{CounterCache, CounterSnapshot};

/// Default interval between flush rounds.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(3600);

/// The persistence backend counters are written to.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Whether the backend is ready to accept writes.
    async fn is_initialized(&self) -> bool;

    /// Persists one repository's accumulated counters.
    async fn save_counters(&self, cont_rep: &str, snapshot: CounterSnapshot)
        -> ArchiveResult<()>;
}

/// Periodically writes accumulated counters back to the store.
pub struct CounterFlusher {
    cache: Arc<CounterCache>,
    store: Arc<dyn CounterStore>,
    interval: Duration,
    running: AtomicBool,
    shutdown_tx: RwLock<Option<mpsc::Sender<()>>>,
    loop_handle: RwLock<Option<JoinHandle<()>>>,
}

impl CounterFlusher {
    /// Creates a flusher with the default interval.
    #[must_use]
    pub fn new(cache: Arc<CounterCache>, store: Arc<dyn CounterStore>) -> Self {
        Self::with_interval(cache, store, DEFAULT_FLUSH_INTERVAL)
    }

    /// Creates a flusher with a custom interval.
    #[must_use]
    pub fn with_interval(
        cache: Arc<CounterCache>,
        store: Arc<dyn CounterStore>,
        interval: Duration,
    ) -> Self {
        Self {
            cache,
            store,
            interval,
            running: AtomicBool::new(false),
            shutdown_tx: RwLock::new(None),
            loop_handle: RwLock::new(None),
        }
    }

    /// Whether the interval loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts the interval loop. Starting an already running flusher is a
    /// no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.write() = Some(shutdown_tx);

        let flusher = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(flusher.interval);
            // The first tick fires immediately; skip it so a fresh start
            // does not flush an empty cache.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        flusher.flush().await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("counter flusher received shutdown signal");
                        break;
                    }
                }
            }
        });

        *self.loop_handle.write() = Some(handle);
        info!(interval_secs = self.interval.as_secs(), "counter flusher started");
    }

    /// Stops the interval loop and runs one final flush. Stopping an
    /// already stopped flusher is a no-op.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        // Take the sender out before awaiting so the lock guard is not
        // held across the send.
        let tx = self.shutdown_tx.write().take();
        if let Some(tx) = tx {
            let _ = tx.send(()).await;
        }
        let handle = self.loop_handle.write().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.flush().await;
        info!("counter flusher stopped");
    }

    /// Runs one flush round.
    ///
    /// Skips entirely when the store is not initialized. Otherwise every
    /// repository with a non-zero counter is swapped for a zero one and
    /// the retired snapshot persisted; a failed write is logged and the
    /// snapshot dropped.
    pub async fn flush(&self) {
        if !self.store.is_initialized().await {
            warn!("counter flush skipped, store not initialized");
            return;
        }

        for cont_rep in self.cache.keys() {
            let Some(snapshot) = self.cache.take(&cont_rep) else {
                continue;
            };
            match self.store.save_counters(&cont_rep, snapshot).await {
                Ok(()) => {
                    debug!(
                        cont_rep,
                        create = snapshot.create,
                        delete = snapshot.delete,
                        update = snapshot.update,
                        view = snapshot.view,
                        "counters persisted"
                    );
                }
                Err(err) => {
                    error!(cont_rep, error = %err, "failed to persist counters");
                }
            }
        }
    }
}

impl std::fmt::Debug for CounterFlusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterFlusher")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use arclink_core::ArchiveError;

    use crate::cache::CounterKind;

    #[derive(Default)]
    struct RecordingStore {
        initialized: bool,
        fail: bool,
        saved: Mutex<Vec<(String, CounterSnapshot)>>,
    }

    #[async_trait]
    impl CounterStore for RecordingStore {
        async fn is_initialized(&self) -> bool {
            self.initialized
        }

        async fn save_counters(
            &self,
            cont_rep: &str,
            snapshot: CounterSnapshot,
        ) -> ArchiveResult<()> {
            if self.fail {
                return Err(ArchiveError::internal("backend down"));
            }
            self.saved.lock().push((cont_rep.to_string(), snapshot));
            Ok(())
        }
    }

    fn flusher(store: Arc<RecordingStore>) -> (Arc<CounterCache>, CounterFlusher) {
        let cache = Arc::new(CounterCache::new());
        let f = CounterFlusher::with_interval(
            Arc::clone(&cache),
            store,
            Duration::from_secs(3600),
        );
        (cache, f)
    }

    #[tokio::test]
    async fn test_flush_persists_and_resets_non_zero_counters() {
        let store = Arc::new(RecordingStore {
            initialized: true,
            ..RecordingStore::default()
        });
        let (cache, flusher) = flusher(Arc::clone(&store));

        cache.get_or_create("A1").add(CounterKind::View, 3);
        let _ = cache.get_or_create("A2"); // stays zero

        flusher.flush().await;

        let saved = store.saved.lock();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "A1");
        assert_eq!(saved[0].1.view, 3);
        drop(saved);

        assert!(cache.get("A1").unwrap().is_zero());

        // Nothing left to persist.
        flusher.flush().await;
        assert_eq!(store.saved.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_flush_is_a_no_op_when_store_uninitialized() {
        let store = Arc::new(RecordingStore::default());
        let (cache, flusher) = flusher(Arc::clone(&store));
        cache.get_or_create("A1").add(CounterKind::Create, 1);

        flusher.flush().await;

        assert!(store.saved.lock().is_empty());
        // Counters survive for the next round.
        assert_eq!(cache.get("A1").unwrap().get(CounterKind::Create), 1);
    }

    #[tokio::test]
    async fn test_failed_save_does_not_abort_the_round() {
        let store = Arc::new(RecordingStore {
            initialized: true,
            fail: true,
            ..RecordingStore::default()
        });
        let (cache, flusher) = flusher(Arc::clone(&store));
        cache.get_or_create("A1").add(CounterKind::Update, 1);
        cache.get_or_create("A2").add(CounterKind::Update, 1);

        flusher.flush().await;
        assert!(store.saved.lock().is_empty());
    }

    #[tokio::test]
    async fn test_start_stop_are_idempotent() {
        let store = Arc::new(RecordingStore {
            initialized: true,
            ..RecordingStore::default()
        });
        let cache = Arc::new(CounterCache::new());
        let flusher = Arc::new(CounterFlusher::with_interval(
            Arc::clone(&cache),
            store,
            Duration::from_secs(3600),
        ));

        flusher.start();
        flusher.start();
        assert!(flusher.is_running());

        flusher.stop().await;
        flusher.stop().await;
        assert!(!flusher.is_running());
    }

    #[tokio::test]
    async fn test_stop_can_be_driven_from_a_spawned_task() {
        let store = Arc::new(RecordingStore {
            initialized: true,
            ..RecordingStore::default()
        });
        let cache = Arc::new(CounterCache::new());
        let flusher = Arc::new(CounterFlusher::with_interval(
            Arc::clone(&cache),
            store,
            Duration::from_secs(3600),
        ));

        flusher.start();
        // stop() must produce a Send future so shutdown can run on a
        // multi-threaded runtime.
        let handle = Arc::clone(&flusher);
        tokio::spawn(async move { handle.stop().await })
            .await
            .unwrap();
        assert!(!flusher.is_running());
    }

    #[tokio::test]
    async fn test_stop_runs_a_final_flush() {
        let store = Arc::new(RecordingStore {
            initialized: true,
            ..RecordingStore::default()
        });
        let cache = Arc::new(CounterCache::new());
        let flusher = Arc::new(CounterFlusher::with_interval(
            Arc::clone(&cache),
            Arc::clone(&store) as Arc<dyn CounterStore>,
            Duration::from_secs(3600),
        ));

        flusher.start();
        cache.get_or_create("A1").add(CounterKind::Delete, 2);
        flusher.stop().await;

        let saved = store.saved.lock();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].1.delete, 2);
    }
}

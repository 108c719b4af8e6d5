//! Import session coordinator
//!
//! Owns the lifecycle of one import: a feed thread delivering bytes and a
//! worker thread running parser, state machine, cache, and batched commits.
//! The caller holds an [`ImportHandle`] and observes the session through its
//! event channel; all per-session resources live on the worker and are
//! released when it returns.

use super::builder::SongBuilder;
use super::cache::{CategoryCache, DEFAULT_CACHE_CAPACITY};
use super::state::{StepOutcome, StreamStateMachine};
use super::{CancelToken, ImportError, ImportStats};
use crate::feed::{self, ByteFeed, FeedMessage};
use crate::parser::IncrementalParser;
use crate::store::SongStore;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Records per intermediate commit
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Caller-visible session notifications.
///
/// `Saved` fires once per commit, intermediate batches included, so an
/// observer can refresh incrementally. Exactly one of `Finished` or `Failed`
/// terminates the stream.
#[derive(Debug)]
pub enum ImportEvent {
    Saved { songs_in_batch: usize },
    Finished(ImportStats),
    Failed(ImportError),
}

/// Configures and launches import sessions against one store
pub struct ImportCoordinator {
    store: Arc<dyn SongStore>,
    batch_size: usize,
    cache_capacity: usize,
    cache_enabled: bool,
}

impl ImportCoordinator {
    pub fn new(store: Arc<dyn SongStore>) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_enabled: true,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Launch the session: one thread delivers the feed, one runs the
    /// pipeline. Returns immediately; progress arrives on the handle.
    pub fn start<F: ByteFeed>(self, feed: F) -> ImportHandle {
        let (sink, chunk_rx) = feed::channel();
        let (event_tx, event_rx) = std::sync::mpsc::channel();
        let cancel = CancelToken::new();

        let worker = {
            let store = self.store.clone();
            let cancel = cancel.clone();
            let worker_tx = event_tx.clone();
            let batch_size = self.batch_size;
            let cache_capacity = self.cache_capacity;
            let cache_enabled = self.cache_enabled;
            spawn_named("chartfeed-import", &event_tx, move || {
                let session = Session {
                    store,
                    batch_size,
                    cache_capacity,
                    cache_enabled,
                    cancel,
                };
                match session.run(chunk_rx, &worker_tx) {
                    Ok(stats) => {
                        info!(
                            songs = stats.songs_imported,
                            commits = stats.commits,
                            elapsed = format!("{:.2}s", stats.elapsed_seconds),
                            "import finished"
                        );
                        let _ = worker_tx.send(ImportEvent::Finished(stats));
                    }
                    Err(e) => {
                        warn!(error = %e, "import failed");
                        let _ = worker_tx.send(ImportEvent::Failed(e));
                    }
                }
            })
        };

        let feeder = spawn_named("chartfeed-feed", &event_tx, move || feed.deliver(sink));

        ImportHandle {
            events: event_rx,
            cancel,
            worker,
            feeder,
        }
    }
}

/// Spawn a named thread; a spawn failure surfaces as a failed session
/// instead of panicking.
fn spawn_named(
    name: &str,
    event_tx: &Sender<ImportEvent>,
    body: impl FnOnce() + Send + 'static,
) -> Option<JoinHandle<()>> {
    match thread::Builder::new().name(name.to_string()).spawn(body) {
        Ok(handle) => Some(handle),
        Err(e) => {
            let _ = event_tx.send(ImportEvent::Failed(ImportError::Network(format!(
                "failed to spawn {name} thread: {e}"
            ))));
            None
        }
    }
}

/// Per-session state for the worker thread
struct Session {
    store: Arc<dyn SongStore>,
    batch_size: usize,
    cache_capacity: usize,
    cache_enabled: bool,
    cancel: CancelToken,
}

impl Session {
    fn run(
        self,
        chunk_rx: Receiver<FeedMessage>,
        event_tx: &Sender<ImportEvent>,
    ) -> Result<ImportStats, ImportError> {
        let started = Instant::now();
        let mut parser = IncrementalParser::new(chunk_rx);
        let cache = CategoryCache::new(self.store.clone(), self.cache_capacity, self.cache_enabled);
        let builder = SongBuilder::new(self.store.clone());
        let mut machine = StreamStateMachine::new(builder, cache);

        let mut in_batch = 0usize;
        let mut commits = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ImportError::Cancelled);
            }
            let Some(event) = parser.next_event()? else {
                break;
            };
            if machine.handle(event)? == StepOutcome::SongCompleted {
                in_batch += 1;
                if in_batch == self.batch_size {
                    self.store.commit()?;
                    commits += 1;
                    debug!(songs = in_batch, "batch committed");
                    let _ = event_tx.send(ImportEvent::Saved {
                        songs_in_batch: in_batch,
                    });
                    in_batch = 0;
                }
            }
        }

        // One final commit after feed completion, covering the partial batch
        self.store.commit()?;
        commits += 1;
        let _ = event_tx.send(ImportEvent::Saved {
            songs_in_batch: in_batch,
        });

        let metrics = machine.cache().metrics();
        let mut stats = ImportStats {
            songs_imported: machine.builder().completed(),
            commits,
            cache_hits: metrics.hits,
            cache_misses: metrics.misses,
            lookup_seconds: metrics.total_lookup_time().as_secs_f64(),
            elapsed_seconds: started.elapsed().as_secs_f64(),
            songs_per_second: 0.0,
        };
        stats.update_rate();
        Ok(stats)
    }
}

/// Caller's view of a running import session.
///
/// Dropping the handle detaches the session; it runs to its own terminal
/// state with nobody listening.
pub struct ImportHandle {
    events: Receiver<ImportEvent>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
    feeder: Option<JoinHandle<()>>,
}

impl ImportHandle {
    /// Event stream for this session. Drain it on whatever context the
    /// caller owns; nothing is delivered on the worker's thread.
    pub fn events(&self) -> &Receiver<ImportEvent> {
        &self.events
    }

    /// Token that cancels the session at the next event boundary
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the terminal event, returning the intermediate batch
    /// sizes and the session outcome.
    pub fn wait(mut self) -> (Vec<usize>, Result<ImportStats, ImportError>) {
        let mut saves = Vec::new();
        let mut outcome = Err(ImportError::Network(
            "worker exited without a terminal event".into(),
        ));
        for event in self.events.iter() {
            match event {
                ImportEvent::Saved { songs_in_batch } => saves.push(songs_in_batch),
                ImportEvent::Finished(stats) => {
                    outcome = Ok(stats);
                    break;
                }
                ImportEvent::Failed(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if let Some(feeder) = self.feeder.take() {
            let _ = feeder.join();
        }
        (saves, outcome)
    }
}

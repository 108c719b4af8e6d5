//! Streaming feed import pipeline
//!
//! Turns a byte feed of ranked-chart XML into persisted [`Song`] records.
//! The pipeline is a single background worker: feed chunks arrive over a
//! channel, the incremental parser tokenizes them, a state machine assembles
//! records at element boundaries, categories are deduplicated through a
//! bounded LRU cache, and the store is committed in batches so memory stays
//! flat no matter how long the feed is.
//!
//! ```text
//! ByteFeed ──chunks──▶ IncrementalParser ──events──▶ StreamStateMachine
//!                                                     │           │
//!                                               SongBuilder  CategoryCache
//!                                                     │           │
//!                                                     ▼           ▼
//!                                                   SongStore (batched commits)
//! ```
//!
//! The caller observes the session through [`ImportEvent`]s: one `Saved` per
//! commit, then exactly one terminal `Finished` or `Failed`.
//!
//! [`Song`]: crate::model::Song

mod builder;
mod cache;
mod coordinator;
mod state;

pub use builder::SongBuilder;
pub use cache::{CacheMetrics, CategoryCache};
pub use coordinator::{ImportCoordinator, ImportEvent, ImportHandle};
pub use state::{StepOutcome, StreamStateMachine};

use crate::parser::ParseError;
use crate::store::StoreError;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Why an import session ended short of completion.
///
/// Every variant is terminal: the session aborts on the first error and the
/// caller is notified exactly once. Batches committed before the failure
/// remain persisted.
#[derive(Debug, Clone, Error)]
pub enum ImportError {
    /// Malformed feed bytes; nothing from the in-flight record is committed
    #[error("parse error: {0}")]
    Parse(String),

    /// The feed's transport failed mid-delivery
    #[error("network error: {0}")]
    Network(String),

    /// A store lookup, insert, or commit failed; not retried
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller cancelled the session
    #[error("import cancelled")]
    Cancelled,
}

impl From<ParseError> for ImportError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Syntax(msg) => ImportError::Parse(msg),
            ParseError::Feed(msg) => ImportError::Network(msg),
        }
    }
}

/// Summary of a completed import session
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    /// Songs handed to the store
    pub songs_imported: u64,
    /// Commits performed, including the final one
    pub commits: u64,
    /// Category cache hit count
    pub cache_hits: u64,
    /// Category cache miss count
    pub cache_misses: u64,
    /// Cumulative category lookup time in seconds
    pub lookup_seconds: f64,
    /// Wall-clock session duration in seconds
    pub elapsed_seconds: f64,
    /// Import rate
    pub songs_per_second: f64,
}

impl ImportStats {
    /// Recompute the rate from the current counters
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.songs_per_second = self.songs_imported as f64 / self.elapsed_seconds;
        }
    }
}

/// Cooperative cancellation handle for an import session.
///
/// Cloned freely; cancelling any clone stops the worker at the next event
/// boundary with [`ImportError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

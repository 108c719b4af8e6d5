//! Bounded LRU cache for category entities
//!
//! Category names repeat heavily across a chart feed, so resolving each one
//! against the store would dominate import time. This cache keys store
//! handles by category name and evicts with a minimal LRU scheme: a global
//! access counter is bumped on every lookup and stamped onto the entry
//! touched, so the entry with the smallest stamp is the least recently used.
//! The counter is a `u64` incremented once per lookup; wraparound is
//! unreachable within a session.
//!
//! Entries may hold tentative handles, which die when the store commits.
//! The cache subscribes to the store's persisted notification and purges
//! every tentative entry synchronously when it fires, so no later lookup can
//! observe a dead handle.

use crate::model::CategoryHandle;
use crate::store::{SongStore, StoreError, SubscriptionId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default number of categories kept cached
pub const DEFAULT_CACHE_CAPACITY: usize = 15;

/// Read-only lookup counters, for tuning the cache capacity
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    /// Time spent in lookups that hit
    pub hit_cost: Duration,
    /// Time spent in lookups that missed, store round-trip included
    pub miss_cost: Duration,
}

impl CacheMetrics {
    /// Cumulative time spent resolving categories
    pub fn total_lookup_time(&self) -> Duration {
        self.hit_cost + self.miss_cost
    }

    pub fn average_hit_cost(&self) -> Option<Duration> {
        (self.hits > 0).then(|| self.hit_cost / self.hits as u32)
    }

    pub fn average_miss_cost(&self) -> Option<Duration> {
        (self.misses > 0).then(|| self.miss_cost / self.misses as u32)
    }
}

struct CacheNode {
    handle: CategoryHandle,
    last_access: u64,
}

#[derive(Default)]
struct CacheState {
    // BTreeMap so the eviction scan breaks counter ties deterministically
    // (smallest name wins)
    entries: BTreeMap<String, CacheNode>,
    access_counter: u64,
    metrics: CacheMetrics,
}

/// Bounded name → handle cache in front of the store's category table.
///
/// Private to one import session and torn down with it; `Drop` removes the
/// persisted-notification subscription and logs the session's metrics.
pub struct CategoryCache {
    store: Arc<dyn SongStore>,
    state: Arc<Mutex<CacheState>>,
    capacity: usize,
    enabled: bool,
    subscription: SubscriptionId,
}

impl CategoryCache {
    /// Create a cache over `store`. With `enabled` false every lookup falls
    /// through to the store, which keeps the A/B comparison path alive.
    pub fn new(store: Arc<dyn SongStore>, capacity: usize, enabled: bool) -> Self {
        let state = Arc::new(Mutex::new(CacheState::default()));

        let purge_state = state.clone();
        let subscription = store.subscribe_persisted(Box::new(move |_event| {
            let mut state = purge_state.lock();
            let before = state.entries.len();
            state.entries.retain(|_, node| !node.handle.is_tentative());
            let purged = before - state.entries.len();
            if purged > 0 {
                debug!(purged, "purged tentative cache entries after commit");
            }
        }));

        Self {
            store,
            state,
            capacity,
            enabled,
            subscription,
        }
    }

    /// Resolve a category name to its entity handle.
    ///
    /// Hit: refresh the entry's access stamp and return the cached handle
    /// without touching the store. Miss: look the name up in the store,
    /// creating the entity if it does not exist, then cache the handle
    /// (evicting the least recently used entry at capacity).
    pub fn category_with_name(&self, name: &str) -> Result<CategoryHandle, StoreError> {
        let started = Instant::now();

        if self.enabled {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if let Some(node) = state.entries.get_mut(name) {
                node.last_access = state.access_counter;
                state.access_counter += 1;
                let handle = node.handle;
                state.metrics.hits += 1;
                state.metrics.hit_cost += started.elapsed();
                return Ok(handle);
            }
        }

        // Miss: the store lock must not be reached with the cache locked
        let handle = match self.store.find_category(name)? {
            Some(handle) => handle,
            None => self.store.create_category(name)?,
        };

        let mut guard = self.state.lock();
        let state = &mut *guard;
        if self.enabled {
            if state.entries.len() >= self.capacity {
                let victim = state
                    .entries
                    .iter()
                    .min_by_key(|(_, node)| node.last_access)
                    .map(|(name, _)| name.clone());
                if let Some(victim) = victim {
                    state.entries.remove(&victim);
                }
            }
            let stamp = state.access_counter;
            state.access_counter += 1;
            state.entries.insert(
                name.to_string(),
                CacheNode {
                    handle,
                    last_access: stamp,
                },
            );
        }
        state.metrics.misses += 1;
        state.metrics.miss_cost += started.elapsed();
        Ok(handle)
    }

    /// Whether a name is currently cached
    pub fn contains(&self, name: &str) -> bool {
        self.state.lock().entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.state.lock().metrics.clone()
    }
}

impl Drop for CategoryCache {
    fn drop(&mut self) {
        self.store.unsubscribe_persisted(self.subscription);
        let metrics = self.state.lock().metrics.clone();
        if let Some(cost) = metrics.average_hit_cost() {
            debug!(hits = metrics.hits, avg_cost = ?cost, "cache hit metrics");
        }
        if let Some(cost) = metrics.average_miss_cost() {
            debug!(misses = metrics.misses, avg_cost = ?cost, "cache miss metrics");
        }
    }
}

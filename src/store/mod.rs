//! Narrow interface to the persistent song store
//!
//! The importer treats the store as an external collaborator: it can look up
//! or create category entities, insert completed songs, commit a batch, and
//! subscribe to the persisted notification that fires when a commit promotes
//! tentative handles to permanent ones. Everything else about persistence is
//! someone else's problem.

mod memory;

pub use memory::MemoryStore;

use crate::model::{CategoryHandle, Song};
use thiserror::Error;

/// Errors surfaced by the store boundary.
///
/// Any store error is fatal to the import session: the importer aborts on the
/// first failed lookup, insert, or commit rather than retrying.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("category lookup failed: {0}")]
    Lookup(String),

    #[error("entity creation failed: {0}")]
    Create(String),

    #[error("song insert failed: {0}")]
    Insert(String),

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("dangling handle: {0:?}")]
    DanglingHandle(CategoryHandle),
}

/// Identifier for a registered persisted-notification observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Payload of the persisted notification: which tentative handles a commit
/// promoted, and to what.
#[derive(Debug, Clone)]
pub struct PersistedEvent {
    pub promoted: Vec<(CategoryHandle, CategoryHandle)>,
}

/// Observer callback for the persisted notification. Invoked synchronously
/// during `commit`, on the committing thread, before `commit` returns.
pub type PersistedObserver = Box<dyn FnMut(&PersistedEvent) + Send>;

/// The store operations the import pipeline needs.
///
/// Implementations own entity identity: `create_category` hands out a
/// tentative handle and `commit` promotes every outstanding tentative handle
/// to a permanent one, notifying subscribers of the promotions.
pub trait SongStore: Send + Sync {
    /// Look up an existing category entity by its unique name
    fn find_category(&self, name: &str) -> Result<Option<CategoryHandle>, StoreError>;

    /// Create a new category entity with the given name, returning a
    /// tentative handle
    fn create_category(&self, name: &str) -> Result<CategoryHandle, StoreError>;

    /// Insert a completed song. The song stays pending until the next commit.
    fn insert_song(&self, song: Song) -> Result<(), StoreError>;

    /// Durably commit all pending writes. Promotes tentative handles and
    /// fires the persisted notification before returning.
    fn commit(&self) -> Result<(), StoreError>;

    /// Register an observer for the persisted notification
    fn subscribe_persisted(&self, observer: PersistedObserver) -> SubscriptionId;

    /// Remove a previously registered observer. Unknown ids are a no-op.
    fn unsubscribe_persisted(&self, id: SubscriptionId);
}

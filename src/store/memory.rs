//! In-memory song store
//!
//! Reference implementation of [`SongStore`] used by the binary and the test
//! suite. It models the identity lifecycle the importer has to cope with:
//! entities are created with tentative handles and a commit promotes them to
//! permanent ones, after which the tentative form can no longer be resolved.

use super::{PersistedEvent, PersistedObserver, SongStore, StoreError, SubscriptionId};
use crate::model::{CategoryHandle, Song};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
struct CategoryRecord {
    name: String,
    permanent: bool,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    categories: HashMap<u64, CategoryRecord>,
    by_name: HashMap<String, u64>,
    pending_songs: Vec<Song>,
    committed_songs: Vec<Song>,
    fail_next_commit: bool,
    find_calls: u64,
    create_calls: u64,
    commit_calls: u64,
}

/// In-memory [`SongStore`] with tentative/permanent handle promotion
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Inner>,
    // Kept outside `data` so observers run without the data lock held;
    // an observer is allowed to call back into the store.
    observers: Mutex<HashMap<u64, PersistedObserver>>,
    next_subscription: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` call fail, for exercising the fatal-error path
    pub fn fail_next_commit(&self) {
        self.data.lock().fail_next_commit = true;
    }

    /// Songs made durable by a commit, in insertion order
    pub fn committed_songs(&self) -> Vec<Song> {
        self.data.lock().committed_songs.clone()
    }

    /// Number of inserted songs not yet covered by a commit
    pub fn pending_len(&self) -> usize {
        self.data.lock().pending_songs.len()
    }

    /// Number of distinct category entities
    pub fn category_count(&self) -> usize {
        self.data.lock().categories.len()
    }

    /// Resolve a handle to its category name.
    ///
    /// A tentative handle held across a commit is dangling: the entity now
    /// only answers to its permanent identity.
    pub fn resolve_category(&self, handle: CategoryHandle) -> Result<String, StoreError> {
        let data = self.data.lock();
        let record = data
            .categories
            .get(&handle.id())
            .ok_or(StoreError::DanglingHandle(handle))?;
        if handle.is_tentative() && record.permanent {
            return Err(StoreError::DanglingHandle(handle));
        }
        Ok(record.name.clone())
    }

    pub fn find_calls(&self) -> u64 {
        self.data.lock().find_calls
    }

    pub fn create_calls(&self) -> u64 {
        self.data.lock().create_calls
    }

    pub fn commit_calls(&self) -> u64 {
        self.data.lock().commit_calls
    }
}

impl SongStore for MemoryStore {
    fn find_category(&self, name: &str) -> Result<Option<CategoryHandle>, StoreError> {
        let mut data = self.data.lock();
        data.find_calls += 1;
        Ok(data.by_name.get(name).map(|&id| {
            if data.categories[&id].permanent {
                CategoryHandle::Permanent(id)
            } else {
                CategoryHandle::Tentative(id)
            }
        }))
    }

    fn create_category(&self, name: &str) -> Result<CategoryHandle, StoreError> {
        let mut data = self.data.lock();
        data.create_calls += 1;
        if data.by_name.contains_key(name) {
            return Err(StoreError::Create(format!(
                "category '{name}' already exists"
            )));
        }
        let id = data.next_id;
        data.next_id += 1;
        data.categories.insert(
            id,
            CategoryRecord {
                name: name.to_string(),
                permanent: false,
            },
        );
        data.by_name.insert(name.to_string(), id);
        Ok(CategoryHandle::Tentative(id))
    }

    fn insert_song(&self, song: Song) -> Result<(), StoreError> {
        self.data.lock().pending_songs.push(song);
        Ok(())
    }

    fn commit(&self) -> Result<(), StoreError> {
        let event = {
            let mut data = self.data.lock();
            data.commit_calls += 1;
            if data.fail_next_commit {
                data.fail_next_commit = false;
                return Err(StoreError::Commit("injected commit failure".into()));
            }

            let mut promoted = Vec::new();
            for (&id, record) in data.categories.iter_mut() {
                if !record.permanent {
                    record.permanent = true;
                    promoted.push((CategoryHandle::Tentative(id), CategoryHandle::Permanent(id)));
                }
            }

            // Committed songs only ever reference permanent identities
            let mut pending = std::mem::take(&mut data.pending_songs);
            for song in &mut pending {
                if let Some(CategoryHandle::Tentative(id)) = song.category {
                    song.category = Some(CategoryHandle::Permanent(id));
                }
            }
            let committed = pending.len();
            data.committed_songs.extend(pending);
            debug!(songs = committed, promoted = promoted.len(), "store commit");

            PersistedEvent { promoted }
        };

        // Fire the persisted notification with the data lock released
        let mut observers = self.observers.lock();
        for observer in observers.values_mut() {
            observer(&event);
        }
        Ok(())
    }

    fn subscribe_persisted(&self, observer: PersistedObserver) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().insert(id, observer);
        SubscriptionId(id)
    }

    fn unsubscribe_persisted(&self, id: SubscriptionId) {
        self.observers.lock().remove(&id.0);
    }
}

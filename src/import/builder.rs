//! Record assembly for the import pipeline

use crate::model::{CategoryHandle, Song};
use crate::store::{SongStore, StoreError};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::trace;

/// Owns the one song currently under construction.
///
/// A record begins when the state machine enters an `item` element and is
/// handed to the store when that element closes. Rank is a session-wide
/// counter: the Nth record begun gets rank N, regardless of how batches
/// fall.
pub struct SongBuilder {
    store: Arc<dyn SongStore>,
    current: Option<Song>,
    last_rank: u32,
    completed: u64,
}

impl SongBuilder {
    pub fn new(store: Arc<dyn SongStore>) -> Self {
        Self {
            store,
            current: None,
            last_rank: 0,
            completed: 0,
        }
    }

    /// Start a new record at the next rank. An unfinished record is
    /// discarded; the state machine never begins twice without finishing.
    pub fn begin_song(&mut self) {
        self.last_rank += 1;
        self.current = Some(Song::with_rank(self.last_rank));
        trace!(rank = self.last_rank, "begin song");
    }

    pub fn set_title(&mut self, title: String) {
        if let Some(song) = self.current.as_mut() {
            song.title = Some(title);
        }
    }

    pub fn set_artist(&mut self, artist: String) {
        if let Some(song) = self.current.as_mut() {
            song.artist = Some(artist);
        }
    }

    pub fn set_album(&mut self, album: String) {
        if let Some(song) = self.current.as_mut() {
            song.album = Some(album);
        }
    }

    pub fn set_release_date(&mut self, date: Option<NaiveDate>) {
        if let Some(song) = self.current.as_mut() {
            song.release_date = date;
        }
    }

    pub fn set_category(&mut self, handle: CategoryHandle) {
        if let Some(song) = self.current.as_mut() {
            song.category = Some(handle);
        }
    }

    /// Hand the in-progress record to the store.
    ///
    /// Returns `true` when a record was actually completed, so the caller
    /// can advance its batch counter.
    pub fn finish_song(&mut self) -> Result<bool, StoreError> {
        match self.current.take() {
            Some(song) => {
                trace!(rank = song.rank, title = ?song.title, "finish song");
                self.store.insert_song(song)?;
                self.completed += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Records completed so far this session
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Whether a record is currently under construction
    pub fn in_progress(&self) -> bool {
        self.current.is_some()
    }
}

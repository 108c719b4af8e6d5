//! chartfeed: streaming importer for ranked media RSS feeds
//!
//! Downloads a chart feed (the iTunes top-songs schema), parses it
//! incrementally as bytes arrive, and materializes typed song records into a
//! store, featuring:
//! - Push-style single-pass XML parsing via quick-xml (no full-document buffer)
//! - An element/namespace state machine that assembles records at tag boundaries
//! - Category deduplication through a bounded access-counter LRU cache
//! - Batched commits on a dedicated background worker, with async completion
//!   signaling to the caller

pub mod config;
pub mod feed;
pub mod import;
pub mod model;
pub mod parser;
pub mod store;

pub use config::Config;
pub use import::{ImportCoordinator, ImportError, ImportEvent, ImportHandle, ImportStats};
pub use model::{CategoryHandle, Song};

//! End-to-end import pipeline tests
//!
//! Drives the full stack (scripted byte feed, incremental parser, state
//! machine, category cache, batched commits) against the in-memory store,
//! with the feed document split at awkward chunk boundaries on purpose.

use chartfeed::feed::ScriptedFeed;
use chartfeed::import::{ImportCoordinator, ImportError};
use chartfeed::store::MemoryStore;
use std::sync::Arc;

const FEED_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
    <rss version=\"2.0\" xmlns:itms=\"http://phobos.apple.com/rss/1.0/modules/itms/\">\n\
    <channel>\n\
    <title>Top Songs</title>\n\
    <link>https://example.com/charts</link>\n";
const FEED_FOOTER: &str = "</channel>\n</rss>\n";

fn item(title: &str, artist: &str, album: &str, date: &str, category: &str) -> String {
    format!(
        "<item>\n\
         <title>{title}</title>\n\
         <itms:artist>{artist}</itms:artist>\n\
         <itms:album>{album}</itms:album>\n\
         <itms:releasedate>{date}</itms:releasedate>\n\
         <category>{category}</category>\n\
         <link>https://example.com/song</link>\n\
         </item>\n"
    )
}

fn chart_document(n: usize) -> String {
    let categories = ["Pop", "Rock", "Jazz", "Hip-Hop/Rap", "Electronic"];
    let mut doc = String::from(FEED_HEADER);
    for i in 1..=n {
        doc.push_str(&item(
            &format!("Song {i}"),
            &format!("Artist {}", i % 7),
            &format!("Album {}", i % 11),
            &format!("February {}, 2026", (i % 28) + 1),
            categories[i % categories.len()],
        ));
    }
    doc.push_str(FEED_FOOTER);
    doc
}

#[test]
fn imports_a_full_chart_with_tiny_chunks() {
    let store = Arc::new(MemoryStore::new());
    // 7-byte chunks guarantee every tag gets split somewhere
    let feed = ScriptedFeed::from_document(chart_document(45).as_bytes(), 7);

    let (saves, outcome) = ImportCoordinator::new(store.clone()).start(feed).wait();
    let stats = outcome.expect("import should succeed");

    assert_eq!(saves, vec![20, 20, 5]);
    assert_eq!(stats.songs_imported, 45);
    assert_eq!(stats.commits, 3);

    let songs = store.committed_songs();
    assert_eq!(songs.len(), 45);
    let ranks: Vec<u32> = songs.iter().map(|s| s.rank).collect();
    assert_eq!(ranks, (1..=45).collect::<Vec<u32>>());

    let first = &songs[0];
    assert_eq!(first.title.as_deref(), Some("Song 1"));
    assert_eq!(first.artist.as_deref(), Some("Artist 1"));
    assert!(first.release_date.is_some());

    // 5 distinct categories, each entity shared across its songs
    assert_eq!(store.category_count(), 5);
    let rock = songs
        .iter()
        .filter(|s| {
            s.category
                .and_then(|h| store.resolve_category(h).ok())
                .as_deref()
                == Some("Rock")
        })
        .count();
    assert_eq!(rock, 9);
}

#[test]
fn category_entities_are_unique_per_name() {
    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::from_document(chart_document(45).as_bytes(), 256);
    ImportCoordinator::new(store.clone())
        .start(feed)
        .wait()
        .1
        .expect("import should succeed");

    // Every committed song resolves through a permanent handle
    let songs = store.committed_songs();
    let mut seen = std::collections::HashMap::new();
    for song in &songs {
        let handle = song.category.expect("every item carries a category");
        assert!(!handle.is_tentative());
        let name = store.resolve_category(handle).unwrap();
        let prior = seen.insert(name, handle);
        if let Some(prior) = prior {
            assert_eq!(prior, handle);
        }
    }
}

#[test]
fn small_cache_still_produces_correct_entities() {
    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::from_document(chart_document(60).as_bytes(), 128);

    // Capacity 2 against 5 category names forces constant eviction
    let (_saves, outcome) = ImportCoordinator::new(store.clone())
        .with_cache_capacity(2)
        .start(feed)
        .wait();
    let stats = outcome.expect("import should succeed");

    assert_eq!(store.category_count(), 5);
    assert_eq!(stats.cache_hits + stats.cache_misses, 60);
    assert!(stats.cache_misses >= 5);
}

#[test]
fn cache_and_no_cache_agree_on_results() {
    let doc = chart_document(30);

    let cached = Arc::new(MemoryStore::new());
    ImportCoordinator::new(cached.clone())
        .start(ScriptedFeed::from_document(doc.as_bytes(), 64))
        .wait()
        .1
        .expect("cached import should succeed");

    let uncached = Arc::new(MemoryStore::new());
    let (_saves, outcome) = ImportCoordinator::new(uncached.clone())
        .with_cache_enabled(false)
        .start(ScriptedFeed::from_document(doc.as_bytes(), 64))
        .wait();
    let stats = outcome.expect("uncached import should succeed");

    assert_eq!(stats.cache_hits, 0);
    assert_eq!(stats.cache_misses, 30);
    assert_eq!(cached.category_count(), uncached.category_count());
    assert_eq!(
        cached.committed_songs().len(),
        uncached.committed_songs().len()
    );
}

#[test]
fn optional_fields_may_be_absent() {
    let mut doc = String::from(FEED_HEADER);
    doc.push_str("<item><title>Bare</title></item>\n");
    doc.push_str(&item(
        "Full",
        "Somebody",
        "Something",
        "not a real date",
        "Pop",
    ));
    doc.push_str(FEED_FOOTER);

    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::from_document(doc.as_bytes(), 32);
    ImportCoordinator::new(store.clone())
        .start(feed)
        .wait()
        .1
        .expect("import should succeed");

    let songs = store.committed_songs();
    assert_eq!(songs.len(), 2);

    assert_eq!(songs[0].title.as_deref(), Some("Bare"));
    assert_eq!(songs[0].artist, None);
    assert_eq!(songs[0].category, None);

    // The unparseable release date degrades to None without losing the record
    assert_eq!(songs[1].title.as_deref(), Some("Full"));
    assert_eq!(songs[1].release_date, None);
    assert!(songs[1].category.is_some());
}

#[test]
fn surrounding_feed_structure_is_ignored() {
    let mut doc = String::from(FEED_HEADER);
    // Channel-level noise that must not toggle any record state, including
    // an artist element outside any item and a stray closing item
    doc.push_str("<description>Weekly chart</description>\n");
    doc.push_str("<itms:artist>Channel Artist</itms:artist>\n");
    doc.push_str("</item>\n");
    doc.push_str(&item("Real", "Someone", "Anything", "March 1, 2026", "Rock"));
    doc.push_str(FEED_FOOTER);

    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::from_document(doc.as_bytes(), 16);
    ImportCoordinator::new(store.clone())
        .start(feed)
        .wait()
        .1
        .expect("import should succeed");

    let songs = store.committed_songs();
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0].rank, 1);
    assert_eq!(songs[0].title.as_deref(), Some("Real"));
    assert_eq!(songs[0].artist.as_deref(), Some("Someone"));
}

#[test]
fn parse_error_aborts_with_prior_batches_intact() {
    let mut doc = String::from(FEED_HEADER);
    for i in 1..=23 {
        doc.push_str(&item(
            &format!("Song {i}"),
            "A",
            "B",
            "April 2, 2026",
            "Pop",
        ));
    }
    doc.push_str("<item><title>&broken;</title></item>");

    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::from_document(doc.as_bytes(), 128);
    let (saves, outcome) = ImportCoordinator::new(store.clone()).start(feed).wait();

    assert_eq!(saves, vec![20]);
    assert!(matches!(outcome, Err(ImportError::Parse(_))));
    // The committed batch survives; the in-flight record does not
    assert_eq!(store.committed_songs().len(), 20);
}

#[test]
fn network_failure_surfaces_with_reason() {
    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::from_document(chart_document(5).as_bytes(), 64)
        .failing_with("tls handshake timeout");

    let (_saves, outcome) = ImportCoordinator::new(store).start(feed).wait();
    match outcome {
        Err(ImportError::Network(reason)) => assert!(reason.contains("tls handshake")),
        other => panic!("expected network error, got {other:?}"),
    }
}

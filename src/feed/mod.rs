//! Byte feed delivery
//!
//! A [`ByteFeed`] delivers the raw feed document as an ordered sequence of
//! byte chunks followed by exactly one terminal signal, success or failure.
//! Chunks flow through a [`FeedSink`] into a channel the parser worker drains;
//! the worker parks between arrivals rather than polling.
//!
//! No chunk has to be well-formed XML on its own. Chunk boundaries are
//! wherever the transport happened to cut the stream.

mod file;
mod http;

pub use file::FileFeed;
pub use http::HttpFeed;

use std::sync::mpsc::{self, Receiver, Sender};

/// Message delivered from a feed to the parser worker
pub enum FeedMessage {
    /// One consecutive slice of the document
    Chunk(Vec<u8>),
    /// Successful end of the stream
    Complete,
    /// Delivery failure; aborts the session with a network error
    Fail(String),
}

/// Create a connected sink/receiver pair for one feed session
pub fn channel() -> (FeedSink, Receiver<FeedMessage>) {
    let (tx, rx) = mpsc::channel();
    (FeedSink { tx }, rx)
}

/// Push handle a feed uses to deliver bytes.
///
/// The terminal methods consume the sink, so a feed can signal completion or
/// failure at most once. Sends after the consumer has gone away are silently
/// dropped; the session already reached its terminal state.
pub struct FeedSink {
    tx: Sender<FeedMessage>,
}

impl FeedSink {
    pub fn chunk(&self, bytes: Vec<u8>) {
        let _ = self.tx.send(FeedMessage::Chunk(bytes));
    }

    pub fn complete(self) {
        let _ = self.tx.send(FeedMessage::Complete);
    }

    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(FeedMessage::Fail(reason.into()));
    }
}

/// Source of feed bytes.
///
/// `deliver` runs on its own thread for the duration of the session and must
/// end with exactly one call to [`FeedSink::complete`] or [`FeedSink::fail`].
pub trait ByteFeed: Send + 'static {
    fn deliver(self, sink: FeedSink);
}

/// Scripted in-memory feed for tests: replays a fixed sequence of chunks and
/// ends with the configured terminal signal.
pub struct ScriptedFeed {
    chunks: Vec<Vec<u8>>,
    failure: Option<String>,
}

impl ScriptedFeed {
    /// Feed that delivers `chunks` in order, then completes
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks,
            failure: None,
        }
    }

    /// Deliver a document split into chunks of at most `chunk_size` bytes
    pub fn from_document(document: &[u8], chunk_size: usize) -> Self {
        let chunks = document
            .chunks(chunk_size.max(1))
            .map(|c| c.to_vec())
            .collect();
        Self::new(chunks)
    }

    /// End with a delivery failure instead of completion
    pub fn failing_with(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }
}

impl ByteFeed for ScriptedFeed {
    fn deliver(self, sink: FeedSink) {
        for chunk in self.chunks {
            sink.chunk(chunk);
        }
        match self.failure {
            Some(reason) => sink.fail(reason),
            None => sink.complete(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: Receiver<FeedMessage>) -> (Vec<u8>, Option<FeedMessage>) {
        let mut bytes = Vec::new();
        let mut terminal = None;
        for msg in rx {
            match msg {
                FeedMessage::Chunk(c) => bytes.extend(c),
                other => {
                    terminal = Some(other);
                    break;
                }
            }
        }
        (bytes, terminal)
    }

    #[test]
    fn test_scripted_feed_completes() {
        let (sink, rx) = channel();
        ScriptedFeed::new(vec![b"<a>".to_vec(), b"</a>".to_vec()]).deliver(sink);
        let (bytes, terminal) = drain(rx);
        assert_eq!(bytes, b"<a></a>");
        assert!(matches!(terminal, Some(FeedMessage::Complete)));
    }

    #[test]
    fn test_scripted_feed_failure_is_terminal() {
        let (sink, rx) = channel();
        ScriptedFeed::new(vec![b"<a>".to_vec()])
            .failing_with("connection reset")
            .deliver(sink);
        let (bytes, terminal) = drain(rx);
        assert_eq!(bytes, b"<a>");
        match terminal {
            Some(FeedMessage::Fail(reason)) => assert_eq!(reason, "connection reset"),
            other => panic!("expected failure terminal, got {:?}", other.is_some()),
        }
    }

    #[test]
    fn test_from_document_chunking() {
        let feed = ScriptedFeed::from_document(b"abcdefg", 3);
        assert_eq!(feed.chunks, vec![b"abc".to_vec(), b"def".to_vec(), b"g".to_vec()]);
    }
}

//! Incremental feed parser
//!
//! Push-style XML tokenizer for the import pipeline. Feeds push byte chunks
//! of arbitrary size into a channel; a [`ChunkReader`] turns that channel
//! into a blocking byte stream and a quick-xml reader tokenizes it
//! incrementally, so the whole document is never buffered and the parsing
//! thread parks while waiting for the next chunk.
//!
//! The parser emits only the three event kinds the record state machine
//! consumes: element start, element end, and text. Namespace handling is the
//! feed schema's: the prefix travels as a literal string alongside the local
//! name, with no URI resolution.

use crate::feed::FeedMessage;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::fmt;
use std::io::{self, BufReader, Read};
use std::sync::mpsc::Receiver;
use thiserror::Error;

/// Parse-level failure. Any error here is fatal to the import session.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// Malformed byte stream; no partial recovery is attempted
    #[error("malformed feed: {0}")]
    Syntax(String),

    /// The feed signaled a delivery failure mid-stream
    #[error("feed delivery failed: {0}")]
    Feed(String),
}

/// Events emitted by the incremental parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    ElementStart {
        local: String,
        prefix: Option<String>,
    },
    ElementEnd {
        local: String,
        prefix: Option<String>,
    },
    Text(String),
}

/// Marker wrapped into io errors so feed failures survive the trip through
/// the XML reader and come back out as [`ParseError::Feed`].
#[derive(Debug)]
struct FeedFailure(String);

impl fmt::Display for FeedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for FeedFailure {}

/// Blocking [`Read`] over the feed chunk channel.
///
/// Yields delivered bytes in order, reports end-of-stream once the feed
/// completes, and surfaces a feed failure as an io error carrying the
/// original reason.
struct ChunkReader {
    rx: Receiver<FeedMessage>,
    current: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl ChunkReader {
    fn new(rx: Receiver<FeedMessage>) -> Self {
        Self {
            rx,
            current: Vec::new(),
            pos: 0,
            finished: false,
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.current.len() {
                let n = (self.current.len() - self.pos).min(buf.len());
                buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(FeedMessage::Chunk(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Ok(FeedMessage::Complete) => {
                    self.finished = true;
                    return Ok(0);
                }
                Ok(FeedMessage::Fail(reason)) => {
                    self.finished = true;
                    return Err(io::Error::new(io::ErrorKind::Other, FeedFailure(reason)));
                }
                Err(_) => {
                    // Feed dropped its sink without a terminal signal
                    self.finished = true;
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        FeedFailure("feed disconnected before completion".into()),
                    ));
                }
            }
        }
    }
}

/// Streaming parser over a feed chunk channel.
///
/// `next_event` blocks until enough bytes have arrived to tokenize the next
/// event, and returns `Ok(None)` at end of input.
pub struct IncrementalParser {
    reader: Reader<BufReader<ChunkReader>>,
    buf: Vec<u8>,
    // An empty element produces a start and an end event; the end is held
    // back here until the next call.
    pending_end: Option<(String, Option<String>)>,
}

impl IncrementalParser {
    pub fn new(rx: Receiver<FeedMessage>) -> Self {
        let mut reader = Reader::from_reader(BufReader::new(ChunkReader::new(rx)));
        // End-name matching stays off: stray end tags are a documented
        // feature of the feed and the state machine decides what they mean.
        reader.check_end_names(false);
        Self {
            reader,
            buf: Vec::with_capacity(8192),
            pending_end: None,
        }
    }

    pub fn next_event(&mut self) -> Result<Option<ParseEvent>, ParseError> {
        if let Some((local, prefix)) = self.pending_end.take() {
            return Ok(Some(ParseEvent::ElementEnd { local, prefix }));
        }

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) => {
                    let (local, prefix) = split_name(e.name().as_ref());
                    return Ok(Some(ParseEvent::ElementStart { local, prefix }));
                }
                Ok(Event::Empty(e)) => {
                    let (local, prefix) = split_name(e.name().as_ref());
                    self.pending_end = Some((local.clone(), prefix.clone()));
                    return Ok(Some(ParseEvent::ElementStart { local, prefix }));
                }
                Ok(Event::End(e)) => {
                    let (local, prefix) = split_name(e.name().as_ref());
                    return Ok(Some(ParseEvent::ElementEnd { local, prefix }));
                }
                Ok(Event::Text(e)) => match e.unescape() {
                    Ok(text) => return Ok(Some(ParseEvent::Text(text.into_owned()))),
                    Err(err) => return Err(ParseError::Syntax(err.to_string())),
                },
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    return Ok(Some(ParseEvent::Text(text)));
                }
                Ok(Event::Eof) => return Ok(None),
                // Declarations, comments, PIs and doctype are structurally inert
                Ok(_) => continue,
                Err(quick_xml::Error::Io(io_err)) => {
                    let reason = io_err
                        .get_ref()
                        .and_then(|inner| inner.downcast_ref::<FeedFailure>())
                        .map(|f| f.0.clone())
                        .unwrap_or_else(|| io_err.to_string());
                    return Err(ParseError::Feed(reason));
                }
                Err(e) => return Err(ParseError::Syntax(e.to_string())),
            }
        }
    }
}

/// Split a qualified name into (local, prefix), both decoded as UTF-8
fn split_name(qname: &[u8]) -> (String, Option<String>) {
    match qname.iter().position(|&b| b == b':') {
        Some(idx) => (
            String::from_utf8_lossy(&qname[idx + 1..]).into_owned(),
            Some(String::from_utf8_lossy(&qname[..idx]).into_owned()),
        ),
        None => (String::from_utf8_lossy(qname).into_owned(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed;

    fn start(local: &str, prefix: Option<&str>) -> ParseEvent {
        ParseEvent::ElementStart {
            local: local.into(),
            prefix: prefix.map(String::from),
        }
    }

    fn end(local: &str, prefix: Option<&str>) -> ParseEvent {
        ParseEvent::ElementEnd {
            local: local.into(),
            prefix: prefix.map(String::from),
        }
    }

    /// Feed the chunks, complete, and collect every event
    fn parse_chunks(chunks: &[&[u8]]) -> Result<Vec<ParseEvent>, ParseError> {
        let (sink, rx) = feed::channel();
        for chunk in chunks {
            sink.chunk(chunk.to_vec());
        }
        sink.complete();

        let mut parser = IncrementalParser::new(rx);
        let mut events = Vec::new();
        while let Some(event) = parser.next_event()? {
            events.push(event);
        }
        Ok(events)
    }

    #[test]
    fn test_events_across_chunk_boundaries() {
        // Boundaries fall inside tags and inside text
        let events = parse_chunks(&[b"<it", b"em><title>He", b"llo</title></item>"]).unwrap();
        assert_eq!(
            events,
            vec![
                start("item", None),
                start("title", None),
                ParseEvent::Text("Hello".into()),
                end("title", None),
                end("item", None),
            ]
        );
    }

    #[test]
    fn test_namespace_prefix_split() {
        let events = parse_chunks(&[b"<itms:artist>X</itms:artist>"]).unwrap();
        assert_eq!(events[0], start("artist", Some("itms")));
        assert_eq!(events[2], end("artist", Some("itms")));
    }

    #[test]
    fn test_empty_element_emits_start_and_end() {
        let events = parse_chunks(&[b"<item><itms:link/></item>"]).unwrap();
        assert_eq!(
            events,
            vec![
                start("item", None),
                start("link", Some("itms")),
                end("link", Some("itms")),
                end("item", None),
            ]
        );
    }

    #[test]
    fn test_entity_unescaping() {
        let events = parse_chunks(&[b"<t>Rock &amp; Roll</t>"]).unwrap();
        assert_eq!(events[1], ParseEvent::Text("Rock & Roll".into()));
    }

    #[test]
    fn test_prolog_and_comments_skipped() {
        let events =
            parse_chunks(&[b"<?xml version=\"1.0\"?><!-- chart --><rss></rss>"]).unwrap();
        assert_eq!(events, vec![start("rss", None), end("rss", None)]);
    }

    #[test]
    fn test_malformed_stream_is_syntax_error() {
        // An unknown entity cannot be decoded; parse errors are fatal
        let result = parse_chunks(&[b"<t>&bogus;</t>"]);
        assert!(matches!(result, Err(ParseError::Syntax(_))));
    }

    #[test]
    fn test_stray_end_tag_is_reported_not_rejected() {
        // Mismatched nesting is the state machine's concern, not the
        // tokenizer's
        let events = parse_chunks(&[b"<channel></item></channel>"]).unwrap();
        assert_eq!(
            events,
            vec![
                start("channel", None),
                end("item", None),
                end("channel", None),
            ]
        );
    }

    #[test]
    fn test_feed_failure_surfaces_reason() {
        let (sink, rx) = feed::channel();
        sink.chunk(b"<rss>".to_vec());
        sink.fail("connection reset");

        let mut parser = IncrementalParser::new(rx);
        // The buffered bytes still come through first
        assert_eq!(parser.next_event().unwrap(), Some(start("rss", None)));
        match parser.next_event() {
            Err(ParseError::Feed(reason)) => assert_eq!(reason, "connection reset"),
            other => panic!("expected feed error, got {other:?}"),
        }
    }

    #[test]
    fn test_dropped_sink_is_feed_error() {
        let (sink, rx) = feed::channel();
        sink.chunk(b"<rss>".to_vec());
        drop(sink);

        let mut parser = IncrementalParser::new(rx);
        parser.next_event().unwrap();
        assert!(matches!(parser.next_event(), Err(ParseError::Feed(_))));
    }
}

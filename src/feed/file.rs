//! Local file feed, mainly for offline runs against a saved feed document

use super::{ByteFeed, FeedSink};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

const CHUNK_SIZE: usize = 8 * 1024;

/// Streams a feed document from disk in fixed-size chunks
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ByteFeed for FileFeed {
    fn deliver(self, sink: FeedSink) {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                sink.fail(format!("open {}: {}", self.path.display(), e));
                return;
            }
        };

        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            match file.read(&mut buf) {
                Ok(0) => {
                    sink.complete();
                    return;
                }
                Ok(n) => sink.chunk(buf[..n].to_vec()),
                Err(e) => {
                    sink.fail(format!("read {}: {}", self.path.display(), e));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{channel, FeedMessage};
    use std::io::Write;

    #[test]
    fn test_file_feed_streams_contents() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"<rss><item/></rss>").unwrap();

        let (sink, rx) = channel();
        FileFeed::new(tmp.path()).deliver(sink);

        let mut bytes = Vec::new();
        let mut completed = false;
        for msg in rx {
            match msg {
                FeedMessage::Chunk(c) => bytes.extend(c),
                FeedMessage::Complete => {
                    completed = true;
                    break;
                }
                FeedMessage::Fail(reason) => panic!("unexpected failure: {reason}"),
            }
        }
        assert!(completed);
        assert_eq!(bytes, b"<rss><item/></rss>");
    }

    #[test]
    fn test_missing_file_fails() {
        let (sink, rx) = channel();
        FileFeed::new("/nonexistent/feed.xml").deliver(sink);
        assert!(matches!(rx.recv(), Ok(FeedMessage::Fail(_))));
    }
}

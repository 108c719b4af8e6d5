//! HTTP byte feed
//!
//! Fetches the feed document over HTTP and streams the response body into
//! the sink chunk by chunk, so parsing overlaps the download instead of
//! waiting for the full document.

use super::{ByteFeed, FeedSink};
use std::io::Read;
use std::time::Duration;
use tracing::debug;
use url::Url;

const CHUNK_SIZE: usize = 8 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Streams a feed document from an HTTP(S) locator
pub struct HttpFeed {
    url: Url,
}

impl HttpFeed {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

impl ByteFeed for HttpFeed {
    fn deliver(self, sink: FeedSink) {
        debug!(url = %self.url, "fetching feed");

        let client = match reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                sink.fail(format!("http client setup: {e}"));
                return;
            }
        };

        let response = match client.get(self.url.clone()).send() {
            Ok(r) => r,
            Err(e) => {
                sink.fail(format!("request failed: {e}"));
                return;
            }
        };
        let mut response = match response.error_for_status() {
            Ok(r) => r,
            Err(e) => {
                sink.fail(format!("server error: {e}"));
                return;
            }
        };

        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            match response.read(&mut buf) {
                Ok(0) => {
                    sink.complete();
                    return;
                }
                Ok(n) => sink.chunk(buf[..n].to_vec()),
                Err(e) => {
                    sink.fail(format!("body read failed: {e}"));
                    return;
                }
            }
        }
    }
}

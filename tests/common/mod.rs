// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use gator::error::{GatorError, Result};
use gator::ingest::types::FeedSource;

enum Reply {
    Body(Vec<u8>),
    TransportError,
}

/// Feed source answering from a fixed table instead of the network.
/// Unknown URLs fail like a refused connection.
#[derive(Default)]
pub struct ScriptedSource {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Body(body.into()));
    }

    pub fn fail(&self, url: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::TransportError);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.replies.lock().unwrap().get(url) {
            Some(Reply::Body(b)) => Ok(b.clone()),
            Some(Reply::TransportError) | None => Err(transport_error(url)),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// A real `reqwest::Error`, produced without touching the network.
pub fn transport_error(url: &str) -> GatorError {
    let source = reqwest::Client::new()
        .get("::not a url::")
        .build()
        .expect_err("relative URL must not build");
    GatorError::Network {
        url: url.to_string(),
        source,
    }
}

/// Minimal RSS document; each item is (link, pubDate).
pub fn rss(items: &[(&str, &str)]) -> String {
    let mut out = String::from("<rss version=\"2.0\"><channel><title>Test Feed</title>");
    out.push_str("<link>https://feed.test/</link><description>fixture</description>");
    for (link, pub_date) in items {
        out.push_str(&format!(
            "<item><title>Post {link}</title><link>{link}</link><pubDate>{pub_date}</pubDate></item>"
        ));
    }
    out.push_str("</channel></rss>");
    out
}

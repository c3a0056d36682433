//! [`MemoryFetcher`]: a fetch capability backed by a map of URL → payload.
//!
//! Useful for testing and for replaying a captured API snapshot.

use std::{
  collections::HashMap,
  sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use wikiparl_core::{Error, Result, fetch::Fetch};

#[derive(Debug, Default)]
pub struct MemoryFetcher {
  documents: HashMap<String, serde_json::Value>,
  requests:  AtomicUsize,
  log:       Mutex<Vec<String>>,
}

impl MemoryFetcher {
  pub fn new() -> Self { Self::default() }

  pub fn with(mut self, url: impl Into<String>, document: serde_json::Value) -> Self {
    self.insert(url, document);
    self
  }

  pub fn insert(&mut self, url: impl Into<String>, document: serde_json::Value) {
    self.documents.insert(url.into(), document);
  }

  /// Number of `fetch` calls served so far, including misses.
  pub fn requests(&self) -> usize { self.requests.load(Ordering::SeqCst) }

  /// Every requested URL, in request order.
  pub fn requested_urls(&self) -> Vec<String> {
    self.log.lock().map(|log| log.clone()).unwrap_or_default()
  }
}

impl Fetch for MemoryFetcher {
  async fn fetch(&self, url: &str) -> Result<serde_json::Value> {
    self.requests.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut log) = self.log.lock() {
      log.push(url.to_owned());
    }
    self
      .documents
      .get(url)
      .cloned()
      .ok_or_else(|| Error::transient(url, "404 Not Found"))
  }
}

//! Content cache in front of a [`Fetch`] capability.
//!
//! Payloads are stored as JSON files named by the SHA-256 of the normalized
//! URL. Normalization strips the time-window query parameters: they select a
//! slice of history and do not change the current snapshot of a resource.
//!
//! The cache never evicts. Callers clear the directory between runs when they
//! want fresh data.

use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicU64, Ordering},
};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;
use wikiparl_core::fetch::Fetch;

use crate::Result;

/// Query parameters that denote a time window.
pub const TIME_WINDOW_PARAMS: &[&str] =
  &["modified_since", "modified_until", "created_since", "created_until"];

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Normalize a URL for caching. Unparseable input is returned unchanged.
pub fn normalize_url(raw: &str) -> String {
  let Ok(mut url) = Url::parse(raw) else {
    return raw.to_owned();
  };

  let kept: Vec<(String, String)> = url
    .query_pairs()
    .filter(|(k, _)| !TIME_WINDOW_PARAMS.contains(&&**k))
    .map(|(k, v)| (k.into_owned(), v.into_owned()))
    .collect();

  url.set_query(None);
  if !kept.is_empty() {
    url.query_pairs_mut().extend_pairs(kept);
  }
  url.into()
}

/// Deterministic cache key for a URL.
pub fn cache_key(url: &str) -> String {
  hex::encode(Sha256::digest(normalize_url(url).as_bytes()))
}

// ─── FileCache ───────────────────────────────────────────────────────────────

/// A directory of cached JSON payloads.
#[derive(Debug)]
pub struct FileCache {
  dir:    PathBuf,
  hits:   AtomicU64,
  misses: AtomicU64,
}

impl FileCache {
  /// Open (or create) the cache directory.
  pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
    let dir = dir.as_ref().to_path_buf();
    tokio::fs::create_dir_all(&dir).await?;
    Ok(Self { dir, hits: AtomicU64::new(0), misses: AtomicU64::new(0) })
  }

  fn path_for(&self, url: &str) -> PathBuf { self.dir.join(cache_key(url)) }

  /// Read a cached payload. Unreadable or corrupt entries count as misses.
  pub async fn get(&self, url: &str) -> Option<serde_json::Value> {
    let path = self.path_for(url);
    let bytes = match tokio::fs::read(&path).await {
      Ok(bytes) => bytes,
      Err(e) => {
        if e.kind() != std::io::ErrorKind::NotFound {
          warn!(url, path = %path.display(), error = %e, "unreadable cache entry");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        return None;
      }
    };

    match serde_json::from_slice(&bytes) {
      Ok(value) => {
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(value)
      }
      Err(e) => {
        warn!(url, path = %path.display(), error = %e, "corrupt cache entry");
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  /// Store a payload. The file is written under a temporary name and renamed
  /// into place so readers never observe a partial entry.
  pub async fn put(&self, url: &str, value: &serde_json::Value) -> Result<()> {
    let path = self.path_for(url);
    let tmp = path.with_extension("tmp");
    let bytes = serde_json::to_vec(value).map_err(std::io::Error::from)?;
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, &path).await?;
    Ok(())
  }

  pub fn hits(&self) -> u64 { self.hits.load(Ordering::Relaxed) }

  pub fn misses(&self) -> u64 { self.misses.load(Ordering::Relaxed) }
}

// ─── CachedFetcher ───────────────────────────────────────────────────────────

/// A [`Fetch`] that answers from a [`FileCache`] and falls through to `inner`
/// on a miss. Failed fetches are never cached.
#[derive(Debug)]
pub struct CachedFetcher<F> {
  inner: F,
  cache: FileCache,
}

impl<F> CachedFetcher<F> {
  pub fn new(inner: F, cache: FileCache) -> Self { Self { inner, cache } }

  pub fn cache(&self) -> &FileCache { &self.cache }
}

impl<F: Fetch> Fetch for CachedFetcher<F> {
  async fn fetch(&self, url: &str) -> wikiparl_core::Result<serde_json::Value> {
    if let Some(value) = self.cache.get(url).await {
      debug!(url, "cache hit");
      return Ok(value);
    }

    debug!(url, "cache miss");
    let value = self.inner.fetch(url).await?;
    if let Err(e) = self.cache.put(url, &value).await {
      warn!(url, error = %e, "failed to write cache entry");
    }
    Ok(value)
  }
}

//! Error type for setting up crawl components.
//!
//! Failures while crawling are not errors of this type: they are recorded per
//! URL as [`crate::CrawlFailure`] and the crawl continues.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("cache directory error: {0}")]
  Io(#[from] std::io::Error),

  #[error("http client error: {0}")]
  Http(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

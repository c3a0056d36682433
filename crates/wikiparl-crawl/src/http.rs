//! [`HttpFetcher`]: the network side of the fetch capability.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use wikiparl_core::{Error as CoreError, fetch::Fetch};

use crate::Result;

/// Connection settings for the source API.
#[derive(Debug, Clone)]
pub struct HttpConfig {
  /// Per-request timeout.
  pub timeout:     Duration,
  /// Retries after the first attempt; `0` disables retrying.
  pub max_retries: u32,
  /// Delay before the first retry; doubled for every further retry.
  pub backoff:     Duration,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      timeout:     Duration::from_secs(30),
      max_retries: 3,
      backoff:     Duration::from_millis(500),
    }
  }
}

/// Async HTTP client for JSON documents.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
  client: Client,
  config: HttpConfig,
}

impl HttpFetcher {
  pub fn new(config: HttpConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .user_agent(concat!("wikiparl/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client, config })
  }

  async fn attempt(&self, url: &str) -> reqwest::Result<serde_json::Value> {
    self
      .client
      .get(url)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await
  }
}

/// Whether a failed request may succeed when repeated.
fn is_retryable(e: &reqwest::Error) -> bool {
  if e.is_timeout() || e.is_connect() || e.is_request() {
    return true;
  }
  e.status().is_some_and(|s| s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS)
}

impl Fetch for HttpFetcher {
  async fn fetch(&self, url: &str) -> wikiparl_core::Result<serde_json::Value> {
    let mut retries = 0;
    loop {
      match self.attempt(url).await {
        Ok(value) => {
          debug!(url, retries, "fetched");
          return Ok(value);
        }
        Err(e) if retries < self.config.max_retries && is_retryable(&e) => {
          let delay = self.config.backoff * 2u32.saturating_pow(retries);
          retries += 1;
          warn!(url, error = %e, retries, ?delay, "fetch failed, retrying");
          tokio::time::sleep(delay).await;
        }
        Err(e) => return Err(CoreError::transient(url, e)),
      }
    }
  }
}

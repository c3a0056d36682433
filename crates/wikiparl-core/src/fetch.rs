//! The fetch capability consumed by the traversal engine.

use std::future::Future;

use crate::Result;

/// Fetch a JSON document by URL.
///
/// Implementations must fail with [`crate::Error::TransientFetch`] on network
/// errors and non-success statuses.
pub trait Fetch: Send + Sync {
  fn fetch<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<serde_json::Value>> + Send + 'a;
}

impl<T: Fetch> Fetch for &T {
  fn fetch<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<serde_json::Value>> + Send + 'a {
    (**self).fetch(url)
  }
}

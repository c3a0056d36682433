//! Discovery of the full record graph behind a paginated, cyclically linked
//! API.
//!
//! - [`cache`]: content-addressed on-disk cache in front of any fetcher.
//! - [`http`]: the network fetcher (bounded timeout, capped retries).
//! - [`discover`]: pure extraction of outgoing links from one record.
//! - [`traverse`]: the breadth-first worklist that yields each record once.

pub mod cache;
pub mod discover;
pub mod error;
pub mod http;
pub mod memory;
pub mod traverse;

pub use error::{Error, Result};
pub use traverse::{CrawlFailure, Crawler};

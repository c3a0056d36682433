//! Two-pass import of crawled records into a knowledge base.
//!
//! Records are committed as soon as the crawler yields them. A
//! cross-reference to a record that has no item yet is deferred instead of
//! failing the record, and all deferred claims are written in a second pass
//! once discovery is complete.

pub mod claims;
pub mod engine;
pub mod error;
pub mod links;
pub mod mapper;
pub mod report;
pub mod schema;

pub use engine::{Importer, Phase};
pub use error::{Error, Result};
pub use report::ImportReport;

#[cfg(test)]
mod testing;

//! Error taxonomy shared by the traversal and import engines.
//!
//! Only configuration and schema-load errors are fatal to a run. Every other
//! variant is attached to a single record or URL and surfaces in the run
//! report.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Network or remote failure. Retried by re-running; the cache absorbs the
  /// cost of everything fetched before.
  #[error("transient fetch error for {url}: {reason}")]
  TransientFetch { url: String, reason: String },

  /// A record without a usable `id`. Dropped, never retried.
  #[error("record without identity: {context}")]
  MissingIdentity { context: String },

  #[error("data integrity error in {record_id} field {field:?}: {reason}")]
  DataIntegrity {
    record_id: String,
    field:     String,
    reason:    String,
  },

  /// A cross-reference whose target was never imported.
  #[error("unresolved reference from {record_id} field {field:?} to {target}")]
  UnresolvedReference {
    record_id: String,
    field:     String,
    target:    String,
  },

  /// A property registration clashed with an existing property and the
  /// existing id could not be recovered.
  #[error("property {field:?} already exists and its id could not be recovered")]
  MappingConflict { field: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn transient(url: impl Into<String>, reason: impl ToString) -> Self {
    Self::TransientFetch { url: url.into(), reason: reason.to_string() }
  }

  pub fn integrity(
    record_id: impl Into<String>,
    field: impl Into<String>,
    reason: impl Into<String>,
  ) -> Self {
    Self::DataIntegrity {
      record_id: record_id.into(),
      field:     field.into(),
      reason:    reason.into(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

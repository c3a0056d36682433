//! Error type for `wikiparl-import`.
//!
//! Per-record problems never surface here; they are collected in the
//! [`crate::ImportReport`]. These errors end a run.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("schema error in {}: {reason}", path.display())]
  Schema { path: PathBuf, reason: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("property registration for {field:?} failed: {source}")]
  Registration {
    field:  String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("state store error: {0}")]
  State(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Core(#[from] wikiparl_core::Error),
}

impl Error {
  pub(crate) fn state(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::State(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

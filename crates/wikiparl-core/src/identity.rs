//! Identities on both sides of the import.
//!
//! Source records are identified by their `id` URL. Destination items and
//! properties are identified by opaque store-assigned ids (`Q42`, `P7`).

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable SHA-256 hex digest of a record identity, used for visited-set
/// membership during traversal.
pub fn identity_hash(record_id: &str) -> String {
  hex::encode(Sha256::digest(record_id.as_bytes()))
}

/// Id of an item in the destination knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

/// Id of a property in the destination knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub String);

impl ItemId {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl PropertyId {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ItemId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl fmt::Display for PropertyId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for ItemId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<&str> for PropertyId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

//! The field mapping: source field name → destination property and value kind.
//!
//! Built once per run by the schema mapper and persisted by the state store.
//! The same field must map to the same property on every run, otherwise
//! previously imported items silently desync.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::PropertyId;

/// Synthetic property carrying the URL of an externally paginated list.
pub const EXTERNAL_LIST_PROPERTY: &str = "externalList";

/// How a field's values are turned into claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
  Text,
  Url,
  CrossReference,
  Timestamp,
}

impl ValueKind {
  /// The discriminant stored in the `value_kind` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Text => "text",
      Self::Url => "url",
      Self::CrossReference => "cross_reference",
      Self::Timestamp => "timestamp",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "text" => Some(Self::Text),
      "url" => Some(Self::Url),
      "cross_reference" => Some(Self::CrossReference),
      "timestamp" => Some(Self::Timestamp),
      _ => None,
    }
  }
}

/// Where one source field lands in the destination store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
  pub property: PropertyId,
  pub kind:     ValueKind,
}

/// `field_name → FieldSpec` for every field seen across all type schemas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
  fields: BTreeMap<String, FieldSpec>,
}

impl FieldMapping {
  pub fn new() -> Self { Self::default() }

  pub fn get(&self, field: &str) -> Option<&FieldSpec> { self.fields.get(field) }

  pub fn contains(&self, field: &str) -> bool { self.fields.contains_key(field) }

  /// Insert a spec. Returns the previous spec, if any.
  pub fn insert(&mut self, field: impl Into<String>, spec: FieldSpec) -> Option<FieldSpec> {
    self.fields.insert(field.into(), spec)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
    self.fields.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize { self.fields.len() }

  pub fn is_empty(&self) -> bool { self.fields.is_empty() }
}

impl FromIterator<(String, FieldSpec)> for FieldMapping {
  fn from_iter<T: IntoIterator<Item = (String, FieldSpec)>>(iter: T) -> Self {
    Self { fields: iter.into_iter().collect() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_discriminants_parse_back() {
    for kind in [
      ValueKind::Text,
      ValueKind::Url,
      ValueKind::CrossReference,
      ValueKind::Timestamp,
    ] {
      assert_eq!(ValueKind::parse(kind.as_str()), Some(kind));
    }
    assert_eq!(ValueKind::parse("item"), None);
  }
}

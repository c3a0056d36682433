//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings.

use chrono::{DateTime, Utc};
use wikiparl_core::{
  identity::PropertyId,
  mapping::{FieldSpec, ValueKind},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `field_mappings` row.
pub struct RawFieldSpec {
  pub field_name:  String,
  pub property_id: String,
  pub value_kind:  String,
}

impl RawFieldSpec {
  pub fn into_spec(self) -> Result<(String, FieldSpec)> {
    let kind = ValueKind::parse(&self.value_kind).ok_or_else(|| Error::UnknownValueKind {
      field: self.field_name.clone(),
      kind:  self.value_kind.clone(),
    })?;
    Ok((self.field_name, FieldSpec { property: PropertyId(self.property_id), kind }))
  }
}

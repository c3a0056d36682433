//! Claim building: one record → claims, deferred claims, and rejects.
//!
//! Each field is looked up in the field mapping and each of its values is
//! converted according to the field's [`ValueKind`]. Conversion never fails a
//! record: a value that cannot become a claim is rejected individually, and a
//! cross-reference to a record without an item is deferred.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use wikiparl_core::{
  claim::{Claim, ClaimValue, DeferredClaim, PRECISION_DAY},
  mapping::{FieldMapping, FieldSpec, ValueKind},
  record::{Record, Value},
};

use crate::links::IdentityLinks;

/// Longest text value the destination store accepts, in characters.
pub const MAX_TEXT_LEN: usize = 390;

/// Timestamp some source systems emit for "no date".
pub const INVALID_TIMESTAMP: &str = "-0001-11-30T00:00:00+01:00";

/// What invalid sentinel timestamps are replaced with.
pub const MIN_DATE: &str = "+0001-01-01T00:00:00Z";

/// Characters removed from text values.
const HOSTILE_CHARS: &[char] = &['„', '“'];

// ─── Output ──────────────────────────────────────────────────────────────────

/// A single value that was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejected {
  pub record_id: String,
  pub field:     String,
  pub value:     String,
  pub reason:    String,
}

/// Everything claim building produced for one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimSet {
  pub claims:   Vec<Claim>,
  pub deferred: Vec<DeferredClaim>,
  pub rejected: Vec<Rejected>,
}

/// Result of converting a single value.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
  Claim(Claim),
  /// The referenced record has no item yet.
  Pending,
  Rejected(String),
}

// ─── Building ────────────────────────────────────────────────────────────────

/// Build the claims of `record`.
///
/// Fields missing from `mapping` are skipped silently: they are schema
/// additions the mapper does not know yet.
pub fn build_claims(record: &Record, mapping: &FieldMapping, links: &IdentityLinks) -> ClaimSet {
  let record_id = record.id().unwrap_or_default();
  let mut set = ClaimSet::default();

  for (field, value) in record.fields() {
    if value.is_empty() {
      continue;
    }
    let Some(spec) = mapping.get(field) else {
      continue;
    };

    let values = match value {
      Value::List(items) => items.as_slice(),
      single => std::slice::from_ref(single),
    };

    for value in values.iter().filter(|v| !v.is_empty()) {
      let reject = |value: String, reason: String| Rejected {
        record_id: record_id.to_owned(),
        field: field.to_owned(),
        value,
        reason,
      };
      let Some(raw) = value.as_scalar_text() else {
        set.rejected.push(reject(String::new(), "nested value where a scalar was expected".into()));
        continue;
      };

      match convert(spec, &raw, links) {
        Conversion::Claim(claim) => set.claims.push(claim),
        Conversion::Pending => set.deferred.push(DeferredClaim {
          owning_record_id: record_id.to_owned(),
          field_name:       field.to_owned(),
          raw_value:        raw,
        }),
        Conversion::Rejected(reason) => set.rejected.push(reject(raw, reason)),
      }
    }
  }

  set
}

/// Retry a deferred claim against the current identity links.
pub fn resolve(deferred: &DeferredClaim, mapping: &FieldMapping, links: &IdentityLinks) -> Conversion {
  match mapping.get(&deferred.field_name) {
    Some(spec) => convert(spec, &deferred.raw_value, links),
    None => Conversion::Rejected(format!("field {:?} is no longer mapped", deferred.field_name)),
  }
}

/// Convert one raw value according to its field spec.
pub fn convert(spec: &FieldSpec, raw: &str, links: &IdentityLinks) -> Conversion {
  let value = match spec.kind {
    ValueKind::Text => match sanitize_text(raw) {
      Some(text) => ClaimValue::Text(text),
      None => return Conversion::Rejected("empty after sanitizing".to_owned()),
    },
    ValueKind::Url => match check_url(raw) {
      Ok(url) => ClaimValue::Url(url.to_owned()),
      Err(reason) => return Conversion::Rejected(reason.to_owned()),
    },
    ValueKind::Timestamp => match normalize_timestamp(raw) {
      Some(time) => ClaimValue::Time { time, precision: PRECISION_DAY },
      None => return Conversion::Rejected("unparseable timestamp".to_owned()),
    },
    ValueKind::CrossReference => match links.get(raw) {
      Some(item) => ClaimValue::Item(item.clone()),
      None => return Conversion::Pending,
    },
  };
  Conversion::Claim(Claim::new(spec.property.clone(), value))
}

// ─── Value conversions ───────────────────────────────────────────────────────

/// Strip control and typographic quote characters and truncate to
/// [`MAX_TEXT_LEN`]. Returns `None` if nothing is left.
pub fn sanitize_text(raw: &str) -> Option<String> {
  let cleaned: String = raw
    .chars()
    .filter(|c| !c.is_control() && !HOSTILE_CHARS.contains(c))
    .take(MAX_TEXT_LEN)
    .collect();
  let trimmed = cleaned.trim();
  (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Reject URLs that are empty or obviously malformed. A leading `<` marks an
/// unexpanded template placeholder.
pub fn check_url(raw: &str) -> Result<&str, &'static str> {
  let url = raw.trim();
  if url.is_empty() {
    Err("empty url")
  } else if url.starts_with('<') {
    Err("unresolved template placeholder")
  } else if url.chars().any(char::is_whitespace) {
    Err("url contains whitespace")
  } else {
    Ok(url)
  }
}

/// Parse a timestamp permissively and normalize it to day precision in the
/// form `+YYYY-MM-DDT00:00:00Z`. The calendar date is taken in the
/// timestamp's own offset.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
  let raw = raw.trim();
  if is_invalid_sentinel(raw) {
    return Some(MIN_DATE.to_owned());
  }

  let date = parse_date(raw)?;
  if date.year() < 1 {
    return Some(MIN_DATE.to_owned());
  }
  Some(format!("+{:04}-{:02}-{:02}T00:00:00Z", date.year(), date.month(), date.day()))
}

fn is_invalid_sentinel(raw: &str) -> bool {
  raw == INVALID_TIMESTAMP || raw.starts_with("-0001-11-30") || raw.starts_with("0000-00-00")
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.date_naive());
  }
  for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
    if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
      return Some(dt.date_naive());
    }
  }
  for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
      return Some(dt.date());
    }
  }
  ["%Y-%m-%d", "%d.%m.%Y"]
    .into_iter()
    .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

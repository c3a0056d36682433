//! Record: one importable unit from the source API.
//!
//! Source payloads are arbitrary JSON objects. They are converted once into a
//! tagged [`Value`] union; every later decision (what is a link, what becomes
//! which claim) is made from the field mapping, never by re-inspecting JSON.

use std::collections::BTreeMap;

use serde_json::Number;

use crate::{Error, Result};

/// Name of the identity field. Its value is a stable URL.
pub const ID_FIELD: &str = "id";
/// Name of the field carrying the canonical type URL.
pub const TYPE_FIELD: &str = "type";

// ─── Value ───────────────────────────────────────────────────────────────────

/// A single field value as it arrived from the source API.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Bool(bool),
  Number(Number),
  Text(String),
  List(Vec<Value>),
  Record(Record),
}

impl Value {
  /// Null, the empty string and the empty list carry nothing to claim.
  pub fn is_empty(&self) -> bool {
    match self {
      Self::Null => true,
      Self::Text(s) => s.is_empty(),
      Self::List(items) => items.is_empty(),
      _ => false,
    }
  }

  /// Render a scalar as text. Lists and records have no scalar form.
  pub fn as_scalar_text(&self) -> Option<String> {
    match self {
      Self::Bool(b) => Some(b.to_string()),
      Self::Number(n) => Some(n.to_string()),
      Self::Text(s) => Some(s.clone()),
      Self::Null | Self::List(_) | Self::Record(_) => None,
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn is_scalar(&self) -> bool {
    !matches!(self, Self::List(_) | Self::Record(_))
  }
}

impl From<serde_json::Value> for Value {
  fn from(json: serde_json::Value) -> Self {
    match json {
      serde_json::Value::Null => Self::Null,
      serde_json::Value::Bool(b) => Self::Bool(b),
      serde_json::Value::Number(n) => Self::Number(n),
      serde_json::Value::String(s) => Self::Text(s),
      serde_json::Value::Array(items) => {
        Self::List(items.into_iter().map(Self::from).collect())
      }
      serde_json::Value::Object(map) => Self::Record(Record {
        fields: map.into_iter().map(|(k, v)| (k, Self::from(v))).collect(),
      }),
    }
  }
}

impl From<Value> for serde_json::Value {
  fn from(value: Value) -> Self {
    match value {
      Value::Null => Self::Null,
      Value::Bool(b) => Self::Bool(b),
      Value::Number(n) => Self::Number(n),
      Value::Text(s) => Self::String(s),
      Value::List(items) => Self::Array(items.into_iter().map(Into::into).collect()),
      Value::Record(record) => record.into(),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A mapping of field name to [`Value`]. Field order is the lexical order of
/// the names, which keeps claim order deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
  fields: BTreeMap<String, Value>,
}

impl Record {
  pub fn new() -> Self { Self::default() }

  /// The record's identity, if it has a non-empty textual `id`.
  pub fn id(&self) -> Option<&str> {
    self.fields.get(ID_FIELD).and_then(Value::as_text).filter(|s| !s.is_empty())
  }

  /// The canonical type URL, e.g. `https://schema.oparl.org/1.0/Person`.
  pub fn kind(&self) -> Option<&str> {
    self.fields.get(TYPE_FIELD).and_then(Value::as_text)
  }

  /// The last path segment of the type URL (`Person`).
  pub fn kind_name(&self) -> Option<&str> {
    self.kind().and_then(|k| k.trim_end_matches('/').rsplit('/').next())
  }

  pub fn get(&self, field: &str) -> Option<&Value> { self.fields.get(field) }

  pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
    self.fields.insert(field.into(), value.into());
  }

  pub fn remove(&mut self, field: &str) -> Option<Value> { self.fields.remove(field) }

  pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.fields.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn field_names(&self) -> impl Iterator<Item = &str> {
    self.fields.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize { self.fields.len() }

  pub fn is_empty(&self) -> bool { self.fields.is_empty() }

  pub(crate) fn into_fields(self) -> BTreeMap<String, Value> { self.fields }

  pub(crate) fn from_fields(fields: BTreeMap<String, Value>) -> Self { Self { fields } }
}

impl TryFrom<serde_json::Value> for Record {
  type Error = Error;

  /// Only JSON objects are records.
  fn try_from(json: serde_json::Value) -> Result<Self> {
    match Value::from(json) {
      Value::Record(record) => Ok(record),
      other => Err(Error::MissingIdentity {
        context: format!("expected a JSON object, got {}", describe(&other)),
      }),
    }
  }
}

impl From<Record> for serde_json::Value {
  fn from(record: Record) -> Self {
    Self::Object(record.fields.into_iter().map(|(k, v)| (k, v.into())).collect())
  }
}

impl From<Record> for Value {
  fn from(record: Record) -> Self { Self::Record(record) }
}

pub(crate) fn describe(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::Text(_) => "a string",
    Value::List(_) => "a list",
    Value::Record(_) => "an object",
  }
}

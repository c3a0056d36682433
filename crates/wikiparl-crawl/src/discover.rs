//! Pure link discovery: which URLs of a record lead to further records.
//!
//! Discovery does no I/O and keeps no state. The traversal engine decides
//! what to do with the links it returns.

use std::collections::BTreeSet;

use wikiparl_core::record::{Record, Value};

/// Which fields hold links, derived from the type schemas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFields {
  references: BTreeSet<String>,
  lists:      BTreeSet<String>,
}

impl LinkFields {
  pub fn new() -> Self { Self::default() }

  /// Declare `field` as holding URLs of single records.
  pub fn reference(mut self, field: impl Into<String>) -> Self {
    self.add_reference(field);
    self
  }

  /// Declare `field` as holding URLs of paginated collections.
  pub fn list(mut self, field: impl Into<String>) -> Self {
    self.add_list(field);
    self
  }

  pub fn add_reference(&mut self, field: impl Into<String>) { self.references.insert(field.into()); }

  pub fn add_list(&mut self, field: impl Into<String>) { self.lists.insert(field.into()); }

  pub fn is_reference(&self, field: &str) -> bool { self.references.contains(field) }

  pub fn is_list(&self, field: &str) -> bool { self.lists.contains(field) }
}

/// An outgoing link found on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
  /// The URL of a single record.
  Record(String),
  /// The URL of the first page of a paginated collection.
  List(String),
}

/// Every link on `record`, in field order.
pub fn discover(record: &Record, fields: &LinkFields) -> Vec<Link> {
  let mut links = Vec::new();
  for (name, value) in record.fields() {
    let make: fn(String) -> Link = if fields.is_list(name) {
      Link::List
    } else if fields.is_reference(name) {
      Link::Record
    } else {
      continue;
    };

    for url in urls(value) {
      links.push(make(url.to_owned()));
    }
  }
  links
}

fn urls(value: &Value) -> Vec<&str> {
  match value {
    Value::Text(s) if !s.is_empty() => vec![s.as_str()],
    Value::List(items) => items
      .iter()
      .filter_map(Value::as_text)
      .filter(|s| !s.is_empty())
      .collect(),
    _ => Vec::new(),
  }
}

// ─── Pages ───────────────────────────────────────────────────────────────────

/// One page of a paginated collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
  pub items: Vec<serde_json::Value>,
  pub next:  Option<String>,
}

/// Parse a collection page: `{ "data": [...], "links": { "next": url } }`.
///
/// A `pagination.next` cursor is accepted when `links.next` is absent.
/// Returns `None` when the payload is not a page at all.
pub fn parse_page(payload: serde_json::Value) -> Option<Page> {
  let serde_json::Value::Object(mut map) = payload else {
    return None;
  };
  let serde_json::Value::Array(items) = map.remove("data")? else {
    return None;
  };

  let cursor = |section: &str| {
    map
      .get(section)
      .and_then(|s| s.get("next"))
      .and_then(serde_json::Value::as_str)
      .filter(|s| !s.is_empty())
      .map(str::to_owned)
  };
  let next = cursor("links").or_else(|| cursor("pagination"));

  Some(Page { items, next })
}

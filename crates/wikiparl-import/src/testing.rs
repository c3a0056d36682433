//! Test doubles shared by the unit tests of this crate.

use std::{
  collections::{HashMap, HashSet},
  sync::Mutex,
};

use wikiparl_core::{
  claim::Claim,
  identity::{ItemId, PropertyId},
  mapping::{FieldMapping, FieldSpec, ValueKind},
  writer::{ItemWriter, Registration, WriteMode},
};

pub const PERSON: &str = "https://example.org/oparl/person/1";
pub const ORG: &str = "https://example.org/oparl/organization/1";

/// The mapping most tests run against.
pub fn mapping() -> FieldMapping {
  [
    ("id", "P1", ValueKind::Url),
    ("name", "P2", ValueKind::Text),
    ("type", "P3", ValueKind::Url),
    ("organization", "P4", ValueKind::CrossReference),
    ("startDate", "P5", ValueKind::Timestamp),
    ("keyword", "P6", ValueKind::Text),
    ("accessUrl", "P7", ValueKind::Url),
  ]
  .into_iter()
  .map(|(field, property, kind)| {
    (field.to_owned(), FieldSpec { property: PropertyId::from(property), kind })
  })
  .collect()
}

/// One call to [`ItemWriter::write`].
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
  /// `None` for a create.
  pub item:   Option<ItemId>,
  pub claims: Vec<Claim>,
  pub label:  String,
  pub mode:   WriteMode,
}

#[derive(Debug, thiserror::Error)]
#[error("write refused for {0}")]
pub struct Refused(String);

/// An item writer that records every call and hands out `Q1`, `Q2`, ...
///
/// It also keeps the statements each item ends up with, applying
/// [`WriteMode`] the way the destination store does.
#[derive(Debug, Default)]
pub struct FakeWriter {
  writes:        Mutex<Vec<Write>>,
  items:         Mutex<HashMap<ItemId, Vec<Claim>>>,
  properties:    Mutex<HashMap<String, PropertyId>>,
  registrations: Mutex<Vec<String>>,
  refuse:        HashSet<String>,
}

impl FakeWriter {
  pub fn new() -> Self { Self::default() }

  /// Pretend the destination store already has a property named `name`.
  pub fn with_property(self, name: &str, id: &str) -> Self {
    self.properties.lock().unwrap().insert(name.to_owned(), PropertyId::from(id));
    self
  }

  /// Fail every write for the record labelled `label`.
  pub fn refusing(mut self, label: &str) -> Self {
    self.refuse.insert(label.to_owned());
    self
  }

  pub fn writes(&self) -> Vec<Write> { self.writes.lock().unwrap().clone() }

  pub fn creates(&self) -> usize { self.writes().iter().filter(|w| w.item.is_none()).count() }

  /// The statements `item` holds now.
  pub fn statements(&self, item: &ItemId) -> Vec<Claim> {
    self.items.lock().unwrap().get(item).cloned().unwrap_or_default()
  }

  pub fn registrations(&self) -> Vec<String> { self.registrations.lock().unwrap().clone() }
}

impl ItemWriter for FakeWriter {
  type Error = Refused;

  async fn write(
    &self,
    item: Option<&ItemId>,
    claims: &[Claim],
    label: &str,
    mode: WriteMode,
  ) -> Result<ItemId, Refused> {
    if self.refuse.contains(label) {
      return Err(Refused(label.to_owned()));
    }

    let mut writes = self.writes.lock().unwrap();
    let id = match item {
      Some(id) => id.clone(),
      None => ItemId(format!("Q{}", writes.iter().filter(|w| w.item.is_none()).count() + 1)),
    };
    writes.push(Write {
      item: item.cloned(),
      claims: claims.to_vec(),
      label: label.to_owned(),
      mode,
    });

    let mut items = self.items.lock().unwrap();
    let statements = items.entry(id.clone()).or_default();
    if mode == WriteMode::Replace {
      statements.retain(|old| !claims.iter().any(|new| new.property == old.property));
    }
    statements.extend_from_slice(claims);
    Ok(id)
  }

  async fn register_property(&self, name: &str, _kind: ValueKind) -> Result<Registration, Refused> {
    self.registrations.lock().unwrap().push(name.to_owned());

    let mut properties = self.properties.lock().unwrap();
    if let Some(id) = properties.get(name) {
      return Ok(Registration::Existing(id.clone()));
    }
    let id = PropertyId(format!("P{}", 100 + properties.len()));
    properties.insert(name.to_owned(), id.clone());
    Ok(Registration::Created(id))
  }
}

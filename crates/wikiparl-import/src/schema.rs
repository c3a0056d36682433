//! Type schemas: loading and field classification.
//!
//! A schema directory holds one JSON Schema document per record type
//! (`Body.json`, `Person.json`, ...). Only the parts needed to classify
//! fields are read: `type`, `format`, `references` and array `items`.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use serde::Deserialize;
use wikiparl_core::{mapping::ValueKind, record::TYPE_FIELD};
use wikiparl_crawl::discover::LinkFields;

use crate::{Error, Result};

/// `references` value marking a field as the URL of a paginated collection.
pub const EXTERNAL_LIST: &str = "externalList";

/// The schema of one record type.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeSchema {
  pub title:      String,
  #[serde(default)]
  pub properties: BTreeMap<String, PropertySchema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertySchema {
  #[serde(rename = "type")]
  pub ty:         Option<String>,
  pub format:     Option<String>,
  /// The type the URL points at, or [`EXTERNAL_LIST`].
  pub references: Option<String>,
  pub items:      Option<Box<PropertySchema>>,
}

/// How a single field is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldClass {
  pub kind:          ValueKind,
  /// The field holds URLs of paginated collections.
  pub external_list: bool,
}

impl PropertySchema {
  /// The schema of the values themselves: `items` for arrays.
  fn element(&self) -> &PropertySchema {
    match (self.ty.as_deref(), self.items.as_deref()) {
      (Some("array"), Some(items)) => items,
      _ => self,
    }
  }

  fn is_url(&self) -> bool {
    self.ty.as_deref() == Some("string") && self.format.as_deref() == Some("url")
  }
}

/// Classify a field from its schema.
///
/// Timestamps are recognised from the `date-time` and `date` format tags
/// only.
pub fn classify(name: &str, property: &PropertySchema) -> FieldClass {
  let element = property.element();
  let external_list = element.is_url() && element.references.as_deref() == Some(EXTERNAL_LIST);

  let kind = if name == TYPE_FIELD {
    ValueKind::Url
  } else if element.is_url() {
    match element.references.as_deref() {
      Some(EXTERNAL_LIST) | None => ValueKind::Url,
      Some(_) => ValueKind::CrossReference,
    }
  } else if element.ty.as_deref() == Some("string")
    && matches!(element.format.as_deref(), Some("date-time" | "date"))
  {
    ValueKind::Timestamp
  } else {
    ValueKind::Text
  };

  FieldClass { kind, external_list }
}

/// Which fields the crawler follows.
pub fn link_fields(schemas: &[TypeSchema]) -> LinkFields {
  let mut links = LinkFields::new();
  for (name, property) in schemas.iter().flat_map(|s| &s.properties) {
    let class = classify(name, property);
    if class.external_list {
      links.add_list(name.as_str());
    } else if class.kind == ValueKind::CrossReference {
      links.add_reference(name.as_str());
    }
  }
  links
}

/// Load every `*.json` file in `dir`, in file name order.
pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<TypeSchema>> {
  let mut paths: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
    .map(|entry| entry.map(|e| e.path()))
    .collect::<std::io::Result<_>>()?;
  paths.retain(|p| p.extension().is_some_and(|ext| ext == "json"));
  paths.sort();

  paths.iter().map(|path| load_file(path)).collect()
}

pub fn load_file(path: &Path) -> Result<TypeSchema> {
  let raw = std::fs::read_to_string(path)?;
  serde_json::from_str(&raw).map_err(|e| Error::Schema {
    path:   path.to_path_buf(),
    reason: e.to_string(),
  })
}

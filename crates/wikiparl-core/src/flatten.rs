//! Flattening of nested records.
//!
//! Source objects embed other objects (a person embeds its memberships, a
//! meeting its agenda items). Each embedded object is imported as an item of
//! its own; the embedding record keeps no trace of it. Vendor extension fields
//! (`vendor:field`) have no property mapping and are dropped here.

use std::collections::BTreeMap;

use crate::{
  Error, Result,
  record::{Record, TYPE_FIELD, Value, describe},
};

/// Separator marking a vendor extension field name.
const NAMESPACE_SEPARATOR: char = ':';

/// GeoJSON object types, which are kept as a single text value rather than
/// extracted as records.
const GEOJSON_TYPES: &[&str] = &[
  "Feature",
  "FeatureCollection",
  "Point",
  "MultiPoint",
  "LineString",
  "MultiLineString",
  "Polygon",
  "MultiPolygon",
  "GeometryCollection",
];

/// A record with its embedded records pulled out.
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
  pub primary:  Record,
  pub embedded: Vec<Record>,
}

/// Split `record` into its primary part and the records it embeds.
///
/// Embedded records are returned as-is; they are flattened in turn when they
/// are visited themselves.
pub fn flatten(record: Record) -> Result<Flattened> {
  let record_id = record.id().unwrap_or("<anonymous>").to_owned();
  let mut primary = BTreeMap::new();
  let mut embedded = Vec::new();

  for (field, value) in record.into_fields() {
    if field.contains(NAMESPACE_SEPARATOR) {
      continue;
    }

    match value {
      Value::Record(inner) if is_geojson(&inner) => {
        let json = serde_json::Value::from(inner).to_string();
        primary.insert(field, Value::Text(json));
      }
      Value::Record(inner) => embedded.push(inner),
      Value::List(items) if items.iter().any(|v| matches!(v, Value::Record(_))) => {
        for item in items {
          match item {
            Value::Record(inner) => embedded.push(inner),
            other => {
              return Err(Error::integrity(
                &record_id,
                &field,
                format!("list mixes objects with {}", describe(&other)),
              ));
            }
          }
        }
      }
      Value::List(items) => {
        if let Some(bad) = items.iter().find(|v| !v.is_scalar()) {
          return Err(Error::integrity(
            &record_id,
            &field,
            format!("list contains {}", describe(bad)),
          ));
        }
        primary.insert(field, Value::List(items));
      }
      scalar => {
        primary.insert(field, scalar);
      }
    }
  }

  Ok(Flattened { primary: Record::from_fields(primary), embedded })
}

fn is_geojson(record: &Record) -> bool {
  record.id().is_none()
    && record
      .get(TYPE_FIELD)
      .and_then(Value::as_text)
      .is_some_and(|t| GEOJSON_TYPES.contains(&t))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn record(json: serde_json::Value) -> Record { Record::try_from(json).unwrap() }

  #[test]
  fn extracts_nested_objects_and_lists() {
    let person = record(json!({
      "id": "https://example.org/person/1",
      "type": "https://schema.oparl.org/1.0/Person",
      "name": "Ada",
      "location": { "id": "https://example.org/location/1" },
      "membership": [
        { "id": "https://example.org/membership/1" },
        { "id": "https://example.org/membership/2" },
      ],
    }));

    let out = flatten(person).unwrap();

    assert_eq!(out.embedded.len(), 3);
    assert!(out.primary.get("location").is_none());
    assert!(out.primary.get("membership").is_none());
    assert_eq!(out.primary.get("name"), Some(&Value::from("Ada")));
    assert_eq!(out.primary.id(), Some("https://example.org/person/1"));
  }

  #[test]
  fn drops_vendor_fields() {
    let body = record(json!({
      "id": "https://example.org/body/1",
      "ris:internalId": "42",
      "ris:extra": { "id": "https://example.org/x" },
    }));

    let out = flatten(body).unwrap();
    assert!(out.embedded.is_empty());
    assert_eq!(out.primary.field_names().collect::<Vec<_>>(), vec!["id"]);
  }

  #[test]
  fn keeps_scalar_lists() {
    let meeting = record(json!({
      "id": "https://example.org/meeting/1",
      "keyword": ["budget", "parks"],
    }));
    let out = flatten(meeting).unwrap();
    assert!(matches!(out.primary.get("keyword"), Some(Value::List(items)) if items.len() == 2));
  }

  #[test]
  fn keeps_geojson_as_text() {
    let location = record(json!({
      "id": "https://example.org/location/1",
      "geojson": { "type": "Feature", "geometry": { "type": "Point", "coordinates": [1, 2] } },
    }));
    let out = flatten(location).unwrap();
    assert!(out.embedded.is_empty());
    assert!(matches!(out.primary.get("geojson"), Some(Value::Text(t)) if t.contains("Point")));
  }

  #[test]
  fn mixed_list_is_an_integrity_error() {
    let paper = record(json!({
      "id": "https://example.org/paper/1",
      "auxiliaryFile": [{ "id": "https://example.org/file/1" }, "oops"],
    }));
    match flatten(paper).unwrap_err() {
      Error::DataIntegrity { record_id, field, .. } => {
        assert_eq!(record_id, "https://example.org/paper/1");
        assert_eq!(field, "auxiliaryFile");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn nested_lists_are_an_integrity_error() {
    let paper = record(json!({
      "id": "https://example.org/paper/1",
      "matrix": [[1, 2], [3]],
    }));
    assert!(matches!(flatten(paper), Err(Error::DataIntegrity { .. })));
  }
}

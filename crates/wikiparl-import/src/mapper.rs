//! Schema-to-property mapper.
//!
//! Every field across all type schemas gets a destination property. Fields
//! already in the stored mapping keep their property; new fields are
//! registered with the writer and persisted one by one, so an interrupted
//! run keeps whatever it registered.
//!
//! Fields that point at an external list (`person`, `paper`, ...) all share
//! the single `externalList` property.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use wikiparl_core::{
  mapping::{EXTERNAL_LIST_PROPERTY, FieldMapping, FieldSpec, ValueKind},
  state::StateStore,
  writer::{ItemWriter, Registration},
};

use crate::{
  Error, Result,
  schema::{FieldClass, TypeSchema, classify},
};

/// Build the field mapping for `schemas`, registering missing properties.
pub async fn build_mapping<S, W>(schemas: &[TypeSchema], state: &S, writer: &W) -> Result<FieldMapping>
where
  S: StateStore,
  W: ItemWriter,
{
  let mut mapping = state.field_mapping().await.map_err(Error::state)?;
  let known = mapping.len();

  let wanted = classify_all(schemas);
  let needs_external_list = wanted.values().any(|class| class.external_list);
  if needs_external_list && !mapping.contains(EXTERNAL_LIST_PROPERTY) {
    register(EXTERNAL_LIST_PROPERTY, ValueKind::Url, &mut mapping, state, writer).await?;
  }

  for (field, class) in &wanted {
    match mapping.get(field) {
      Some(spec) if spec.kind != class.kind => warn!(
        field = %field,
        stored = spec.kind.as_str(),
        schema = class.kind.as_str(),
        "value kind changed in schema, keeping stored mapping"
      ),
      Some(_) => {}
      None if class.external_list => {
        let Some(list) = mapping.get(EXTERNAL_LIST_PROPERTY).cloned() else {
          continue;
        };
        debug!(field = %field, property = %list.property, "external list field");
        state.put_field(field, &list).await.map_err(Error::state)?;
        mapping.insert(*field, list);
      }
      None => register(field, class.kind, &mut mapping, state, writer).await?,
    }
  }

  info!(fields = mapping.len(), new = mapping.len() - known, "field mapping ready");
  Ok(mapping)
}

/// Classify every field. A field declared by several types keeps the
/// classification of the first schema.
fn classify_all(schemas: &[TypeSchema]) -> BTreeMap<&str, FieldClass> {
  let mut classes: BTreeMap<&str, FieldClass> = BTreeMap::new();
  for schema in schemas {
    for (name, property) in &schema.properties {
      let class = classify(name, property);
      match classes.get(name.as_str()) {
        Some(existing) if existing.kind != class.kind => debug!(
          field = %name,
          schema = %schema.title,
          "field classified differently by another type, keeping first"
        ),
        Some(_) => {}
        None => {
          classes.insert(name, class);
        }
      }
    }
  }
  classes
}

async fn register<S, W>(
  field: &str,
  kind: ValueKind,
  mapping: &mut FieldMapping,
  state: &S,
  writer: &W,
) -> Result<()>
where
  S: StateStore,
  W: ItemWriter,
{
  let registration = writer
    .register_property(field, kind)
    .await
    .map_err(|e| Error::Registration { field: field.to_owned(), source: Box::new(e) })?;

  match &registration {
    Registration::Created(id) => info!(field, property = %id, kind = kind.as_str(), "registered property"),
    Registration::Existing(id) => info!(field, property = %id, "property already registered, reusing"),
  }

  let spec = FieldSpec { property: registration.into_property_id(), kind };
  state.put_field(field, &spec).await.map_err(Error::state)?;
  mapping.insert(field, spec);
  Ok(())
}

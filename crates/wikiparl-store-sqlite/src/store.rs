//! [`SqliteStore`]: the SQLite implementation of [`StateStore`].

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use wikiparl_core::{
  claim::DeferredClaim,
  identity::ItemId,
  mapping::{FieldMapping, FieldSpec},
  state::StateStore,
};

use crate::{
  Result,
  encode::{RawFieldSpec, decode_dt, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Importer state backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── StateStore impl ─────────────────────────────────────────────────────────

impl StateStore for SqliteStore {
  type Error = crate::Error;

  // ── Identity links ────────────────────────────────────────────────────────

  async fn links(&self) -> Result<HashMap<String, ItemId>> {
    let rows: Vec<(String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT record_id, item_id FROM identity_links")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(rows.into_iter().map(|(record, item)| (record, ItemId(item))).collect())
  }

  async fn item_for(&self, record_id: &str) -> Result<Option<ItemId>> {
    let record_id = record_id.to_owned();

    let item: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT item_id FROM identity_links WHERE record_id = ?1",
              rusqlite::params![record_id],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(item.map(ItemId))
  }

  async fn link(&self, record_id: &str, item: &ItemId) -> Result<()> {
    let record_id = record_id.to_owned();
    let item_id   = item.0.clone();
    let at_str    = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO identity_links (record_id, item_id, linked_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (record_id) DO UPDATE SET item_id = excluded.item_id",
          rusqlite::params![record_id, item_id, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Field mapping ─────────────────────────────────────────────────────────

  async fn field_mapping(&self) -> Result<FieldMapping> {
    let raws: Vec<RawFieldSpec> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT field_name, property_id, value_kind FROM field_mappings")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawFieldSpec {
              field_name:  row.get(0)?,
              property_id: row.get(1)?,
              value_kind:  row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFieldSpec::into_spec).collect()
  }

  async fn put_field(&self, field: &str, spec: &FieldSpec) -> Result<()> {
    let field       = field.to_owned();
    let property_id = spec.property.0.clone();
    let kind_str    = spec.kind.as_str();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO field_mappings (field_name, property_id, value_kind)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (field_name) DO UPDATE SET
             property_id = excluded.property_id,
             value_kind  = excluded.value_kind",
          rusqlite::params![field, property_id, kind_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── List freshness ────────────────────────────────────────────────────────

  async fn list_imported_at(&self, url: &str) -> Result<Option<DateTime<Utc>>> {
    let url = url.to_owned();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT imported_at FROM list_freshness WHERE collection_url = ?1",
              rusqlite::params![url],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.as_deref().map(decode_dt).transpose()
  }

  async fn imported_lists(&self) -> Result<Vec<String>> {
    let urls = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT collection_url FROM list_freshness ORDER BY collection_url")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(urls)
  }

  async fn mark_list_imported(&self, url: &str, at: DateTime<Utc>) -> Result<()> {
    let url    = url.to_owned();
    let at_str = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO list_freshness (collection_url, imported_at) VALUES (?1, ?2)
           ON CONFLICT (collection_url) DO UPDATE SET imported_at = excluded.imported_at",
          rusqlite::params![url, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Deferred claims ───────────────────────────────────────────────────────

  async fn defer(&self, claim: &DeferredClaim) -> Result<()> {
    let claim = claim.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO deferred_claims (owning_record_id, field_name, raw_value)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![claim.owning_record_id, claim.field_name, claim.raw_value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn deferred(&self) -> Result<Vec<DeferredClaim>> {
    let claims = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT owning_record_id, field_name, raw_value
           FROM deferred_claims
           ORDER BY seq",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(DeferredClaim {
              owning_record_id: row.get(0)?,
              field_name:       row.get(1)?,
              raw_value:        row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(claims)
  }

  async fn clear_deferred(&self, claim: &DeferredClaim) -> Result<()> {
    let claim = claim.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM deferred_claims
           WHERE owning_record_id = ?1 AND field_name = ?2 AND raw_value = ?3",
          rusqlite::params![claim.owning_record_id, claim.field_name, claim.raw_value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

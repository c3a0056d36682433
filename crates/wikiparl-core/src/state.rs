//! The `StateStore` trait: everything the importer persists between runs.
//!
//! Implemented by storage backends (e.g. `wikiparl-store-sqlite`). Every write
//! is durable when the returned future resolves, so an interrupted run can be
//! resumed from whatever was last acknowledged.

use std::{collections::HashMap, future::Future};

use chrono::{DateTime, Utc};

use crate::{
  claim::DeferredClaim,
  identity::ItemId,
  mapping::{FieldMapping, FieldSpec},
};

pub trait StateStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Identity links ────────────────────────────────────────────────────

  /// All `record_id → item_id` links recorded so far.
  fn links(&self) -> impl Future<Output = Result<HashMap<String, ItemId>, Self::Error>> + Send + '_;

  /// The destination item of a record, if it was ever imported.
  fn item_for<'a>(
    &'a self,
    record_id: &'a str,
  ) -> impl Future<Output = Result<Option<ItemId>, Self::Error>> + Send + 'a;

  /// Record that `record_id` lives at `item`. Links are never deleted.
  fn link<'a>(
    &'a self,
    record_id: &'a str,
    item: &'a ItemId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Field mapping ─────────────────────────────────────────────────────

  fn field_mapping(&self) -> impl Future<Output = Result<FieldMapping, Self::Error>> + Send + '_;

  fn put_field<'a>(
    &'a self,
    field: &'a str,
    spec: &'a FieldSpec,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── List freshness ────────────────────────────────────────────────────

  /// When the collection at `url` was last fully imported.
  fn list_imported_at<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + 'a;

  /// Every collection URL ever stamped as fully imported.
  fn imported_lists(&self) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  fn mark_list_imported<'a>(
    &'a self,
    url: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Deferred claims ───────────────────────────────────────────────────

  /// Persist a pending claim. Adding the same claim twice is a no-op.
  fn defer<'a>(
    &'a self,
    claim: &'a DeferredClaim,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Every pending claim, in insertion order.
  fn deferred(&self) -> impl Future<Output = Result<Vec<DeferredClaim>, Self::Error>> + Send + '_;

  /// Drop a pending claim once it has been written.
  fn clear_deferred<'a>(
    &'a self,
    claim: &'a DeferredClaim,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

//! The store-write capability: the destination knowledge base.

use std::future::Future;

use crate::{
  claim::Claim,
  identity::{ItemId, PropertyId},
  mapping::ValueKind,
};

/// Outcome of registering a property.
///
/// Registration is idempotent: a name that already exists in the destination
/// store yields its existing id instead of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
  Created(PropertyId),
  Existing(PropertyId),
}

impl Registration {
  pub fn property_id(&self) -> &PropertyId {
    match self {
      Self::Created(id) | Self::Existing(id) => id,
    }
  }

  pub fn into_property_id(self) -> PropertyId {
    match self {
      Self::Created(id) | Self::Existing(id) => id,
    }
  }
}

/// What an update does with the statements already on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
  /// For every property in the claim set, the item's statements of that
  /// property are replaced by the new claims. Properties not in the claim
  /// set are left alone.
  Replace,
  /// Claims are added next to whatever the item already holds.
  Append,
}

/// Abstraction over the destination store's write API.
pub trait ItemWriter: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `claims` on an item and return its id.
  ///
  /// With `item = None` a new item labelled `label` is created and `mode` is
  /// ignored. With `Some(id)` the existing item is updated according to
  /// `mode`.
  fn write<'a>(
    &'a self,
    item: Option<&'a ItemId>,
    claims: &'a [Claim],
    label: &'a str,
    mode: WriteMode,
  ) -> impl Future<Output = Result<ItemId, Self::Error>> + Send + 'a;

  /// Register a property named `name` holding values of `kind`.
  fn register_property<'a>(
    &'a self,
    name: &'a str,
    kind: ValueKind,
  ) -> impl Future<Output = Result<Registration, Self::Error>> + Send + 'a;
}

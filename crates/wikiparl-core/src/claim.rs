//! Claims: typed (property, value) assertions attached to a destination item.

use serde::{Deserialize, Serialize};

use crate::identity::{ItemId, PropertyId};

/// Day precision in the Wikibase time model.
pub const PRECISION_DAY: u8 = 11;

/// The typed payload of a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ClaimValue {
  Text(String),
  Url(String),
  /// A link to another imported item.
  Item(ItemId),
  /// A point in time in canonical `+YYYY-MM-DDT00:00:00Z` form.
  Time { time: String, precision: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
  pub property: PropertyId,
  pub value:    ClaimValue,
}

impl Claim {
  pub fn new(property: PropertyId, value: ClaimValue) -> Self { Self { property, value } }
}

/// A cross-reference claim whose target had no destination item yet when the
/// owning record was committed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeferredClaim {
  pub owning_record_id: String,
  pub field_name:       String,
  /// The referenced record identity.
  pub raw_value:        String,
}

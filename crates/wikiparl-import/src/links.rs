//! In-memory view of the identity links, written through to the state store.

use std::collections::HashMap;

use wikiparl_core::{identity::ItemId, state::StateStore};

use crate::{Error, Result};

/// `record_id → item_id` for every record imported so far.
#[derive(Debug, Clone, Default)]
pub struct IdentityLinks {
  map: HashMap<String, ItemId>,
}

impl IdentityLinks {
  pub async fn load<S: StateStore>(state: &S) -> Result<Self> {
    let map = state.links().await.map_err(Error::state)?;
    Ok(Self { map })
  }

  pub fn get(&self, record_id: &str) -> Option<&ItemId> { self.map.get(record_id) }

  pub fn contains(&self, record_id: &str) -> bool { self.map.contains_key(record_id) }

  /// Persist the link, then make it visible. A crash in between leaves the
  /// store ahead of memory, never behind.
  pub async fn record<S: StateStore>(
    &mut self,
    state: &S,
    record_id: &str,
    item: ItemId,
  ) -> Result<()> {
    state.link(record_id, &item).await.map_err(Error::state)?;
    self.map.insert(record_id.to_owned(), item);
    Ok(())
  }

  pub fn len(&self) -> usize { self.map.len() }

  pub fn is_empty(&self) -> bool { self.map.is_empty() }
}

impl FromIterator<(String, ItemId)> for IdentityLinks {
  fn from_iter<T: IntoIterator<Item = (String, ItemId)>>(iter: T) -> Self {
    Self { map: iter.into_iter().collect() }
  }
}

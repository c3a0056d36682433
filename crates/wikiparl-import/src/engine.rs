//! The two-pass import engine.
//!
//! ```text
//! DISCOVER ⇄ COMMIT_PRIMARY → RESOLVE_DEFERRED → DONE
//! ```
//!
//! Discovery and commit interleave: every record the crawler yields is
//! committed before the next one is requested. Claims pointing at records
//! without an item are deferred, persisted, and written in one update per
//! owning record once discovery is exhausted.
//!
//! A commit to an existing item replaces the statements of every property it
//! writes, so re-running an import leaves each item as it was. Resolved
//! deferred claims are appended: the commit that deferred them wrote nothing
//! for that value.
//!
//! Everything runs on one task. Identity lookups, link writes and item
//! writes for a record happen in sequence, so no identity is ever created
//! twice.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wikiparl_core::{
  Error as CoreError,
  claim::{Claim, DeferredClaim},
  fetch::Fetch,
  identity::ItemId,
  mapping::FieldMapping,
  record::Record,
  state::StateStore,
  writer::{ItemWriter, WriteMode},
};
use wikiparl_crawl::Crawler;

use crate::{
  Error, Result,
  claims::{Conversion, Rejected, build_claims, resolve},
  links::IdentityLinks,
  report::{Failure, ImportReport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Discover,
  CommitPrimary,
  ResolveDeferred,
  Done,
}

/// Imports records into the destination store.
///
/// Per-record problems end up in the [`ImportReport`]; only state store
/// failures abort, since continuing without a durable identity link risks
/// duplicate items on the next run.
pub struct Importer<'a, S, W> {
  state:   &'a S,
  writer:  &'a W,
  mapping: FieldMapping,
  links:   IdentityLinks,
  /// Deferred claims by owning record, in the order they were created.
  pending: BTreeMap<String, Vec<DeferredClaim>>,
  phase:   Phase,
  report:  ImportReport,
}

impl<'a, S, W> Importer<'a, S, W>
where
  S: StateStore,
  W: ItemWriter,
{
  /// Load identity links and the deferred claims left by earlier runs.
  pub async fn new(state: &'a S, writer: &'a W, mapping: FieldMapping, run_id: Uuid) -> Result<Self> {
    let links = IdentityLinks::load(state).await?;
    let carried = state.deferred().await.map_err(Error::state)?;

    let mut report = ImportReport::new(run_id);
    report.deferred = carried.len();

    let mut pending: BTreeMap<String, Vec<DeferredClaim>> = BTreeMap::new();
    for claim in carried {
      pending.entry(claim.owning_record_id.clone()).or_default().push(claim);
    }

    info!(links = links.len(), carried = report.deferred, "importer ready");
    Ok(Self {
      state,
      writer,
      mapping,
      links,
      pending,
      phase: Phase::Discover,
      report,
    })
  }

  pub fn phase(&self) -> Phase { self.phase }

  pub fn report(&self) -> &ImportReport { &self.report }

  /// Number of deferred claims waiting for the resolution pass.
  pub fn pending(&self) -> usize { self.pending.values().map(Vec::len).sum() }

  /// Drive `crawler` to exhaustion, committing every record, then resolve
  /// deferred claims and stamp fully read collections.
  pub async fn run<F: Fetch>(mut self, crawler: &mut Crawler<F>) -> Result<ImportReport> {
    loop {
      self.phase = Phase::Discover;
      let Some(record) = crawler.next_record().await else {
        break;
      };
      self.phase = Phase::CommitPrimary;
      self.import_record(&record).await?;
    }

    self.report.crawl_failures.extend(crawler.take_failures().into_iter().map(|f| Failure {
      subject: f.subject,
      reason:  f.error.to_string(),
    }));

    self.resolve_deferred().await?;
    self.mark_lists(crawler.completed_lists()).await?;

    self.phase = Phase::Done;
    self.report.finished_at = Some(Utc::now());
    Ok(self.report)
  }

  /// Build and commit the claims of one record.
  ///
  /// Returns the record's item, or `None` if it was not committed.
  pub async fn import_record(&mut self, record: &Record) -> Result<Option<ItemId>> {
    let Some(record_id) = record.id() else {
      let error = CoreError::MissingIdentity { context: "record reached the importer".into() };
      self.fail("<unknown>", &error);
      return Ok(None);
    };

    let set = build_claims(record, &self.mapping, &self.links);
    self.reject(set.rejected);

    let existing = self.links.get(record_id).cloned();
    let item = match existing {
      Some(item) if set.claims.is_empty() => {
        debug!(record_id, %item, "nothing to write");
        self.report.unchanged += 1;
        item
      }
      Some(item) => {
        let written = self.writer.write(Some(&item), &set.claims, record_id, WriteMode::Replace).await;
        if let Err(e) = written {
          self.fail(record_id, &e);
          return Ok(None);
        }
        info!(record_id, %item, claims = set.claims.len(), "updated");
        self.report.updated += 1;
        item
      }
      None => match self.writer.write(None, &set.claims, record_id, WriteMode::Replace).await {
        Ok(item) => {
          self.links.record(self.state, record_id, item.clone()).await?;
          info!(record_id, %item, claims = set.claims.len(), "created");
          self.report.created += 1;
          item
        }
        Err(e) => {
          self.fail(record_id, &e);
          return Ok(None);
        }
      },
    };

    self.settle_deferred(record_id, set.deferred).await?;
    Ok(Some(item))
  }

  /// Make `deferred` the pending claims of `record_id` after its commit.
  ///
  /// Claims carried over from an earlier run that the record no longer
  /// defers were either written by the commit itself, because their target
  /// is linked now, or have left the record. Both are cleared.
  async fn settle_deferred(&mut self, record_id: &str, deferred: Vec<DeferredClaim>) -> Result<()> {
    let previous = self.pending.remove(record_id).unwrap_or_default();
    for stale in previous.iter().filter(|claim| !deferred.contains(claim)) {
      debug!(record_id, field = %stale.field_name, target = %stale.raw_value, "settled by commit");
      self.state.clear_deferred(stale).await.map_err(Error::state)?;
    }

    let queue = self.pending.entry(record_id.to_owned()).or_default();
    queue.extend(previous.into_iter().filter(|claim| deferred.contains(claim)));

    for claim in deferred {
      self.defer(claim).await?;
    }
    if self.pending.get(record_id).is_some_and(Vec::is_empty) {
      self.pending.remove(record_id);
    }
    Ok(())
  }

  /// Retry every pending claim and write the ones that now resolve.
  pub async fn resolve_deferred(&mut self) -> Result<()> {
    self.phase = Phase::ResolveDeferred;
    let pending = std::mem::take(&mut self.pending);
    info!(owners = pending.len(), "resolving deferred claims");

    for (owner, claims) in pending {
      let Some(item) = self.links.get(&owner).cloned() else {
        // The owner was never committed; keep its claims for a later run.
        self.report.unresolved.extend(claims);
        continue;
      };

      let mut resolved: Vec<(DeferredClaim, Claim)> = Vec::new();
      for deferred in claims {
        match resolve(&deferred, &self.mapping, &self.links) {
          Conversion::Claim(claim) => resolved.push((deferred, claim)),
          Conversion::Pending => {
            let gap = CoreError::UnresolvedReference {
              record_id: deferred.owning_record_id.clone(),
              field:     deferred.field_name.clone(),
              target:    deferred.raw_value.clone(),
            };
            debug!(error = %gap, "still unresolved");
            self.report.unresolved.push(deferred);
          }
          Conversion::Rejected(reason) => {
            self.reject(vec![Rejected {
              record_id: deferred.owning_record_id.clone(),
              field: deferred.field_name.clone(),
              value: deferred.raw_value.clone(),
              reason,
            }]);
            self.state.clear_deferred(&deferred).await.map_err(Error::state)?;
          }
        }
      }

      if resolved.is_empty() {
        continue;
      }

      let claims: Vec<Claim> = resolved.iter().map(|(_, claim)| claim.clone()).collect();
      if let Err(e) = self.writer.write(Some(&item), &claims, &owner, WriteMode::Append).await {
        self.fail(&owner, &e);
        continue;
      }

      info!(record_id = %owner, %item, claims = claims.len(), "resolved deferred claims");
      for (deferred, _) in &resolved {
        self.state.clear_deferred(deferred).await.map_err(Error::state)?;
      }
      self.report.resolved += resolved.len();
    }

    Ok(())
  }

  async fn defer(&mut self, claim: DeferredClaim) -> Result<()> {
    let queue = self.pending.entry(claim.owning_record_id.clone()).or_default();
    if queue.contains(&claim) {
      return Ok(());
    }

    self.state.defer(&claim).await.map_err(Error::state)?;
    debug!(
      record_id = %claim.owning_record_id,
      field = %claim.field_name,
      target = %claim.raw_value,
      "deferred"
    );
    queue.push(claim);
    self.report.deferred += 1;
    Ok(())
  }

  /// Stamp fully read collections, unless the run left gaps behind.
  async fn mark_lists(&mut self, completed: &[String]) -> Result<()> {
    if !self.report.failed.is_empty() || !self.report.crawl_failures.is_empty() {
      warn!(lists = completed.len(), "run had failures, not marking collections as imported");
      return Ok(());
    }

    let now = Utc::now();
    for url in completed {
      self.state.mark_list_imported(url, now).await.map_err(Error::state)?;
      self.report.lists_marked.push(url.clone());
    }
    Ok(())
  }

  fn reject(&mut self, rejected: Vec<Rejected>) {
    for r in &rejected {
      warn!(record_id = %r.record_id, field = %r.field, value = %r.value, reason = %r.reason, "claim rejected");
    }
    self.report.rejected_claims.extend(rejected);
  }

  fn fail(&mut self, subject: &str, error: &dyn std::error::Error) {
    warn!(record_id = subject, %error, "record skipped");
    self.report.failed.push(Failure { subject: subject.to_owned(), reason: error.to_string() });
  }
}

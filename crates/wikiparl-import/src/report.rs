//! Summary of one import run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;
use wikiparl_core::claim::DeferredClaim;

use crate::claims::Rejected;

/// A record or URL that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
  pub subject: String,
  pub reason:  String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
  pub run_id:          Uuid,
  pub started_at:      DateTime<Utc>,
  pub finished_at:     Option<DateTime<Utc>>,
  /// Records written as new items.
  pub created:         usize,
  /// Records written to an item from an earlier run.
  pub updated:         usize,
  /// Records that produced no claims and were already linked.
  pub unchanged:       usize,
  pub failed:          Vec<Failure>,
  pub crawl_failures:  Vec<Failure>,
  pub rejected_claims: Vec<Rejected>,
  /// Claims deferred during this run, including ones carried over.
  pub deferred:        usize,
  pub resolved:        usize,
  pub unresolved:      Vec<DeferredClaim>,
  /// Collections stamped as fully imported.
  pub lists_marked:    Vec<String>,
}

impl ImportReport {
  pub fn new(run_id: Uuid) -> Self {
    Self {
      run_id,
      started_at: Utc::now(),
      finished_at: None,
      created: 0,
      updated: 0,
      unchanged: 0,
      failed: Vec::new(),
      crawl_failures: Vec::new(),
      rejected_claims: Vec::new(),
      deferred: 0,
      resolved: 0,
      unresolved: Vec::new(),
      lists_marked: Vec::new(),
    }
  }

  /// Whether anything was skipped, rejected or left unresolved.
  pub fn is_clean(&self) -> bool {
    self.failed.is_empty()
      && self.crawl_failures.is_empty()
      && self.rejected_claims.is_empty()
      && self.unresolved.is_empty()
  }

  pub fn log_summary(&self) {
    info!(
      run_id = %self.run_id,
      created = self.created,
      updated = self.updated,
      unchanged = self.unchanged,
      failed = self.failed.len(),
      crawl_failures = self.crawl_failures.len(),
      rejected_claims = self.rejected_claims.len(),
      deferred = self.deferred,
      resolved = self.resolved,
      unresolved = self.unresolved.len(),
      lists_marked = self.lists_marked.len(),
      "import finished"
    );

    for failure in &self.failed {
      warn!(record_id = %failure.subject, reason = %failure.reason, "record not committed");
    }
    for failure in &self.crawl_failures {
      warn!(subject = %failure.subject, reason = %failure.reason, "not crawled");
    }
    for claim in &self.unresolved {
      warn!(
        record_id = %claim.owning_record_id,
        field = %claim.field_name,
        target = %claim.raw_value,
        "reference still unresolved"
      );
    }
  }
}

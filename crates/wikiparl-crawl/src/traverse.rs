//! The graph traversal engine.
//!
//! Breadth-first over an explicit worklist. Each pending unit of work is a
//! URL to fetch, a collection page to read, or a record body already at hand
//! (an embedded record or a list item). Records are deduplicated by the hash
//! of their identity, which is what bounds the traversal: the graph has
//! cycles (bodies, organizations and people reference each other) and there
//! is no depth limit.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info, warn};
use wikiparl_core::{
  Error,
  fetch::Fetch,
  flatten::flatten,
  identity::identity_hash,
  record::Record,
};

use crate::discover::{Link, LinkFields, discover, parse_page};

// ─── Work ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Work {
  /// A record known only by URL.
  Fetch(String),
  /// A page of the collection whose first page is `list`.
  Page { list: String, url: String },
  /// A record whose body is already at hand.
  Inline(Record),
}

/// Something the crawl had to give up on. The crawl itself continues.
#[derive(Debug)]
pub struct CrawlFailure {
  /// The URL or record identity concerned.
  pub subject: String,
  pub error:   Error,
}

// ─── Crawler ─────────────────────────────────────────────────────────────────

/// Yields every record reachable from the seeded entry points exactly once.
///
/// Call [`Crawler::next_record`] until it returns `None`. The crawl cannot be
/// resumed half-way; restarting means building a new crawler, which is cheap
/// when the fetcher is cached.
pub struct Crawler<F> {
  fetcher:   F,
  links:     LinkFields,
  queue:     VecDeque<Work>,
  /// Identity hashes of every record visited (or fetched) so far.
  visited:   HashSet<String>,
  /// Collection page URLs already enqueued.
  pages:     HashSet<String>,
  skip:      HashSet<String>,
  completed: Vec<String>,
  failures:  Vec<CrawlFailure>,
}

impl<F: Fetch> Crawler<F> {
  pub fn new(fetcher: F, links: LinkFields) -> Self {
    Self {
      fetcher,
      links,
      queue: VecDeque::new(),
      visited: HashSet::new(),
      pages: HashSet::new(),
      skip: HashSet::new(),
      completed: Vec::new(),
      failures: Vec::new(),
    }
  }

  /// Collections whose first page URL is in `urls` are not read.
  pub fn skip_lists(mut self, urls: impl IntoIterator<Item = String>) -> Self {
    self.skip.extend(urls);
    self
  }

  /// Add an entry point: the URL of a single record.
  pub fn seed(&mut self, url: impl Into<String>) {
    self.queue.push_back(Work::Fetch(url.into()));
  }

  /// The next unvisited record, flattened, or `None` once the graph is
  /// exhausted.
  pub async fn next_record(&mut self) -> Option<Record> {
    while let Some(work) = self.queue.pop_front() {
      let record = match work {
        Work::Fetch(url) => self.fetch_record(url).await,
        Work::Page { list, url } => {
          self.read_page(list, url).await;
          None
        }
        Work::Inline(record) => Some(record),
      };

      if let Some(primary) = record.and_then(|r| self.visit(r)) {
        return Some(primary);
      }
    }
    None
  }

  /// Collections every page of which was read during this crawl.
  pub fn completed_lists(&self) -> &[String] { &self.completed }

  pub fn failures(&self) -> &[CrawlFailure] { &self.failures }

  pub fn take_failures(&mut self) -> Vec<CrawlFailure> { std::mem::take(&mut self.failures) }

  // ── Work items ────────────────────────────────────────────────────────────

  async fn fetch_record(&mut self, url: String) -> Option<Record> {
    if self.visited.contains(&identity_hash(&url)) {
      return None;
    }

    let payload = match self.fetcher.fetch(&url).await {
      Ok(payload) => payload,
      Err(error) => {
        self.fail(url, error);
        return None;
      }
    };

    match Record::try_from(payload) {
      Ok(record) => {
        // A record may be reachable under a URL other than its own `id`.
        if record.id().is_some_and(|id| id != url) {
          self.visited.insert(identity_hash(&url));
        }
        Some(record)
      }
      Err(error) => {
        self.fail(url, error);
        None
      }
    }
  }

  async fn read_page(&mut self, list: String, url: String) {
    let payload = match self.fetcher.fetch(&url).await {
      Ok(payload) => payload,
      Err(error) => {
        self.fail(url, error);
        return;
      }
    };

    let Some(page) = parse_page(payload) else {
      let error = Error::integrity(&list, "data", format!("{url} is not a collection page"));
      self.fail(url, error);
      return;
    };

    debug!(%list, %url, items = page.items.len(), "read page");
    for item in page.items {
      match Record::try_from(item) {
        Ok(record) => self.queue.push_back(Work::Inline(record)),
        Err(error) => self.fail(url.clone(), error),
      }
    }

    match page.next {
      Some(next) if self.pages.insert(next.clone()) => {
        self.queue.push_back(Work::Page { list, url: next });
      }
      Some(next) => warn!(%list, %next, "pagination cycles back, stopping"),
      None => {
        info!(%list, "collection complete");
        self.completed.push(list);
      }
    }
  }

  /// Mark a record visited, enqueue its neighbours, and return its primary
  /// part. Returns `None` for duplicates and malformed records.
  fn visit(&mut self, record: Record) -> Option<Record> {
    let Some(id) = record.id() else {
      let context = match record.kind() {
        Some(kind) => format!("{kind} object without id"),
        None => "object without id or type".to_owned(),
      };
      self.fail("<unknown>".to_owned(), Error::MissingIdentity { context });
      return None;
    };

    if !self.visited.insert(identity_hash(id)) {
      return None;
    }
    let id = id.to_owned();

    let flat = match flatten(record) {
      Ok(flat) => flat,
      Err(error) => {
        self.fail(id, error);
        return None;
      }
    };

    for embedded in flat.embedded {
      self.queue.push_back(Work::Inline(embedded));
    }
    for link in discover(&flat.primary, &self.links) {
      match link {
        Link::Record(url) => {
          if !self.visited.contains(&identity_hash(&url)) {
            self.queue.push_back(Work::Fetch(url));
          }
        }
        Link::List(url) => self.enqueue_list(url),
      }
    }

    debug!(record_id = %id, queued = self.queue.len(), "visited");
    Some(flat.primary)
  }

  fn enqueue_list(&mut self, url: String) {
    if self.skip.contains(&url) {
      info!(list = %url, "collection imported on an earlier run, skipping");
      return;
    }
    if self.pages.insert(url.clone()) {
      self.queue.push_back(Work::Page { list: url.clone(), url });
    }
  }

  fn fail(&mut self, subject: String, error: Error) {
    warn!(%subject, %error, "crawl failure");
    self.failures.push(CrawlFailure { subject, error });
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::memory::MemoryFetcher;

  const SYSTEM: &str = "https://example.org/oparl";
  const BODIES: &str = "https://example.org/oparl/body";
  const BODY: &str = "https://example.org/oparl/body/1";
  const PEOPLE: &str = "https://example.org/oparl/body/1/person";
  const PEOPLE_2: &str = "https://example.org/oparl/body/1/person?page=2";

  fn person(n: u32) -> serde_json::Value {
    json!({
      "id": format!("https://example.org/oparl/person/{n}"),
      "type": "https://schema.oparl.org/1.0/Person",
      "name": format!("Person {n}"),
    })
  }

  fn link_fields() -> LinkFields {
    LinkFields::new()
      .list("body")
      .list("person")
      .reference("organization")
      .reference("person_ref")
  }

  fn server() -> MemoryFetcher {
    MemoryFetcher::new()
      .with(SYSTEM, json!({
        "id": SYSTEM,
        "type": "https://schema.oparl.org/1.0/System",
        "body": BODIES,
      }))
      .with(BODIES, json!({
        "data": [{
          "id": BODY,
          "type": "https://schema.oparl.org/1.0/Body",
          "person": PEOPLE,
        }],
        "links": {},
      }))
      .with(PEOPLE, json!({
        "data": [person(1), person(2), person(3)],
        "links": { "next": PEOPLE_2 },
      }))
      .with(PEOPLE_2, json!({ "data": [person(4)], "links": {} }))
  }

  async fn collect<F: Fetch>(crawler: &mut Crawler<F>) -> Vec<Record> {
    let mut out = Vec::new();
    while let Some(record) = crawler.next_record().await {
      out.push(record);
    }
    out
  }

  #[tokio::test]
  async fn system_body_and_two_pages_of_people() {
    let fetcher = server();
    let mut crawler = Crawler::new(&fetcher, link_fields());
    crawler.seed(SYSTEM);

    let records = collect(&mut crawler).await;
    let ids: Vec<_> = records.iter().filter_map(Record::id).collect();

    assert_eq!(ids, vec![
      SYSTEM,
      BODY,
      "https://example.org/oparl/person/1",
      "https://example.org/oparl/person/2",
      "https://example.org/oparl/person/3",
      "https://example.org/oparl/person/4",
    ]);
    assert!(crawler.failures().is_empty());
    assert_eq!(crawler.completed_lists(), &[BODIES.to_owned(), PEOPLE.to_owned()]);
  }

  #[tokio::test]
  async fn record_reachable_twice_is_yielded_once() {
    let org = "https://example.org/oparl/organization/1";
    let fetcher = MemoryFetcher::new()
      .with(SYSTEM, json!({ "id": SYSTEM, "body": BODIES }))
      .with(BODIES, json!({
        "data": [{
          "id": BODY,
          "person": PEOPLE,
          "organization": org,
        }],
      }))
      .with(PEOPLE, json!({
        "data": [
          { "id": "https://example.org/oparl/person/1", "organization": org },
          { "id": "https://example.org/oparl/person/2", "organization": org },
        ],
      }))
      .with(org, json!({
        "id": org,
        "person_ref": ["https://example.org/oparl/person/1"],
      }));
    let mut crawler = Crawler::new(&fetcher, link_fields());
    crawler.seed(SYSTEM);

    let records = collect(&mut crawler).await;
    let ids: Vec<_> = records.iter().filter_map(Record::id).collect();

    assert_eq!(ids.len(), 5);
    assert_eq!(ids.iter().filter(|id| **id == org).count(), 1);
    assert_eq!(
      ids.iter().filter(|id| **id == "https://example.org/oparl/person/1").count(),
      1
    );
    // The organization is fetched once even though three records link to it.
    assert_eq!(fetcher.requested_urls().iter().filter(|u| *u == org).count(), 1);
  }

  #[tokio::test]
  async fn embedded_records_are_yielded_separately() {
    let fetcher = MemoryFetcher::new().with(SYSTEM, json!({
      "id": SYSTEM,
      "membership": [
        { "id": "https://example.org/oparl/membership/1", "role": "chair" },
      ],
      "vendor:extra": "dropped",
    }));
    let mut crawler = Crawler::new(&fetcher, link_fields());
    crawler.seed(SYSTEM);

    let records = collect(&mut crawler).await;

    assert_eq!(records.len(), 2);
    assert!(records[0].get("membership").is_none());
    assert!(records[0].get("vendor:extra").is_none());
    assert_eq!(records[1].id(), Some("https://example.org/oparl/membership/1"));
  }

  #[tokio::test]
  async fn records_without_identity_are_dropped_and_reported() {
    let fetcher = MemoryFetcher::new()
      .with(SYSTEM, json!({ "id": SYSTEM, "body": BODIES }))
      .with(BODIES, json!({ "data": [{ "name": "no id" }, { "id": BODY }] }));
    let mut crawler = Crawler::new(&fetcher, link_fields());
    crawler.seed(SYSTEM);

    let records = collect(&mut crawler).await;

    assert_eq!(records.len(), 2);
    assert_eq!(crawler.failures().len(), 1);
    assert!(matches!(crawler.failures()[0].error, Error::MissingIdentity { .. }));
  }

  #[tokio::test]
  async fn fetch_failures_do_not_stop_the_crawl() {
    let fetcher = MemoryFetcher::new().with(SYSTEM, json!({
      "id": SYSTEM,
      "organization": "https://example.org/oparl/organization/404",
      "body": BODIES,
    }));
    let mut crawler = Crawler::new(&fetcher, link_fields());
    crawler.seed(SYSTEM);

    let records = collect(&mut crawler).await;

    assert_eq!(records.len(), 1);
    assert_eq!(crawler.failures().len(), 2);
    assert!(crawler.completed_lists().is_empty());
  }

  #[tokio::test]
  async fn skipped_lists_are_not_read() {
    let fetcher = server();
    let mut crawler = Crawler::new(&fetcher, link_fields()).skip_lists([PEOPLE.to_owned()]);
    crawler.seed(SYSTEM);

    let records = collect(&mut crawler).await;

    assert_eq!(records.len(), 2);
    assert!(!fetcher.requested_urls().iter().any(|u| u == PEOPLE));
  }

  #[tokio::test]
  async fn record_fetched_under_another_url_is_not_fetched_again() {
    let org = "https://example.org/oparl/organization/1";
    let alias = "https://example.org/oparl/organization/1?format=json";
    let fetcher = MemoryFetcher::new()
      .with(SYSTEM, json!({ "id": SYSTEM, "organization": [alias, alias], "person": PEOPLE }))
      .with(alias, json!({ "id": org, "name": "Finance committee" }))
      .with(PEOPLE, json!({
        "data": [
          { "id": "https://example.org/oparl/person/1", "organization": alias },
          { "id": "https://example.org/oparl/person/2", "organization": org },
        ],
      }));
    let mut crawler = Crawler::new(&fetcher, link_fields());
    crawler.seed(SYSTEM);

    let records = collect(&mut crawler).await;
    let ids: Vec<_> = records.iter().filter_map(Record::id).collect();

    assert_eq!(ids, vec![
      SYSTEM,
      org,
      "https://example.org/oparl/person/1",
      "https://example.org/oparl/person/2",
    ]);
    assert!(crawler.failures().is_empty());
    let requested = fetcher.requested_urls();
    assert_eq!(requested.iter().filter(|u| *u == alias).count(), 1);
    assert!(!requested.iter().any(|u| u == org));
  }

  #[tokio::test]
  async fn pagination_cycle_ends_the_collection() {
    let fetcher = MemoryFetcher::new()
      .with(SYSTEM, json!({ "id": SYSTEM, "person": PEOPLE }))
      .with(PEOPLE, json!({
        "data": [person(1), person(2)],
        "links": { "next": PEOPLE_2 },
      }))
      .with(PEOPLE_2, json!({
        "data": [person(3)],
        "links": { "next": PEOPLE },
      }));
    let mut crawler = Crawler::new(&fetcher, link_fields());
    crawler.seed(SYSTEM);

    let records = collect(&mut crawler).await;

    assert_eq!(records.len(), 4);
    assert_eq!(fetcher.requested_urls().iter().filter(|u| *u == PEOPLE).count(), 1);
    assert_eq!(fetcher.requested_urls().iter().filter(|u| *u == PEOPLE_2).count(), 1);
    // A cycle is not a complete read.
    assert!(crawler.completed_lists().is_empty());
  }
}

//! wikiparl importer binary.
//!
//! Reads `wikiparl.toml` (or the path given with `--config`), crawls the
//! source API from its entry point through an on-disk cache, and imports
//! every record into a Wikibase instance. State kept between runs lives in
//! a SQLite file, so an interrupted run can simply be started again.

mod config;
mod wikibase;

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use tracing::{Instrument as _, info, info_span, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use wikiparl_core::state::StateStore as _;
use wikiparl_crawl::{
  Crawler,
  cache::{CachedFetcher, FileCache},
  http::HttpFetcher,
};
use wikiparl_import::{ImportReport, Importer, mapper::build_mapping, schema};
use wikiparl_store_sqlite::SqliteStore;

use crate::{
  config::Settings,
  wikibase::{WikibaseClient, WikibaseConfig},
};

#[derive(Parser)]
#[command(author, version, about = "Import a civic data API into Wikibase")]
pub struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "wikiparl.toml")]
  config: PathBuf,

  /// URL of the system record to start from.
  #[arg(long)]
  entrypoint: Option<String>,

  /// Directory with the type schemas.
  #[arg(long)]
  schema_dir: Option<PathBuf>,

  /// Directory of the response cache.
  #[arg(long)]
  cache_dir: Option<PathBuf>,

  /// SQLite file holding identity links and the field mapping.
  #[arg(long)]
  state_path: Option<PathBuf>,

  /// Read every collection, including ones imported by an earlier run.
  #[arg(long)]
  rescan_lists: bool,

  /// Also write the run report as JSON to this file.
  #[arg(long)]
  report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli)?;

  // Everything that can fail before the first record is fatal.
  let schemas = schema::load_dir(&settings.schema_dir)
    .with_context(|| format!("failed to load schemas from {:?}", settings.schema_dir))?;
  info!(types = schemas.len(), "loaded schemas");

  let state_path = &settings.state_path;
  if let Some(parent) = state_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(state_path)
    .await
    .with_context(|| format!("failed to open state at {state_path:?}"))?;

  let cache_dir = &settings.cache_dir;
  let cache = FileCache::open(cache_dir)
    .await
    .with_context(|| format!("failed to open cache at {cache_dir:?}"))?;
  let http = HttpFetcher::new(settings.http.to_config()).context("failed to build HTTP client")?;
  let fetcher = CachedFetcher::new(http, cache);

  let writer = WikibaseClient::new(WikibaseConfig {
    api_url:  settings.wikibase.api_url.clone(),
    username: settings.wikibase.username.clone(),
    password: settings.wikibase.password.clone(),
    timeout:  Duration::from_secs(settings.http.timeout_secs),
  })
  .context("failed to build wikibase client")?;
  writer.login().await.context("failed to log in to wikibase")?;

  let run_id = Uuid::new_v4();
  let report = async {
    let mapping = build_mapping(&schemas, &store, &writer)
      .await
      .context("failed to build field mapping")?;

    let skip = if settings.rescan_lists {
      Vec::new()
    } else {
      store.imported_lists().await.context("failed to read list freshness")?
    };
    info!(skipped_lists = skip.len(), "starting crawl at {}", settings.entrypoint);

    let mut crawler = Crawler::new(&fetcher, schema::link_fields(&schemas)).skip_lists(skip);
    crawler.seed(settings.entrypoint.as_str());

    let importer = Importer::new(&store, &writer, mapping, run_id).await?;
    let report = importer.run(&mut crawler).await?;
    anyhow::Ok(report)
  }
  .instrument(info_span!("import", %run_id))
  .await?;

  report.log_summary();
  info!(
    hits = fetcher.cache().hits(),
    misses = fetcher.cache().misses(),
    "cache usage"
  );

  if let Some(path) = &cli.report {
    write_report(path, &report)?;
  }
  Ok(())
}

fn write_report(path: &Path, report: &ImportReport) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(report).context("failed to serialise report")?;
  std::fs::write(path, json).with_context(|| format!("failed to write report to {path:?}"))?;
  info!(path = %path.display(), "wrote report");
  Ok(())
}

//! Layered settings: TOML file, then `WIKIPARL_*` environment, then flags.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;
use wikiparl_crawl::http::HttpConfig;

use crate::Cli;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// URL of the system record the crawl starts from.
  pub entrypoint:   String,
  /// Directory with one JSON Schema file per record type.
  pub schema_dir:   PathBuf,
  #[serde(default = "default_cache_dir")]
  pub cache_dir:    PathBuf,
  #[serde(default = "default_state_path")]
  pub state_path:   PathBuf,
  pub wikibase:     WikibaseSettings,
  #[serde(default)]
  pub http:         HttpSettings,
  /// Read collections again even if an earlier run imported them fully.
  #[serde(default)]
  pub rescan_lists: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikibaseSettings {
  /// The MediaWiki action API, e.g. `http://wikibase.local/w/api.php`.
  pub api_url:  String,
  /// Bot password user, `User@BotName`.
  pub username: String,
  pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  #[serde(default = "default_max_retries")]
  pub max_retries:  u32,
}

impl Default for HttpSettings {
  fn default() -> Self {
    Self {
      timeout_secs: default_timeout_secs(),
      max_retries:  default_max_retries(),
    }
  }
}

impl HttpSettings {
  pub fn to_config(&self) -> HttpConfig {
    HttpConfig {
      timeout: Duration::from_secs(self.timeout_secs),
      max_retries: self.max_retries,
      ..HttpConfig::default()
    }
  }
}

fn default_cache_dir() -> PathBuf { PathBuf::from("./cache") }

fn default_state_path() -> PathBuf { PathBuf::from("~/.local/share/wikiparl/state.db") }

fn default_timeout_secs() -> u64 { 30 }

fn default_max_retries() -> u32 { 3 }

impl Settings {
  pub fn load(cli: &Cli) -> anyhow::Result<Self> {
    let path_override = |p: &Option<PathBuf>| p.as_ref().map(|p| p.to_string_lossy().into_owned());

    let settings = config::Config::builder()
      .add_source(config::File::from(cli.config.clone()).required(false))
      .add_source(
        config::Environment::with_prefix("WIKIPARL")
          .prefix_separator("_")
          .separator("__"),
      )
      .set_override_option("entrypoint", cli.entrypoint.clone())?
      .set_override_option("schema_dir", path_override(&cli.schema_dir))?
      .set_override_option("cache_dir", path_override(&cli.cache_dir))?
      .set_override_option("state_path", path_override(&cli.state_path))?
      .set_override_option("rescan_lists", cli.rescan_lists.then_some(true))?
      .build()
      .context("failed to read config file")?;

    let mut settings: Self = settings.try_deserialize().context("failed to deserialise settings")?;
    for path in [&mut settings.schema_dir, &mut settings.cache_dir, &mut settings.state_path] {
      *path = expand_tilde(path);
    }
    Ok(settings)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

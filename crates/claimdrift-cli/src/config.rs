//! Binary configuration, deserialised from `claimdrift.toml` and
//! `CLAIMDRIFT__*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use claimdrift_claims::stability::StabilityThresholds;
use claimdrift_recheck::RecheckConfig;
use serde::Deserialize;

/// Where pending rechecks are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
  /// Tables in the store file.
  #[default]
  Sqlite,
  /// Process memory; lost on exit.
  Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  pub store_path: PathBuf,
  pub queue:      QueueBackend,
  pub recheck:    RecheckConfig,
  pub stability:  StabilityThresholds,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      store_path: PathBuf::from("claimdrift.db"),
      queue:      QueueBackend::default(),
      recheck:    RecheckConfig::default(),
      stability:  StabilityThresholds::default(),
    }
  }
}

impl AppConfig {
  /// Layer the optional file at `path` under the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("CLAIMDRIFT")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: AppConfig = settings
      .try_deserialize()
      .context("failed to deserialise AppConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.recheck = cfg.recheck.sanitized();
    Ok(cfg)
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

//! Configuration loader and validator for the notification feed.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::model::Timeline;
use crate::notifications::{GeneratorSettings, RECENT_COMMUNICATIONS, RFI_RESPONSE_DAYS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub store: Store,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// YAML or JSON file holding the company timelines.
    pub timelines: String,
    /// Seconds between feed refreshes; 0 runs once.
    #[serde(default)]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_recent_limit")]
    pub recent_limit: u32,
    #[serde(default = "default_rfi_response_days")]
    pub rfi_response_days: u32,
}

fn default_recent_limit() -> u32 {
    RECENT_COMMUNICATIONS
}

fn default_rfi_response_days() -> u32 {
    RFI_RESPONSE_DAYS
}

/// Where communications are read from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum Store {
    Sqlite {
        #[serde(default)]
        database_url: Option<String>,
    },
    Supabase {
        url: String,
        api_key: String,
    },
}

impl App {
    pub fn settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            recent_limit: self.recent_limit,
            rfi_response_days: self.rfi_response_days,
        }
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// SQLite URL for the local store. `DATABASE_URL` is handled by callers.
    pub fn database_url(&self) -> Option<String> {
        match &self.store {
            Store::Sqlite { database_url } => Some(
                database_url
                    .clone()
                    .filter(|u| !u.trim().is_empty())
                    .unwrap_or_else(|| format!("sqlite://{}/notify.db", self.app.data_dir)),
            ),
            Store::Supabase { .. } => None,
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.timelines.trim().is_empty() {
        return Err(ConfigError::Invalid("app.timelines must be non-empty"));
    }
    if cfg.app.recent_limit == 0 {
        return Err(ConfigError::Invalid("app.recent_limit must be > 0"));
    }

    if let Store::Supabase { url, api_key } = &cfg.store {
        if url.trim().is_empty() {
            return Err(ConfigError::Invalid("store.url must be non-empty"));
        }
        if api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("store.api_key must be non-empty"));
        }
    }

    Ok(())
}

/// Load company timelines. JSON is accepted too since it parses as YAML.
pub fn load_timelines(path: &Path) -> Result<Vec<Timeline>, ConfigError> {
    let content = fs::read_to_string(path)?;
    let timelines: Vec<Timeline> = serde_yaml::from_str(&content)?;
    if timelines.iter().any(|t| t.company_id.trim().is_empty()) {
        return Err(ConfigError::Invalid("timeline companyId must be non-empty"));
    }
    Ok(timelines)
}

/// Returns the example YAML content.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  timelines: "./timelines.yaml"
  refresh_interval_secs: 0
  recent_limit: 10
  rfi_response_days: 14

store:
  backend: sqlite
  database_url: null
"#
}

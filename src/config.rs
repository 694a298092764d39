//! Configuration loader and validator for the catalog sync job.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

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
    pub remote: Remote,
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Local paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Cursor file name, relative to `data_dir` unless absolute.
    #[serde(default = "default_cursor_file")]
    pub cursor_file: String,
}

/// Remote catalog endpoint and credentials.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Remote {
    pub base_url: String,
    pub api_username: String,
    pub api_key: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_true")]
    pub paginate: bool,
    /// Upper bound on pages per query; 0 disables the bound.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remote")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("paginate", &self.paginate)
            .field("max_pages", &self.max_pages)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub rate_limit_backoff_ms: u64,
    pub transient_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            rate_limit_backoff_ms: 2_000,
            transient_backoff_ms: 3_000,
        }
    }
}

fn default_cursor_file() -> String {
    "last_sync.txt".into()
}

fn default_page_size() -> u32 {
    crate::remote::DEFAULT_PAGE_SIZE
}

fn default_true() -> bool {
    true
}

fn default_max_pages() -> u32 {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    pub fn cursor_path(&self) -> PathBuf {
        let file = Path::new(&self.app.cursor_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            Path::new(&self.app.data_dir).join(file)
        }
    }

    /// `DATABASE_URL` wins over the default file under `data_dir`.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/products.db", self.app.data_dir))
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

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.cursor_file.trim().is_empty() {
        return Err(ConfigError::Invalid("app.cursor_file must be non-empty"));
    }

    let remote = &cfg.remote;
    if remote.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("remote.base_url must be non-empty"));
    }
    if !(remote.base_url.starts_with("http://") || remote.base_url.starts_with("https://")) {
        return Err(ConfigError::Invalid("remote.base_url must be an http(s) URL"));
    }
    if remote.api_username.trim().is_empty() {
        return Err(ConfigError::Invalid("remote.api_username must be non-empty"));
    }
    if remote.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("remote.api_key must be non-empty"));
    }
    if remote.page_size == 0 {
        return Err(ConfigError::Invalid("remote.page_size must be > 0"));
    }
    if remote.timeout_secs == 0 {
        return Err(ConfigError::Invalid("remote.timeout_secs must be > 0"));
    }

    if cfg.retry.max_attempts == 0 {
        return Err(ConfigError::Invalid("retry.max_attempts must be > 0"));
    }

    Ok(())
}

/// Example configuration document.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  cursor_file: "last_sync.txt"

remote:
  base_url: "https://api.cin7.com/api/"
  api_username: "YOUR_API_USERNAME"
  api_key: "YOUR_API_KEY"
  page_size: 250
  paginate: true
  max_pages: 100
  timeout_secs: 30

retry:
  max_attempts: 5
  rate_limit_backoff_ms: 2000
  transient_backoff_ms: 3000
"#
}

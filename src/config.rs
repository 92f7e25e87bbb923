use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FlowError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
  #[serde(default = "default_api_url")]
  pub api_url: String,
  #[serde(default = "default_page_size")]
  pub page_size: usize,
  #[serde(default = "default_timeout")]
  pub timeout_secs: u64,
  #[serde(default = "default_session_file")]
  pub session_file: PathBuf,
  #[serde(default = "default_token_env")]
  pub token_env: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_url: default_api_url(),
      page_size: default_page_size(),
      timeout_secs: default_timeout(),
      session_file: default_session_file(),
      token_env: default_token_env(),
    }
  }
}

fn default_api_url() -> String {
  "http://localhost:8000".to_string()
}
fn default_page_size() -> usize {
  10
}
fn default_timeout() -> u64 {
  30
}
fn default_session_file() -> PathBuf {
  std::env::var("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("."))
    .join(".storyflow")
    .join("session.yaml")
}
fn default_token_env() -> String {
  "STORYFLOW_TOKEN".to_string()
}

impl Config {
  /// Loads the config file, falling back to defaults when it is absent.
  pub fn load(path: &Path) -> Result<Self> {
    if !path.exists() {
      info!("no config at {}, using defaults", path.display());
      let config = Config::default();
      config.validate()?;
      return Ok(config);
    }
    Self::load_existing(path)
  }

  /// Like [`Config::load`] but a missing file is an error.
  pub fn load_existing(path: &Path) -> Result<Self> {
    if !path.exists() {
      return Err(FlowError::ConfigNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&content)?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
      return Err(FlowError::Config(format!(
        "api_url must be an http(s) URL: {}",
        self.api_url
      )));
    }
    if self.page_size == 0 {
      return Err(FlowError::Config("page_size must be positive".into()));
    }
    Ok(())
  }

  pub fn base_url(&self) -> &str {
    self.api_url.trim_end_matches('/')
  }

  /// Token from the configured environment variable, if set and non-empty.
  pub fn env_token(&self) -> Option<String> {
    std::env::var(&self.token_env)
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}

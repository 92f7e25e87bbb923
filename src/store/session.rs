use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
  pub token: Option<String>,
  pub email: Option<String>,
  pub logged_in_at: Option<DateTime<Utc>>,
}

/// Bearer token persisted between CLI invocations.
pub struct SessionFile {
  path: PathBuf,
  state: SessionState,
}

impl SessionFile {
  pub fn load(path: &Path) -> Result<Self> {
    let state = if path.exists() {
      let content = std::fs::read_to_string(path)?;
      serde_yaml::from_str(&content)?
    } else {
      SessionState::default()
    };

    Ok(Self {
      path: path.to_path_buf(),
      state,
    })
  }

  /// A session with nothing stored, replacing whatever is at `path` once
  /// saved.
  pub fn empty(path: &Path) -> Self {
    Self {
      path: path.to_path_buf(),
      state: SessionState::default(),
    }
  }

  pub fn save(&self) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let content = serde_yaml::to_string(&self.state)?;
    std::fs::write(&self.path, content)?;
    Ok(())
  }

  pub fn token(&self) -> Option<&str> {
    self.state.token.as_deref()
  }

  pub fn email(&self) -> Option<&str> {
    self.state.email.as_deref()
  }

  pub fn set_token(&mut self, email: &str, token: &str) -> Result<()> {
    info!("session: logged in as {email}");
    self.state = SessionState {
      token: Some(token.to_string()),
      email: Some(email.to_string()),
      logged_in_at: Some(Utc::now()),
    };
    self.save()
  }

  pub fn clear(&mut self) -> Result<()> {
    info!("session: cleared");
    self.state = SessionState::default();
    self.save()
  }
}

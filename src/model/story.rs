use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{timestamp, Entity};
use crate::workflow::registry::{StoryStatus, Workflow};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Story {
  pub id: Uuid,
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub status: StoryStatus,
  #[serde(default)]
  pub gherkin_description: Option<String>,
  #[serde(default)]
  pub design_url: Option<String>,
  #[serde(default)]
  pub assigned_to: Option<Uuid>,
  pub created_by: Uuid,
  #[serde(deserialize_with = "timestamp::deserialize")]
  pub created_at: DateTime<Utc>,
  #[serde(deserialize_with = "timestamp::deserialize")]
  pub updated_at: DateTime<Utc>,
}

impl Story {
  /// Generated Gherkin text. Never shown for a draft, whatever the payload says.
  pub fn gherkin(&self) -> Option<&str> {
    if self.status == StoryStatus::Draft {
      return None;
    }
    self
      .gherkin_description
      .as_deref()
      .filter(|g| !g.trim().is_empty())
  }
}

impl Entity for Story {
  fn id(&self) -> Uuid {
    self.id
  }
}

impl std::fmt::Display for Story {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} [{}]: {}", self.id, self.status.label(), self.title)
  }
}

/// Fields for a new story.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoryDraft {
  pub title: String,
  pub description: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub design_url: Option<String>,
}

/// Partial edit of a story; absent fields are left alone by the server.
#[derive(Debug, Clone, Serialize, Default)]
pub struct StoryUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl StoryUpdate {
  pub fn is_empty(&self) -> bool {
    self.title.is_none() && self.description.is_none()
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct DesignUpdate {
  pub design_url: String,
}

/// Result of asking the server to describe a story's design image.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DesignAnalysis {
  #[serde(default)]
  pub generated_description: Option<String>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{timestamp, Entity};
use crate::workflow::registry::{TaskStatus, Workflow};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
  pub id: Uuid,
  pub story_id: Uuid,
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub status: TaskStatus,
  #[serde(default)]
  pub assignee: Option<Uuid>,
  #[serde(deserialize_with = "timestamp::deserialize")]
  pub created_at: DateTime<Utc>,
  #[serde(deserialize_with = "timestamp::deserialize")]
  pub updated_at: DateTime<Utc>,
}

impl Entity for Task {
  fn id(&self) -> Uuid {
    self.id
  }
}

impl std::fmt::Display for Task {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} [{}]: {}", self.id, self.status.label(), self.title)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDraft {
  pub story_id: Uuid,
  pub title: String,
  pub description: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct TaskUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl TaskUpdate {
  pub fn is_empty(&self) -> bool {
    self.title.is_none() && self.description.is_none()
  }
}

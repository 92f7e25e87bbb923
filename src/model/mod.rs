pub mod story;
pub mod task;
pub mod timestamp;
pub mod user;

pub use story::{DesignAnalysis, Story, StoryDraft, StoryUpdate};
pub use task::{Task, TaskDraft, TaskUpdate};
pub use user::User;

use serde::Serialize;
use uuid::Uuid;

/// Anything cached by id in an entity store.
pub trait Entity: Clone {
  fn id(&self) -> Uuid;
}

/// Body of the per-entity status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate<S> {
  pub status: S,
}

/// Body of the assignment endpoints; `None` unassigns.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentUpdate {
  pub assignee_id: Option<Uuid>,
}

//! The REST backend owns persistence and business rules; this is the seam
//! the rest of the client talks to it through.

pub mod http;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{DesignAnalysis, Story, StoryDraft, StoryUpdate, Task, TaskDraft, TaskUpdate, User};
use crate::workflow::registry::{StoryStatus, TaskStatus};

pub use http::HttpBackend;

/// Every write returns the server's full representation of the entity.
#[async_trait]
pub trait Backend: Send + Sync {
  async fn list_users(&self) -> Result<Vec<User>>;

  async fn get_user(&self, id: Uuid) -> Result<User>;

  async fn list_stories(&self) -> Result<Vec<Story>>;

  async fn get_story(&self, id: Uuid) -> Result<Story>;

  async fn create_story(&self, draft: &StoryDraft) -> Result<Story>;

  async fn update_story(&self, id: Uuid, update: &StoryUpdate) -> Result<Story>;

  async fn delete_story(&self, id: Uuid) -> Result<()>;

  async fn update_story_status(&self, id: Uuid, status: &StoryStatus) -> Result<Story>;

  async fn assign_story(&self, id: Uuid, assignee: Uuid) -> Result<Story>;

  async fn update_story_design(&self, id: Uuid, design_url: &str) -> Result<Story>;

  async fn analyze_design(&self, id: Uuid) -> Result<DesignAnalysis>;

  async fn list_tasks(&self, story_id: Uuid) -> Result<Vec<Task>>;

  async fn create_task(&self, draft: &TaskDraft) -> Result<Task>;

  async fn update_task(&self, id: Uuid, update: &TaskUpdate) -> Result<Task>;

  async fn delete_task(&self, id: Uuid) -> Result<()>;

  async fn update_task_status(&self, id: Uuid, status: &TaskStatus) -> Result<Task>;

  async fn assign_task(&self, id: Uuid, assignee: Option<Uuid>) -> Result<Task>;

  async fn dashboard_summary(&self) -> Result<serde_json::Value>;
}

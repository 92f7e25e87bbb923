//! In-memory backend for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::{FlowError, Result};
use crate::model::{DesignAnalysis, Story, StoryDraft, StoryUpdate, Task, TaskDraft, TaskUpdate, User};
use crate::workflow::registry::{StoryStatus, TaskStatus};

/// Failure to inject for a named operation.
#[derive(Debug, Clone)]
pub enum Failure {
  Transport,
  Unauthorized,
  NotFound,
  Field(&'static str, &'static str),
}

impl Failure {
  fn into_error(self) -> FlowError {
    match self {
      Failure::Transport => FlowError::Transport("503: backend unavailable".into()),
      Failure::Unauthorized => FlowError::Authorization {
        status: 401,
        message: "Not authenticated".into(),
      },
      Failure::NotFound => FlowError::NotFound("not found".into()),
      Failure::Field(field, msg) => FlowError::field(field, msg),
    }
  }
}

#[derive(Default)]
struct MockState {
  stories: Vec<Story>,
  tasks: Vec<Task>,
  users: Vec<User>,
  calls: Vec<String>,
  failures: HashMap<&'static str, Failure>,
  story_gates: VecDeque<oneshot::Receiver<Vec<Story>>>,
}

/// Mock backend for testing.
///
/// Behaves like the real server for the workflow rules that matter here:
/// moving a story out of draft generates its Gherkin text. With
/// `stale_status_response` set, the status call returns the story as it was
/// before generation ran, so only a follow-up fetch sees the text.
#[derive(Default)]
pub struct MockBackend {
  state: Mutex<MockState>,
  stale_status_response: bool,
}

impl MockBackend {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_stale_status_response(mut self) -> Self {
    self.stale_status_response = true;
    self
  }

  pub fn with_story(self, story: Story) -> Self {
    self.state().stories.push(story);
    self
  }

  pub fn with_task(self, task: Task) -> Self {
    self.state().tasks.push(task);
    self
  }

  pub fn with_user(self, user: User) -> Self {
    self.state().users.push(user);
    self
  }

  /// Makes every later call of `op` fail until [`MockBackend::heal`].
  pub fn fail(&self, op: &'static str, failure: Failure) {
    self.state().failures.insert(op, failure);
  }

  pub fn heal(&self, op: &'static str) {
    self.state().failures.remove(op);
  }

  /// The next `list_stories` call waits for this channel instead of reading
  /// the stored stories.
  pub fn gate_story_list(&self) -> oneshot::Sender<Vec<Story>> {
    let (tx, rx) = oneshot::channel();
    self.state().story_gates.push_back(rx);
    tx
  }

  pub fn calls(&self) -> Vec<String> {
    self.state().calls.clone()
  }

  pub fn call_count(&self, op: &str) -> usize {
    self.state().calls.iter().filter(|c| c.as_str() == op).count()
  }

  pub fn stored_story(&self, id: Uuid) -> Option<Story> {
    self.state().stories.iter().find(|s| s.id == id).cloned()
  }

  fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
    self.state.lock().unwrap()
  }

  fn enter(&self, op: &'static str) -> Result<()> {
    let mut state = self.state();
    state.calls.push(op.to_string());
    match state.failures.get(op) {
      Some(failure) => Err(failure.clone().into_error()),
      None => Ok(()),
    }
  }

  fn with_story_mut(&self, id: Uuid, f: impl FnOnce(&mut Story)) -> Result<Story> {
    let mut state = self.state();
    let story = state
      .stories
      .iter_mut()
      .find(|s| s.id == id)
      .ok_or_else(|| FlowError::NotFound(format!("story {id}")))?;
    f(story);
    story.updated_at = Utc::now();
    Ok(story.clone())
  }

  fn with_task_mut(&self, id: Uuid, f: impl FnOnce(&mut Task)) -> Result<Task> {
    let mut state = self.state();
    let task = state
      .tasks
      .iter_mut()
      .find(|t| t.id == id)
      .ok_or_else(|| FlowError::NotFound(format!("task {id}")))?;
    f(task);
    task.updated_at = Utc::now();
    Ok(task.clone())
  }
}

pub fn story(title: &str, status: StoryStatus) -> Story {
  Story {
    id: Uuid::new_v4(),
    title: title.to_string(),
    description: format!("{title} description"),
    status,
    gherkin_description: None,
    design_url: None,
    assigned_to: None,
    created_by: Uuid::nil(),
    created_at: Utc::now(),
    updated_at: Utc::now(),
  }
}

pub fn task(story_id: Uuid, title: &str, status: TaskStatus) -> Task {
  Task {
    id: Uuid::new_v4(),
    story_id,
    title: title.to_string(),
    description: String::new(),
    status,
    assignee: None,
    created_at: Utc::now(),
    updated_at: Utc::now(),
  }
}

pub fn user(name: &str) -> User {
  User {
    id: Uuid::new_v4(),
    name: Some(name.to_string()),
    email: format!("{}@example.com", name.to_lowercase()),
  }
}

#[async_trait]
impl Backend for MockBackend {
  async fn list_users(&self) -> Result<Vec<User>> {
    self.enter("list_users")?;
    Ok(self.state().users.clone())
  }

  async fn get_user(&self, id: Uuid) -> Result<User> {
    self.enter("get_user")?;
    self
      .state()
      .users
      .iter()
      .find(|u| u.id == id)
      .cloned()
      .ok_or_else(|| FlowError::NotFound(format!("user {id}")))
  }

  async fn list_stories(&self) -> Result<Vec<Story>> {
    self.enter("list_stories")?;
    let gate = self.state().story_gates.pop_front();
    match gate {
      Some(rx) => rx
        .await
        .map_err(|_| FlowError::Transport("gate dropped".into())),
      None => Ok(self.state().stories.clone()),
    }
  }

  async fn get_story(&self, id: Uuid) -> Result<Story> {
    self.enter("get_story")?;
    self
      .stored_story(id)
      .ok_or_else(|| FlowError::NotFound(format!("story {id}")))
  }

  async fn create_story(&self, draft: &StoryDraft) -> Result<Story> {
    self.enter("create_story")?;
    let mut created = story(&draft.title, StoryStatus::Draft);
    created.description = draft.description.clone();
    created.design_url = draft.design_url.clone();
    self.state().stories.push(created.clone());
    Ok(created)
  }

  async fn update_story(&self, id: Uuid, update: &StoryUpdate) -> Result<Story> {
    self.enter("update_story")?;
    self.with_story_mut(id, |s| {
      if let Some(title) = &update.title {
        s.title = title.clone();
      }
      if let Some(description) = &update.description {
        s.description = description.clone();
      }
    })
  }

  async fn delete_story(&self, id: Uuid) -> Result<()> {
    self.enter("delete_story")?;
    let mut state = self.state();
    state.stories.retain(|s| s.id != id);
    state.tasks.retain(|t| t.story_id != id);
    Ok(())
  }

  async fn update_story_status(&self, id: Uuid, status: &StoryStatus) -> Result<Story> {
    self.enter("update_story_status")?;
    let before = self.with_story_mut(id, |s| s.status = status.clone())?;
    let generated = self.with_story_mut(id, |s| {
      if s.gherkin_description.is_none() && s.status == StoryStatus::ReadyForRefinement {
        s.gherkin_description = Some(format!("Feature: {}\n  Scenario: {}", s.title, s.title));
      }
    })?;
    if self.stale_status_response {
      Ok(before)
    } else {
      Ok(generated)
    }
  }

  async fn assign_story(&self, id: Uuid, assignee: Uuid) -> Result<Story> {
    self.enter("assign_story")?;
    self.with_story_mut(id, |s| s.assigned_to = Some(assignee))
  }

  async fn update_story_design(&self, id: Uuid, design_url: &str) -> Result<Story> {
    self.enter("update_story_design")?;
    self.with_story_mut(id, |s| s.design_url = Some(design_url.to_string()))
  }

  async fn analyze_design(&self, id: Uuid) -> Result<DesignAnalysis> {
    self.enter("analyze_design")?;
    let description = "A login form with email and password fields".to_string();
    self.with_story_mut(id, |s| s.description = description.clone())?;
    Ok(DesignAnalysis {
      generated_description: Some(description),
    })
  }

  async fn list_tasks(&self, story_id: Uuid) -> Result<Vec<Task>> {
    self.enter("list_tasks")?;
    Ok(
      self
        .state()
        .tasks
        .iter()
        .filter(|t| t.story_id == story_id)
        .cloned()
        .collect(),
    )
  }

  async fn create_task(&self, draft: &TaskDraft) -> Result<Task> {
    self.enter("create_task")?;
    if draft.title.trim().is_empty() {
      return Err(FlowError::field("title", "field required"));
    }
    let mut created = task(draft.story_id, &draft.title, TaskStatus::Todo);
    created.description = draft.description.clone();
    self.state().tasks.push(created.clone());
    Ok(created)
  }

  async fn update_task(&self, id: Uuid, update: &TaskUpdate) -> Result<Task> {
    self.enter("update_task")?;
    self.with_task_mut(id, |t| {
      if let Some(title) = &update.title {
        t.title = title.clone();
      }
      if let Some(description) = &update.description {
        t.description = description.clone();
      }
    })
  }

  async fn delete_task(&self, id: Uuid) -> Result<()> {
    self.enter("delete_task")?;
    self.state().tasks.retain(|t| t.id != id);
    Ok(())
  }

  async fn update_task_status(&self, id: Uuid, status: &TaskStatus) -> Result<Task> {
    self.enter("update_task_status")?;
    self.with_task_mut(id, |t| t.status = status.clone())
  }

  async fn assign_task(&self, id: Uuid, assignee: Option<Uuid>) -> Result<Task> {
    self.enter("assign_task")?;
    self.with_task_mut(id, |t| t.assignee = assignee)
  }

  async fn dashboard_summary(&self) -> Result<serde_json::Value> {
    self.enter("dashboard_summary")?;
    let state = self.state();
    Ok(serde_json::json!({
      "total_stories": state.stories.len(),
      "total_tasks": state.tasks.len(),
    }))
  }
}

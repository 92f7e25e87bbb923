//! One client session: the backend handle, the entity caches, and the
//! operations that keep the caches reconciled with the server.
//!
//! Writes never patch the cache from local input. The cache entry is always
//! the representation the server sent back.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::{FlowError, Result};
use crate::filter::{ListView, PageView};
use crate::model::{DesignAnalysis, Story, StoryDraft, StoryUpdate, Task, TaskDraft, TaskUpdate, User};
use crate::store::entity_store::{lock, EntityStore, SharedStore};
use crate::workflow::registry::{StoryStatus, TaskStatus};
use crate::workflow::transition::TransitionController;

pub struct Workspace {
  backend: Arc<dyn Backend>,
  stories: SharedStore<Story>,
  tasks: SharedStore<Task>,
  users: SharedStore<User>,
  /// Story whose tasks the task cache currently holds.
  task_story: Mutex<Option<Uuid>>,
}

/// Result of creating several tasks in one go.
#[derive(Debug, Default)]
pub struct BatchOutcome {
  pub created: Vec<Task>,
  /// Drafts the server rejected with field errors, by title.
  pub rejected: Vec<(String, FlowError)>,
}

impl Workspace {
  pub fn new(backend: Arc<dyn Backend>) -> Self {
    Self {
      backend,
      stories: EntityStore::new("stories").into_shared(),
      tasks: EntityStore::new("tasks").into_shared(),
      users: EntityStore::new("users").into_shared(),
      task_story: Mutex::new(None),
    }
  }

  pub fn transitions(&self) -> TransitionController {
    TransitionController::new(self.backend.clone(), self.stories.clone(), self.tasks.clone())
  }

  pub fn stories(&self) -> Vec<Story> {
    lock(&self.stories).items().to_vec()
  }

  pub fn tasks(&self) -> Vec<Task> {
    lock(&self.tasks).items().to_vec()
  }

  pub fn users(&self) -> Vec<User> {
    lock(&self.users).items().to_vec()
  }

  pub fn cached_story(&self, id: Uuid) -> Option<Story> {
    lock(&self.stories).get(id).cloned()
  }

  pub fn cached_task(&self, id: Uuid) -> Option<Task> {
    lock(&self.tasks).get(id).cloned()
  }

  // --- fetches ---

  /// Reloads every story. Returns false when a newer fetch already landed
  /// and this response was dropped.
  pub async fn refresh_stories(&self) -> Result<bool> {
    let token = lock(&self.stories).begin_fetch();
    let stories = self.backend.list_stories().await?;
    Ok(lock(&self.stories).complete_fetch(token, stories))
  }

  /// Reloads the tasks of one story; the task cache holds a single story's
  /// tasks at a time.
  pub async fn refresh_tasks(&self, story_id: Uuid) -> Result<bool> {
    let token = lock(&self.tasks).begin_fetch();
    let tasks = self.backend.list_tasks(story_id).await?;

    let mut store = lock(&self.tasks);
    if !store.complete_fetch(token, tasks) {
      return Ok(false);
    }
    store.retain(|t| t.story_id == story_id);
    *self.task_scope() = Some(story_id);
    Ok(true)
  }

  fn task_scope(&self) -> std::sync::MutexGuard<'_, Option<Uuid>> {
    self.task_story.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub async fn refresh_users(&self) -> Result<bool> {
    let token = lock(&self.users).begin_fetch();
    let users = self.backend.list_users().await?;
    Ok(lock(&self.users).complete_fetch(token, users))
  }

  /// Fetches one story and replaces its cache entry.
  pub async fn load_story(&self, id: Uuid) -> Result<Story> {
    let story = self.backend.get_story(id).await?;
    lock(&self.stories).upsert(story.clone());
    Ok(story)
  }

  pub async fn load_user(&self, id: Uuid) -> Result<User> {
    if let Some(user) = lock(&self.users).get(id).cloned() {
      return Ok(user);
    }
    let user = self.backend.get_user(id).await?;
    lock(&self.users).upsert(user.clone());
    Ok(user)
  }

  pub async fn dashboard(&self) -> Result<serde_json::Value> {
    self.backend.dashboard_summary().await
  }

  // --- list views ---

  pub fn story_page(&self, view: &ListView<StoryStatus>) -> PageView<Story> {
    view.render(lock(&self.stories).items())
  }

  pub fn task_page(&self, view: &ListView<TaskStatus>) -> PageView<Task> {
    view.render(lock(&self.tasks).items())
  }

  // --- stories ---

  pub async fn create_story(&self, draft: &StoryDraft) -> Result<Story> {
    require_title(&draft.title)?;
    let story = self.backend.create_story(draft).await?;
    info!("created story {}", story.id);
    lock(&self.stories).insert_front(story.clone());
    Ok(story)
  }

  pub async fn update_story(&self, id: Uuid, update: &StoryUpdate) -> Result<Story> {
    if update.is_empty() {
      return Err(FlowError::Validation("nothing to update".into()));
    }
    if let Some(title) = &update.title {
      require_title(title)?;
    }
    let story = self.backend.update_story(id, update).await?;
    lock(&self.stories).upsert(story.clone());
    Ok(story)
  }

  /// Deletes the story and drops its tasks from the cache with it.
  pub async fn delete_story(&self, id: Uuid) -> Result<()> {
    self.backend.delete_story(id).await?;
    lock(&self.stories).remove(id);
    lock(&self.tasks).retain(|t| t.story_id != id);
    info!("deleted story {id}");
    Ok(())
  }

  pub async fn set_design_url(&self, id: Uuid, design_url: &str) -> Result<Story> {
    let design_url = design_url.trim();
    if design_url.is_empty() {
      return Err(FlowError::field("design_url", "must not be empty"));
    }
    let story = self.backend.update_story_design(id, design_url).await?;
    lock(&self.stories).upsert(story.clone());
    Ok(story)
  }

  /// Asks the server to describe the story's design image, then re-reads
  /// the story since the server may have rewritten its description.
  pub async fn analyze_design(&self, id: Uuid) -> Result<DesignAnalysis> {
    let analysis = self.backend.analyze_design(id).await?;
    if let Err(e) = self.load_story(id).await {
      warn!("story {id}: reload after design analysis failed: {e}");
    }
    Ok(analysis)
  }

  // --- tasks ---

  async fn ensure_story_exists(&self, story_id: Uuid) -> Result<()> {
    if lock(&self.stories).contains(story_id) {
      return Ok(());
    }
    match self.load_story(story_id).await {
      Ok(_) => Ok(()),
      Err(FlowError::NotFound(_)) => Err(FlowError::Validation(format!(
        "story {story_id} does not exist"
      ))),
      Err(e) => Err(e),
    }
  }

  pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task> {
    self.ensure_story_exists(draft.story_id).await?;
    let task = self.backend.create_task(draft).await?;
    info!("created task {} for story {}", task.id, task.story_id);
    let scope = *self.task_scope();
    if scope.map_or(true, |story_id| story_id == task.story_id) {
      lock(&self.tasks).upsert(task.clone());
    }
    Ok(task)
  }

  /// Creates drafts one at a time. Field-level rejections are collected and
  /// the rest carry on; any other failure stops the batch.
  pub async fn create_tasks(&self, drafts: &[TaskDraft]) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    for draft in drafts {
      match self.create_task(draft).await {
        Ok(task) => outcome.created.push(task),
        Err(e @ FlowError::FieldValidation(_)) => {
          warn!("task {:?} rejected: {e}", draft.title);
          outcome.rejected.push((draft.title.clone(), e));
        }
        Err(e) => return Err(e),
      }
    }
    Ok(outcome)
  }

  pub async fn update_task(&self, id: Uuid, update: &TaskUpdate) -> Result<Task> {
    if update.is_empty() {
      return Err(FlowError::Validation("nothing to update".into()));
    }
    let task = self.backend.update_task(id, update).await?;
    lock(&self.tasks).replace(task.clone());
    Ok(task)
  }

  pub async fn delete_task(&self, id: Uuid) -> Result<()> {
    self.backend.delete_task(id).await?;
    lock(&self.tasks).remove(id);
    info!("deleted task {id}");
    Ok(())
  }
}

fn require_title(title: &str) -> Result<()> {
  if title.trim().is_empty() {
    return Err(FlowError::field("title", "must not be empty"));
  }
  Ok(())
}

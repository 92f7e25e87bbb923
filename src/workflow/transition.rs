//! Status changes and assignments for a single story or task.
//!
//! Each request runs `Idle -> Validating -> (Rejected | Submitting) ->
//! (Reconciled | Failed) -> Idle`. Validation is local and never reaches the
//! backend. While a request is Submitting the entity is marked in flight and
//! a second request for it is rejected. On success the cached entity is
//! replaced with the server's representation; on failure the cache is left
//! exactly as it was.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::{FlowError, Result};
use crate::model::{Entity, Story, Task};
use crate::store::entity_store::{lock, SharedStore, SubmitGuard};
use crate::workflow::registry::{StoryStatus, TaskStatus, Workflow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Idle,
  Validating,
  Rejected,
  Submitting,
  Reconciled,
  Failed,
}

impl std::fmt::Display for Phase {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{self:?}")
  }
}

fn step(kind: &str, id: Uuid, from: Phase, to: Phase) {
  info!("{kind} {id}: {from} -> {to}");
}

/// Asks the user before a transition with server-side side effects.
pub trait Confirm: Send + Sync {
  fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
  F: Fn(&str) -> bool + Send + Sync,
{
  fn confirm(&self, prompt: &str) -> bool {
    self(prompt)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome<T> {
  /// The cache now holds this server representation.
  Reconciled(T),
  /// Target equals the current status; nothing was sent.
  Unchanged,
  /// The user did not confirm a generating transition; nothing was sent.
  Declined,
}

pub const GENERATING_PROMPT: &str =
  "Transitioning to \"Ready for Refinement\" will generate Gherkin format automatically. Continue?";

pub struct TransitionController {
  backend: Arc<dyn Backend>,
  stories: SharedStore<Story>,
  tasks: SharedStore<Task>,
}

impl TransitionController {
  pub fn new(
    backend: Arc<dyn Backend>,
    stories: SharedStore<Story>,
    tasks: SharedStore<Task>,
  ) -> Self {
    Self {
      backend,
      stories,
      tasks,
    }
  }

  /// Last known-good story, fetched and cached if this session has not
  /// seen it yet.
  async fn current_story(&self, id: Uuid) -> Result<Story> {
    if let Some(story) = lock(&self.stories).get(id).cloned() {
      return Ok(story);
    }
    let story = self.backend.get_story(id).await?;
    lock(&self.stories).upsert(story.clone());
    Ok(story)
  }

  fn current_task(&self, id: Uuid) -> Result<Task> {
    lock(&self.tasks)
      .get(id)
      .cloned()
      .ok_or_else(|| FlowError::NotFound(format!("task {id} is not loaded")))
  }

  pub async fn transition_story(
    &self,
    id: Uuid,
    target: StoryStatus,
    confirm: &dyn Confirm,
  ) -> Result<TransitionOutcome<Story>> {
    step(StoryStatus::KIND, id, Phase::Idle, Phase::Validating);
    let current = self.current_story(id).await?;
    let from = current.status;

    if from == target {
      step(StoryStatus::KIND, id, Phase::Validating, Phase::Idle);
      return Ok(TransitionOutcome::Unchanged);
    }
    validate(StoryStatus::KIND, id, &from, &target)?;

    // Phase one submits the status; phase two re-reads the story so the
    // Gherkin text generated by the server is guaranteed to be present.
    let generating = from.is_generating_transition(&target);
    if generating && !confirm.confirm(GENERATING_PROMPT) {
      info!("story {id}: generating transition declined");
      step(StoryStatus::KIND, id, Phase::Validating, Phase::Idle);
      return Ok(TransitionOutcome::Declined);
    }

    let _guard = in_flight(&self.stories, StoryStatus::KIND, id)?;
    step(StoryStatus::KIND, id, Phase::Validating, Phase::Submitting);

    let updated = match self.backend.update_story_status(id, &target).await {
      Ok(story) => story,
      Err(e) => return Err(failed(StoryStatus::KIND, id, e)),
    };

    let reconciled = if generating {
      match self.backend.get_story(id).await {
        Ok(fresh) => fresh,
        Err(e) => {
          warn!("story {id}: follow-up fetch failed, keeping status response: {e}");
          updated
        }
      }
    } else {
      updated
    };

    lock(&self.stories).upsert(reconciled.clone());
    step(StoryStatus::KIND, id, Phase::Submitting, Phase::Reconciled);
    Ok(TransitionOutcome::Reconciled(reconciled))
  }

  pub async fn transition_task(&self, id: Uuid, target: TaskStatus) -> Result<TransitionOutcome<Task>> {
    step(TaskStatus::KIND, id, Phase::Idle, Phase::Validating);
    let current = self.current_task(id)?;
    validate(TaskStatus::KIND, id, &current.status, &target)?;

    let _guard = in_flight(&self.tasks, TaskStatus::KIND, id)?;
    step(TaskStatus::KIND, id, Phase::Validating, Phase::Submitting);

    let updated = match self.backend.update_task_status(id, &target).await {
      Ok(task) => task,
      Err(e) => return Err(failed(TaskStatus::KIND, id, e)),
    };

    replace_task(&self.tasks, &updated);
    step(TaskStatus::KIND, id, Phase::Submitting, Phase::Reconciled);
    Ok(TransitionOutcome::Reconciled(updated))
  }

  pub async fn assign_story(&self, id: Uuid, assignee: Uuid) -> Result<Story> {
    step("story", id, Phase::Idle, Phase::Validating);
    let current = self.current_story(id).await?;
    if current.assigned_to == Some(assignee) {
      step("story", id, Phase::Validating, Phase::Rejected);
      return Err(FlowError::Validation(format!(
        "story {id} is already assigned to {assignee}"
      )));
    }

    let _guard = in_flight(&self.stories, "story", id)?;
    step("story", id, Phase::Validating, Phase::Submitting);

    let updated = match self.backend.assign_story(id, assignee).await {
      Ok(story) => story,
      Err(e) => return Err(failed("story", id, e)),
    };

    lock(&self.stories).upsert(updated.clone());
    step("story", id, Phase::Submitting, Phase::Reconciled);
    Ok(updated)
  }

  /// `None` unassigns the task.
  pub async fn assign_task(&self, id: Uuid, assignee: Option<Uuid>) -> Result<Task> {
    step("task", id, Phase::Idle, Phase::Validating);
    let current = self.current_task(id)?;
    if current.assignee == assignee {
      step("task", id, Phase::Validating, Phase::Rejected);
      return Err(FlowError::Validation(match assignee {
        Some(user) => format!("task {id} is already assigned to {user}"),
        None => format!("task {id} is already unassigned"),
      }));
    }

    let _guard = in_flight(&self.tasks, "task", id)?;
    step("task", id, Phase::Validating, Phase::Submitting);

    let updated = match self.backend.assign_task(id, assignee).await {
      Ok(task) => task,
      Err(e) => return Err(failed("task", id, e)),
    };

    replace_task(&self.tasks, &updated);
    step("task", id, Phase::Submitting, Phase::Reconciled);
    Ok(updated)
  }
}

fn validate<S: Workflow>(kind: &str, id: Uuid, from: &S, target: &S) -> Result<()> {
  if from.can_transition_to(target) {
    return Ok(());
  }
  step(kind, id, Phase::Validating, Phase::Rejected);
  let allowed: Vec<String> = from.allowed_next().iter().map(|s| s.label()).collect();
  Err(FlowError::Validation(format!(
    "{kind} cannot move from {} to {} (allowed: {})",
    from.label(),
    target.label(),
    allowed.join(", ")
  )))
}

fn in_flight<T: Entity>(store: &SharedStore<T>, kind: &str, id: Uuid) -> Result<SubmitGuard<T>> {
  SubmitGuard::acquire(store, id).ok_or_else(|| {
    step(kind, id, Phase::Validating, Phase::Rejected);
    FlowError::Validation(format!("{kind} {id} already has a change in flight"))
  })
}

/// The task cache may have moved on to another story while the write was in
/// flight; a task it no longer holds is not added back.
fn replace_task(tasks: &SharedStore<Task>, task: &Task) {
  if !lock(tasks).replace(task.clone()) {
    debug!("task {}: no longer cached, result not stored", task.id);
  }
}

fn failed(kind: &str, id: Uuid, e: FlowError) -> FlowError {
  warn!("{kind} {id}: {} -> {}: {e}", Phase::Submitting, Phase::Failed);
  e
}

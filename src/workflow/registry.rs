//! Status codes for stories and tasks, their display metadata, and the
//! statuses reachable from each one.
//!
//! Lookups never fail: a code the client does not know is carried through
//! as `Other` and gets fallback metadata.

use serde::{Deserialize, Serialize};

/// Colour family a status is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
  Gray,
  Blue,
  Indigo,
  Yellow,
  Orange,
  Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMeta {
  pub label: &'static str,
  pub tone: Tone,
  pub description: &'static str,
}

pub trait Workflow: Clone + PartialEq + std::fmt::Display + Sized {
  /// Entity kind, used in log lines.
  const KIND: &'static str;

  /// Wire code, e.g. `READY_FOR_TESTING`.
  fn code(&self) -> &str;

  /// Every known status in workflow order.
  fn all() -> Vec<Self>;

  fn meta(&self) -> Option<&'static StatusMeta>;

  /// Statuses a transition from `self` may target.
  fn allowed_next(&self) -> Vec<Self>;

  fn label(&self) -> String {
    match self.meta() {
      Some(meta) => meta.label.to_string(),
      None => fallback_label(self.code()),
    }
  }

  fn tone(&self) -> Tone {
    self.meta().map(|m| m.tone).unwrap_or(Tone::Gray)
  }

  fn can_transition_to(&self, target: &Self) -> bool {
    self.allowed_next().contains(target)
  }
}

fn fallback_label(code: &str) -> String {
  if code.is_empty() {
    "Unknown".to_string()
  } else {
    code.replace('_', " ")
  }
}

/// Story workflow, in order. A story moves forward one step at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StoryStatus {
  Draft,
  ReadyForRefinement,
  Refined,
  Development,
  ReadyForTesting,
  ReadyForProduction,
  Other(String),
}

static STORY_META: [StatusMeta; 6] = [
  StatusMeta {
    label: "Draft",
    tone: Tone::Gray,
    description: "Initial creation phase",
  },
  StatusMeta {
    label: "Ready for Refinement",
    tone: Tone::Blue,
    description: "Ready to be refined with more details",
  },
  StatusMeta {
    label: "Refined",
    tone: Tone::Indigo,
    description: "Fully specified with acceptance criteria",
  },
  StatusMeta {
    label: "Development",
    tone: Tone::Yellow,
    description: "Currently being implemented",
  },
  StatusMeta {
    label: "Ready for Testing",
    tone: Tone::Orange,
    description: "Implementation complete, ready for QA",
  },
  StatusMeta {
    label: "Ready for Production",
    tone: Tone::Green,
    description: "Tested and ready for deployment",
  },
];

impl StoryStatus {
  fn position(&self) -> Option<usize> {
    match self {
      StoryStatus::Draft => Some(0),
      StoryStatus::ReadyForRefinement => Some(1),
      StoryStatus::Refined => Some(2),
      StoryStatus::Development => Some(3),
      StoryStatus::ReadyForTesting => Some(4),
      StoryStatus::ReadyForProduction => Some(5),
      StoryStatus::Other(_) => None,
    }
  }

  /// Parses a known code only; used for user input.
  pub fn parse_known(code: &str) -> Option<Self> {
    match Self::from(code.trim().to_uppercase()) {
      StoryStatus::Other(_) => None,
      status => Some(status),
    }
  }

  /// Leaving the first status for the second makes the server generate the
  /// Gherkin text, which is not idempotent.
  pub fn is_generating_transition(&self, target: &StoryStatus) -> bool {
    *self == StoryStatus::Draft && *target == StoryStatus::ReadyForRefinement
  }
}

impl Workflow for StoryStatus {
  const KIND: &'static str = "story";

  fn code(&self) -> &str {
    match self {
      StoryStatus::Draft => "DRAFT",
      StoryStatus::ReadyForRefinement => "READY_FOR_REFINEMENT",
      StoryStatus::Refined => "REFINED",
      StoryStatus::Development => "DEVELOPMENT",
      StoryStatus::ReadyForTesting => "READY_FOR_TESTING",
      StoryStatus::ReadyForProduction => "READY_FOR_PRODUCTION",
      StoryStatus::Other(code) => code,
    }
  }

  fn all() -> Vec<Self> {
    vec![
      StoryStatus::Draft,
      StoryStatus::ReadyForRefinement,
      StoryStatus::Refined,
      StoryStatus::Development,
      StoryStatus::ReadyForTesting,
      StoryStatus::ReadyForProduction,
    ]
  }

  fn meta(&self) -> Option<&'static StatusMeta> {
    self.position().map(|i| &STORY_META[i])
  }

  fn allowed_next(&self) -> Vec<Self> {
    let all = Self::all();
    match self.position() {
      Some(i) => all.into_iter().skip(i).take(2).collect(),
      // An unknown status offers only the entry point of the workflow.
      None => all.into_iter().take(1).collect(),
    }
  }
}

impl From<String> for StoryStatus {
  fn from(code: String) -> Self {
    match code.as_str() {
      "DRAFT" => StoryStatus::Draft,
      "READY_FOR_REFINEMENT" => StoryStatus::ReadyForRefinement,
      "REFINED" => StoryStatus::Refined,
      "DEVELOPMENT" => StoryStatus::Development,
      "READY_FOR_TESTING" => StoryStatus::ReadyForTesting,
      "READY_FOR_PRODUCTION" => StoryStatus::ReadyForProduction,
      _ => StoryStatus::Other(code),
    }
  }
}

impl From<StoryStatus> for String {
  fn from(status: StoryStatus) -> Self {
    status.code().to_string()
  }
}

impl std::fmt::Display for StoryStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.code())
  }
}

/// Task workflow: to do, in development, complete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
  Todo,
  Development,
  Complete,
  Other(String),
}

static TASK_META: [StatusMeta; 3] = [
  StatusMeta {
    label: "To Do",
    tone: Tone::Gray,
    description: "Not started",
  },
  StatusMeta {
    label: "In Development",
    tone: Tone::Blue,
    description: "Work in progress",
  },
  StatusMeta {
    label: "Complete",
    tone: Tone::Green,
    description: "Done",
  },
];

impl TaskStatus {
  pub fn parse_known(code: &str) -> Option<Self> {
    match Self::from(code.trim().to_uppercase()) {
      TaskStatus::Other(_) => None,
      status => Some(status),
    }
  }
}

impl Workflow for TaskStatus {
  const KIND: &'static str = "task";

  fn code(&self) -> &str {
    match self {
      TaskStatus::Todo => "TODO",
      TaskStatus::Development => "DEVELOPMENT",
      TaskStatus::Complete => "COMPLETE",
      TaskStatus::Other(code) => code,
    }
  }

  fn all() -> Vec<Self> {
    vec![TaskStatus::Todo, TaskStatus::Development, TaskStatus::Complete]
  }

  fn meta(&self) -> Option<&'static StatusMeta> {
    match self {
      TaskStatus::Todo => Some(&TASK_META[0]),
      TaskStatus::Development => Some(&TASK_META[1]),
      TaskStatus::Complete => Some(&TASK_META[2]),
      TaskStatus::Other(_) => None,
    }
  }

  fn allowed_next(&self) -> Vec<Self> {
    match self {
      TaskStatus::Todo => vec![TaskStatus::Development],
      TaskStatus::Development => vec![TaskStatus::Todo, TaskStatus::Complete],
      TaskStatus::Complete => vec![TaskStatus::Development],
      // Permissive: an unrecognised status may go anywhere.
      TaskStatus::Other(_) => Self::all(),
    }
  }
}

impl From<String> for TaskStatus {
  fn from(code: String) -> Self {
    match code.as_str() {
      "TODO" => TaskStatus::Todo,
      "DEVELOPMENT" => TaskStatus::Development,
      "COMPLETE" => TaskStatus::Complete,
      _ => TaskStatus::Other(code),
    }
  }
}

impl From<TaskStatus> for String {
  fn from(status: TaskStatus) -> Self {
    status.code().to_string()
  }
}

impl std::fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.code())
  }
}

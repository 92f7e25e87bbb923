use std::sync::Arc;

use serde_json::{json, Value};
use storyflow::backend::HttpBackend;
use storyflow::config::Config;
use storyflow::error::FlowError;
use storyflow::filter::{FilterCriteria, ListView};
use storyflow::model::{StoryDraft, TaskDraft};
use storyflow::workflow::registry::{StoryStatus, TaskStatus};
use storyflow::workflow::transition::TransitionOutcome;
use storyflow::workspace::Workspace;
use uuid::Uuid;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW: &str = "2024-05-01T10:00:00";

fn story_json(id: Uuid, title: &str, status: &str, gherkin: Option<&str>) -> Value {
  json!({
    "id": id,
    "title": title,
    "description": "As a user I want to log in",
    "status": status,
    "gherkin_description": gherkin,
    "design_url": null,
    "assigned_to": null,
    "created_by": Uuid::nil(),
    "created_at": NOW,
    "updated_at": NOW,
  })
}

fn task_json(id: Uuid, story_id: Uuid, title: &str, status: &str) -> Value {
  json!({
    "id": id,
    "story_id": story_id,
    "title": title,
    "description": "",
    "status": status,
    "assignee": null,
    "created_at": NOW,
    "updated_at": "2024-05-01T10:00:00Z",
  })
}

fn workspace(server: &MockServer) -> Workspace {
  let config = Config {
    api_url: server.uri(),
    ..Config::default()
  };
  let backend = HttpBackend::new(&config, Some("token-1")).unwrap();
  Workspace::new(Arc::new(backend))
}

#[tokio::test]
async fn generating_transition_refetches_story_for_gherkin() {
  let server = MockServer::start().await;
  let id = Uuid::new_v4();

  Mock::given(method("GET"))
    .and(path("/stories/"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!([story_json(id, "Login", "DRAFT", None)])))
    .expect(1)
    .mount(&server)
    .await;
  Mock::given(method("PUT"))
    .and(path(format!("/stories/{id}/status")))
    .and(body_json(json!({"status": "READY_FOR_REFINEMENT"})))
    .respond_with(
      ResponseTemplate::new(200).set_body_json(story_json(id, "Login", "READY_FOR_REFINEMENT", None)),
    )
    .expect(1)
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path(format!("/stories/{id}")))
    .respond_with(ResponseTemplate::new(200).set_body_json(story_json(
      id,
      "Login",
      "READY_FOR_REFINEMENT",
      Some("Feature: Login"),
    )))
    .expect(1)
    .mount(&server)
    .await;

  let ws = workspace(&server);
  ws.refresh_stories().await.unwrap();

  let outcome = ws
    .transitions()
    .transition_story(id, StoryStatus::ReadyForRefinement, &|_: &str| true)
    .await
    .unwrap();

  let TransitionOutcome::Reconciled(story) = outcome else {
    panic!("expected reconciled story, got {outcome:?}");
  };
  assert_eq!(story.gherkin(), Some("Feature: Login"));
  assert_eq!(ws.cached_story(id).unwrap(), story);
}

#[tokio::test]
async fn declined_generating_transition_sends_nothing() {
  let server = MockServer::start().await;
  let id = Uuid::new_v4();

  Mock::given(method("GET"))
    .and(path(format!("/stories/{id}")))
    .respond_with(ResponseTemplate::new(200).set_body_json(story_json(id, "Login", "DRAFT", None)))
    .mount(&server)
    .await;
  Mock::given(method("PUT"))
    .respond_with(ResponseTemplate::new(500))
    .expect(0)
    .mount(&server)
    .await;

  let ws = workspace(&server);
  let outcome = ws
    .transitions()
    .transition_story(id, StoryStatus::ReadyForRefinement, &|_: &str| false)
    .await
    .unwrap();
  assert_eq!(outcome, TransitionOutcome::Declined);
  assert_eq!(ws.cached_story(id).unwrap().status, StoryStatus::Draft);
}

#[tokio::test]
async fn rejected_story_creation_leaves_list_untouched() {
  let server = MockServer::start().await;

  Mock::given(method("POST"))
    .and(path("/stories/"))
    .respond_with(ResponseTemplate::new(422).set_body_json(json!({
      "detail": [{"loc": ["body", "design_url"], "msg": "invalid url", "type": "value_error"}]
    })))
    .mount(&server)
    .await;

  let ws = workspace(&server);
  let draft = StoryDraft {
    title: "Signup".into(),
    description: String::new(),
    design_url: Some("not a url".into()),
  };
  let err = ws.create_story(&draft).await.unwrap_err();
  match err {
    FlowError::FieldValidation(fields) => assert_eq!(fields["design_url"], "invalid url"),
    other => panic!("expected field validation, got {other:?}"),
  }
  assert!(ws.stories().is_empty());
}

#[tokio::test]
async fn task_lifecycle_against_http_backend() {
  let server = MockServer::start().await;
  let story_id = Uuid::new_v4();
  let task_id = Uuid::new_v4();

  Mock::given(method("GET"))
    .and(path(format!("/stories/{story_id}")))
    .respond_with(ResponseTemplate::new(200).set_body_json(story_json(story_id, "Login", "DEVELOPMENT", None)))
    .mount(&server)
    .await;
  Mock::given(method("POST"))
    .and(path("/tasks/"))
    .respond_with(ResponseTemplate::new(201).set_body_json(task_json(task_id, story_id, "Build form", "TODO")))
    .mount(&server)
    .await;
  Mock::given(method("PUT"))
    .and(path(format!("/tasks/{task_id}/status")))
    .and(body_json(json!({"status": "DEVELOPMENT"})))
    .respond_with(
      ResponseTemplate::new(200).set_body_json(task_json(task_id, story_id, "Build form", "DEVELOPMENT")),
    )
    .mount(&server)
    .await;

  let ws = workspace(&server);
  let draft = TaskDraft {
    story_id,
    title: "Build form".into(),
    description: String::new(),
  };
  let created = ws.create_task(&draft).await.unwrap();
  assert_eq!(created.status, TaskStatus::Todo);

  let outcome = ws
    .transitions()
    .transition_task(task_id, TaskStatus::Development)
    .await
    .unwrap();
  assert!(matches!(outcome, TransitionOutcome::Reconciled(ref t) if t.status == TaskStatus::Development));

  let mut view = ListView::new(10);
  view.set_criteria(FilterCriteria::default().with_status(TaskStatus::Development));
  assert_eq!(ws.task_page(&view).total_matches, 1);
}

#[tokio::test]
async fn unknown_status_from_server_is_tolerated() {
  let server = MockServer::start().await;
  let id = Uuid::new_v4();

  Mock::given(method("GET"))
    .and(path("/stories/"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!([story_json(id, "Legacy", "ARCHIVED", None)])))
    .mount(&server)
    .await;

  let ws = workspace(&server);
  ws.refresh_stories().await.unwrap();
  let story = ws.cached_story(id).unwrap();
  assert_eq!(story.status, StoryStatus::Other("ARCHIVED".into()));

  let err = ws
    .transitions()
    .transition_story(id, StoryStatus::Development, &|_: &str| true)
    .await
    .unwrap_err();
  assert!(matches!(err, FlowError::Validation(_)));
}

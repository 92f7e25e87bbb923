use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::Backend;
use crate::config::Config;
use crate::error::{FlowError, Result};
use crate::model::story::DesignUpdate;
use crate::model::{
  AssignmentUpdate, DesignAnalysis, StatusUpdate, Story, StoryDraft, StoryUpdate, Task, TaskDraft,
  TaskUpdate, User,
};
use crate::workflow::registry::{StoryStatus, TaskStatus};

/// reqwest client for the platform API. The bearer token, if any, is
/// attached to every request.
pub struct HttpBackend {
  base_url: String,
  client: Client,
}

#[derive(Deserialize)]
struct LoginResponse {
  access_token: String,
}

impl HttpBackend {
  pub fn new(config: &Config, token: Option<&str>) -> Result<Self> {
    let mut headers = header::HeaderMap::new();
    if let Some(token) = token {
      let value = header::HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| FlowError::Config(format!("invalid token: {e}")))?;
      headers.insert(header::AUTHORIZATION, value);
    }

    let client = Client::builder()
      .default_headers(headers)
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| FlowError::Config(format!("failed to build http client: {e}")))?;

    Ok(Self {
      base_url: config.base_url().to_string(),
      client,
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{path}", self.base_url)
  }

  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    debug!("{} {}", status.as_u16(), response.url());

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(error_from_response(status, &body));
    }

    response.json().await.map_err(transport)
  }

  async fn send_empty(&self, request: RequestBuilder) -> Result<()> {
    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    debug!("{} {}", status.as_u16(), response.url());

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(error_from_response(status, &body));
    }
    Ok(())
  }

  /// Exchanges credentials for a bearer token.
  pub async fn login(&self, email: &str, password: &str) -> Result<String> {
    info!("logging in as {email}");
    let form = [("username", email), ("password", password)];
    let response: LoginResponse = self
      .send(self.client.post(self.url("/auth/login")).form(&form))
      .await?;
    Ok(response.access_token)
  }

  pub async fn logout(&self) -> Result<()> {
    self.send_empty(self.client.post(self.url("/auth/logout"))).await
  }

  pub async fn current_user(&self) -> Result<User> {
    self.send(self.client.get(self.url("/users/profile"))).await
  }
}

#[async_trait]
impl Backend for HttpBackend {
  async fn list_users(&self) -> Result<Vec<User>> {
    self.send(self.client.get(self.url("/users/"))).await
  }

  async fn get_user(&self, id: Uuid) -> Result<User> {
    self.send(self.client.get(self.url(&format!("/users/{id}")))).await
  }

  /// Always the whole collection; list filtering happens client-side.
  async fn list_stories(&self) -> Result<Vec<Story>> {
    self.send(self.client.get(self.url("/stories/"))).await
  }

  async fn get_story(&self, id: Uuid) -> Result<Story> {
    self.send(self.client.get(self.url(&format!("/stories/{id}")))).await
  }

  async fn create_story(&self, draft: &StoryDraft) -> Result<Story> {
    info!("creating story: {}", draft.title);
    self
      .send(self.client.post(self.url("/stories/")).json(draft))
      .await
  }

  async fn update_story(&self, id: Uuid, update: &StoryUpdate) -> Result<Story> {
    self
      .send(self.client.put(self.url(&format!("/stories/{id}"))).json(update))
      .await
  }

  async fn delete_story(&self, id: Uuid) -> Result<()> {
    info!("deleting story {id}");
    self
      .send_empty(self.client.delete(self.url(&format!("/stories/{id}"))))
      .await
  }

  async fn update_story_status(&self, id: Uuid, status: &StoryStatus) -> Result<Story> {
    let body = StatusUpdate {
      status: status.clone(),
    };
    self
      .send(
        self
          .client
          .put(self.url(&format!("/stories/{id}/status")))
          .json(&body),
      )
      .await
  }

  async fn assign_story(&self, id: Uuid, assignee: Uuid) -> Result<Story> {
    let body = AssignmentUpdate {
      assignee_id: Some(assignee),
    };
    self
      .send(
        self
          .client
          .put(self.url(&format!("/stories/{id}/assign")))
          .json(&body),
      )
      .await
  }

  async fn update_story_design(&self, id: Uuid, design_url: &str) -> Result<Story> {
    let body = DesignUpdate {
      design_url: design_url.to_string(),
    };
    self
      .send(
        self
          .client
          .put(self.url(&format!("/stories/{id}/design")))
          .json(&body),
      )
      .await
  }

  async fn analyze_design(&self, id: Uuid) -> Result<DesignAnalysis> {
    info!("requesting design analysis for story {id}");
    self
      .send(
        self
          .client
          .post(self.url(&format!("/stories/{id}/analyze-design"))),
      )
      .await
  }

  async fn list_tasks(&self, story_id: Uuid) -> Result<Vec<Task>> {
    self
      .send(self.client.get(self.url(&format!("/tasks/story/{story_id}"))))
      .await
  }

  async fn create_task(&self, draft: &TaskDraft) -> Result<Task> {
    info!("creating task for story {}: {}", draft.story_id, draft.title);
    self.send(self.client.post(self.url("/tasks/")).json(draft)).await
  }

  async fn update_task(&self, id: Uuid, update: &TaskUpdate) -> Result<Task> {
    self
      .send(self.client.put(self.url(&format!("/tasks/{id}"))).json(update))
      .await
  }

  async fn delete_task(&self, id: Uuid) -> Result<()> {
    info!("deleting task {id}");
    self
      .send_empty(self.client.delete(self.url(&format!("/tasks/{id}"))))
      .await
  }

  async fn update_task_status(&self, id: Uuid, status: &TaskStatus) -> Result<Task> {
    let body = StatusUpdate {
      status: status.clone(),
    };
    self
      .send(
        self
          .client
          .put(self.url(&format!("/tasks/{id}/status")))
          .json(&body),
      )
      .await
  }

  async fn assign_task(&self, id: Uuid, assignee: Option<Uuid>) -> Result<Task> {
    let body = AssignmentUpdate {
      assignee_id: assignee,
    };
    self
      .send(
        self
          .client
          .put(self.url(&format!("/tasks/{id}/assign")))
          .json(&body),
      )
      .await
  }

  async fn dashboard_summary(&self) -> Result<Value> {
    self
      .send(self.client.get(self.url("/api/dashboard/summary")))
      .await
  }
}

fn transport(e: reqwest::Error) -> FlowError {
  if e.is_timeout() {
    FlowError::Transport(format!("request timed out: {e}"))
  } else {
    FlowError::Transport(e.to_string())
  }
}

/// Maps a non-2xx response onto the client's error taxonomy.
pub fn error_from_response(status: StatusCode, body: &str) -> FlowError {
  let parsed: Option<Value> = serde_json::from_str(body).ok();

  if status == StatusCode::UNPROCESSABLE_ENTITY {
    if let Some(fields) = parsed.as_ref().and_then(field_errors) {
      return FlowError::FieldValidation(fields);
    }
  }

  let message = parsed
    .as_ref()
    .and_then(|v| {
      v.get("detail")
        .and_then(Value::as_str)
        .or_else(|| v.get("message").and_then(Value::as_str))
    })
    .map(str::to_string)
    .unwrap_or_else(|| default_message(status).to_string());

  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FlowError::Authorization {
      status: status.as_u16(),
      message,
    },
    StatusCode::NOT_FOUND => FlowError::NotFound(message),
    _ => FlowError::Transport(format!("{}: {message}", status.as_u16())),
  }
}

/// `{"detail": [{"loc": ["body", "title"], "msg": "field required"}]}`,
/// keyed by the last element of `loc`.
fn field_errors(body: &Value) -> Option<BTreeMap<String, String>> {
  let details = body.get("detail")?.as_array()?;
  let mut fields = BTreeMap::new();
  for detail in details {
    let field = detail
      .get("loc")
      .and_then(Value::as_array)
      .and_then(|loc| loc.last())
      .map(|last| match last {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      })
      .unwrap_or_else(|| "request".to_string());
    let msg = detail
      .get("msg")
      .and_then(Value::as_str)
      .unwrap_or("invalid value");
    fields.insert(field, msg.to_string());
  }
  if fields.is_empty() {
    None
  } else {
    Some(fields)
  }
}

fn default_message(status: StatusCode) -> &'static str {
  match status {
    StatusCode::UNAUTHORIZED => "Authentication failed. Please check your credentials.",
    StatusCode::FORBIDDEN => "You do not have permission to perform this action.",
    StatusCode::NOT_FOUND => "The requested resource was not found.",
    StatusCode::INTERNAL_SERVER_ERROR => "Server error. Please try again later.",
    _ => "An error occurred. Please try again.",
  }
}

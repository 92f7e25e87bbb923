use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
  #[error("config error: {0}")]
  Config(String),

  #[error("config file not found: {0}")]
  ConfigNotFound(PathBuf),

  /// Rejected locally, nothing was sent to the backend.
  #[error("validation error: {0}")]
  Validation(String),

  #[error("validation failed: {}", format_fields(.0))]
  FieldValidation(BTreeMap<String, String>),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("authorization error ({status}): {message}")]
  Authorization { status: u16, message: String },

  #[error("transport error: {0}")]
  Transport(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("yaml error: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl FlowError {
  pub fn field(name: &str, message: &str) -> Self {
    let mut fields = BTreeMap::new();
    fields.insert(name.to_string(), message.to_string());
    FlowError::FieldValidation(fields)
  }

  /// Configuration problems stop the process; everything else is local to
  /// the one action that raised it.
  pub fn is_recoverable(&self) -> bool {
    !matches!(self, FlowError::Config(_) | FlowError::ConfigNotFound(_))
  }
}

fn format_fields(fields: &BTreeMap<String, String>) -> String {
  fields
    .iter()
    .map(|(k, v)| format!("{k}: {v}"))
    .collect::<Vec<_>>()
    .join(", ")
}

pub type Result<T> = std::result::Result<T, FlowError>;

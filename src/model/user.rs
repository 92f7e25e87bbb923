use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Entity;

/// Read-only from this client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
  pub id: Uuid,
  #[serde(default)]
  pub name: Option<String>,
  pub email: String,
}

impl User {
  pub fn display_name(&self) -> &str {
    self.name.as_deref().unwrap_or(&self.email)
  }
}

impl Entity for User {
  fn id(&self) -> Uuid {
    self.id
  }
}

impl std::fmt::Display for User {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} <{}>", self.display_name(), self.email)
  }
}

use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AssigneeFilter {
  #[default]
  Any,
  Unassigned,
  User(Uuid),
}

impl std::str::FromStr for AssigneeFilter {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    let s = s.trim();
    if s.is_empty() {
      return Ok(AssigneeFilter::Any);
    }
    if s.eq_ignore_ascii_case("unassigned") {
      return Ok(AssigneeFilter::Unassigned);
    }
    Uuid::parse_str(s)
      .map(AssigneeFilter::User)
      .map_err(|_| format!("expected a user id or \"unassigned\": {s}"))
  }
}

/// What a list view is narrowed to. Empty fields match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria<S> {
  pub status: Option<S>,
  pub assignee: AssigneeFilter,
  pub search: String,
}

impl<S> Default for FilterCriteria<S> {
  fn default() -> Self {
    Self {
      status: None,
      assignee: AssigneeFilter::Any,
      search: String::new(),
    }
  }
}

impl<S> FilterCriteria<S> {
  pub fn is_empty(&self) -> bool {
    self.status.is_none() && self.assignee == AssigneeFilter::Any && self.search.is_empty()
  }

  pub fn with_status(mut self, status: S) -> Self {
    self.status = Some(status);
    self
  }

  pub fn with_assignee(mut self, assignee: AssigneeFilter) -> Self {
    self.assignee = assignee;
    self
  }

  pub fn with_search(mut self, search: impl Into<String>) -> Self {
    self.search = search.into();
    self
  }
}

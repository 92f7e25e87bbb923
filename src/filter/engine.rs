//! Pure filtering and paging over an in-memory collection. Nothing here
//! fails or reorders: output keeps the relative order of the input.

use uuid::Uuid;

use crate::filter::criteria::{AssigneeFilter, FilterCriteria};
use crate::model::{Story, Task};
use crate::workflow::registry::{StoryStatus, TaskStatus};

pub trait Filterable {
  type Status: PartialEq;

  fn status(&self) -> &Self::Status;
  fn assignee(&self) -> Option<Uuid>;
  fn title(&self) -> &str;
  fn description(&self) -> &str;
}

impl Filterable for Task {
  type Status = TaskStatus;

  fn status(&self) -> &TaskStatus {
    &self.status
  }
  fn assignee(&self) -> Option<Uuid> {
    self.assignee
  }
  fn title(&self) -> &str {
    &self.title
  }
  fn description(&self) -> &str {
    &self.description
  }
}

impl Filterable for Story {
  type Status = StoryStatus;

  fn status(&self) -> &StoryStatus {
    &self.status
  }
  fn assignee(&self) -> Option<Uuid> {
    self.assigned_to
  }
  fn title(&self) -> &str {
    &self.title
  }
  fn description(&self) -> &str {
    &self.description
  }
}

pub fn matches<T: Filterable>(item: &T, criteria: &FilterCriteria<T::Status>) -> bool {
  let status_ok = criteria
    .status
    .as_ref()
    .map_or(true, |wanted| item.status() == wanted);

  let assignee_ok = match &criteria.assignee {
    AssigneeFilter::Any => true,
    AssigneeFilter::Unassigned => item.assignee().is_none(),
    AssigneeFilter::User(id) => item.assignee() == Some(*id),
  };

  let search_ok = criteria.search.is_empty() || {
    let needle = criteria.search.to_lowercase();
    item.title().to_lowercase().contains(&needle)
      || item.description().to_lowercase().contains(&needle)
  };

  status_ok && assignee_ok && search_ok
}

pub fn apply<T: Filterable + Clone>(items: &[T], criteria: &FilterCriteria<T::Status>) -> Vec<T> {
  items
    .iter()
    .filter(|item| matches(*item, criteria))
    .cloned()
    .collect()
}

pub fn total_pages(len: usize, page_size: usize) -> usize {
  if page_size == 0 {
    return 0;
  }
  len.div_ceil(page_size)
}

/// Slice for 1-based `page`. Pages outside the range yield an empty slice;
/// keeping `page` in range is up to the caller.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
  let Some(start) = page.checked_sub(1).and_then(|p| p.checked_mul(page_size)) else {
    return &[];
  };
  if start >= items.len() {
    return &[];
  }
  let end = start.saturating_add(page_size).min(items.len());
  &items[start..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMark {
  Page(usize),
  Gap,
}

/// Page links to render around `current`: first and last page always,
/// `visible / 2` neighbours either side, gaps where pages are skipped.
pub fn page_window(current: usize, total: usize, visible: usize) -> Vec<PageMark> {
  if total <= 1 {
    return Vec::new();
  }
  let half = visible / 2;
  let start = current.saturating_sub(half).max(2);
  let end = current.saturating_add(half).min(total - 1);

  let mut marks = vec![PageMark::Page(1)];
  if start > 2 {
    marks.push(PageMark::Gap);
  }
  marks.extend((start..=end).map(PageMark::Page));
  if end < total - 1 {
    marks.push(PageMark::Gap);
  }
  marks.push(PageMark::Page(total));
  marks
}

use crate::error::{FlowError, Result};
use crate::filter::criteria::FilterCriteria;
use crate::filter::engine::{self, Filterable};

/// Criteria plus current page for one list. Changing the criteria sends the
/// view back to page 1 so a narrowed filter never lands on an empty page.
#[derive(Debug, Clone)]
pub struct ListView<S> {
  criteria: FilterCriteria<S>,
  page: usize,
  page_size: usize,
}

#[derive(Debug, Clone)]
pub struct PageView<T> {
  pub items: Vec<T>,
  pub page: usize,
  pub total_pages: usize,
  pub total_matches: usize,
}

impl<S: PartialEq> ListView<S> {
  pub fn new(page_size: usize) -> Self {
    Self {
      criteria: FilterCriteria::default(),
      page: 1,
      page_size,
    }
  }

  pub fn criteria(&self) -> &FilterCriteria<S> {
    &self.criteria
  }

  pub fn page(&self) -> usize {
    self.page
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  /// Returns whether the criteria actually changed.
  pub fn set_criteria(&mut self, criteria: FilterCriteria<S>) -> bool {
    if criteria == self.criteria {
      return false;
    }
    self.criteria = criteria;
    self.page = 1;
    true
  }

  pub fn set_page(&mut self, page: usize) {
    self.page = page;
  }

  pub fn render<T>(&self, items: &[T]) -> PageView<T>
  where
    T: Filterable<Status = S> + Clone,
  {
    let matched = engine::apply(items, &self.criteria);
    PageView {
      items: engine::paginate(&matched, self.page, self.page_size).to_vec(),
      page: self.page,
      total_pages: engine::total_pages(matched.len(), self.page_size),
      total_matches: matched.len(),
    }
  }
}

impl<T> PageView<T> {
  /// Paging never clamps, so callers check the requested page exists. With
  /// no matches only page 1 does.
  pub fn ensure_exists(&self) -> Result<()> {
    let last = self.total_pages.max(1);
    if (1..=last).contains(&self.page) {
      return Ok(());
    }
    Err(FlowError::Validation(format!(
      "page {} out of range 1..={last}",
      self.page
    )))
  }
}

pub mod criteria;
pub mod engine;
pub mod view;

pub use criteria::{AssigneeFilter, FilterCriteria};
pub use view::{ListView, PageView};

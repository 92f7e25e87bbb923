pub mod registry;
pub mod transition;

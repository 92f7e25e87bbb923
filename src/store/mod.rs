pub mod entity_store;
pub mod session;

pub mod backend;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod store;
pub mod workflow;
pub mod workspace;

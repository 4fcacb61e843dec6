//! Database queries

pub mod import_history;
pub mod lead;
pub mod user;

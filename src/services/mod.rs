//! Business logic services

pub mod lead_import;
pub mod upload_store;

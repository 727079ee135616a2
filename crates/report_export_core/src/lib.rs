//! Report export domain primitives.
//!
//! This crate owns configuration, retry, object-key and pipeline behavior for
//! the report export job. It intentionally excludes AWS SDK and Lambda runtime
//! concerns, which live in `report_export_lambda`.

pub mod collaborators;
pub mod config;
pub mod contract;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod storage_keys;

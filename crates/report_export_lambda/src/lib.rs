//! AWS-oriented adapters and the Lambda handler for the report export job.
//!
//! This crate owns runtime integration details (SSM secret lookup, the report
//! subprocess, S3 uploads, logging setup) and drives the pipeline defined in
//! `report_export_core`.

pub mod adapters;
pub mod handlers;
pub mod logging;

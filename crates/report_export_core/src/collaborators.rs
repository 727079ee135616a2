//! Narrow capability contracts the pipeline is built against.
//!
//! Production implementations live in `report_export_lambda::adapters`; tests
//! supply recording fakes.

use std::io::Read;

use crate::contract::{ExecutionFailure, ProcessInvocation, SecretToken};

pub trait SecretResolver {
    fn resolve(&self, name: &str, with_decryption: bool) -> Result<SecretToken, String>;
}

pub trait ProcessExecutor {
    /// Runs the invocation to completion and returns its combined output.
    fn run(&self, invocation: &ProcessInvocation) -> Result<Vec<u8>, ExecutionFailure>;
}

pub trait ArtifactUploader {
    /// Transfers `body` to `bucket/key` and returns a location descriptor.
    fn upload(&self, bucket: &str, key: &str, body: &mut dyn Read) -> Result<String, String>;
}

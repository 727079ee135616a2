//! The setup → generate → store pipeline run once per invocation.

use std::collections::BTreeMap;
use std::fs::File;
use std::time::Duration;

use tracing::{info, warn};

use crate::collaborators::{ArtifactUploader, ProcessExecutor, SecretResolver};
use crate::config::{ConfigSource, RunConfig};
use crate::contract::{
    InvocationContext, ProcessInvocation, RunSummary, SecretToken, UploadedObject,
};
use crate::error::{GenerateError, SetupError, StageError, StoreError};
use crate::retry::retry;
use crate::storage_keys::report_object_key;

pub const REPORT_SUBCOMMAND: &str = "report";

pub struct ReportPipeline<'a> {
    resolver: &'a dyn SecretResolver,
    executor: &'a dyn ProcessExecutor,
    uploader: &'a dyn ArtifactUploader,
    sleep: &'a dyn Fn(Duration),
}

impl<'a> ReportPipeline<'a> {
    pub fn new(
        resolver: &'a dyn SecretResolver,
        executor: &'a dyn ProcessExecutor,
        uploader: &'a dyn ArtifactUploader,
    ) -> Self {
        Self {
            resolver,
            executor,
            uploader,
            sleep: &std::thread::sleep,
        }
    }

    /// Replaces the function used to wait between generate attempts.
    pub fn with_sleep(mut self, sleep: &'a dyn Fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn run(
        &self,
        source: &impl ConfigSource,
        context: &InvocationContext,
    ) -> Result<RunSummary, StageError> {
        let (config, token) = self.setup(source)?;
        info!(
            component = "pipeline",
            event = "setup_completed",
            request_id = %context.request_id,
            bucket = %config.bucket,
            dry_run = config.dry_run,
            file_path = %config.file_path.display(),
            file_type = %config.file_type,
        );

        let attempts = self.generate(&config, token)?;

        if config.dry_run {
            info!(
                component = "pipeline",
                event = "store_skipped",
                request_id = %context.request_id,
                "dry run, nothing uploaded"
            );
            return Ok(RunSummary {
                dry_run: true,
                attempts,
                uploaded: None,
            });
        }

        let uploaded = self.store(&config, context)?;
        Ok(RunSummary {
            dry_run: false,
            attempts,
            uploaded: Some(uploaded),
        })
    }

    /// Loads and validates configuration, then resolves the secret.
    pub fn setup(
        &self,
        source: &impl ConfigSource,
    ) -> Result<(RunConfig, SecretToken), SetupError> {
        let config = RunConfig::load(source)?;
        let token = self
            .resolver
            .resolve(&config.secret_name, true)
            .map_err(|message| SetupError::SecretLookup {
                name: config.secret_name.clone(),
                message,
            })?;
        Ok((config, token))
    }

    /// Runs the report executable under the retry policy and returns the
    /// number of attempts it took. The token is dropped once this returns.
    pub fn generate(&self, config: &RunConfig, token: SecretToken) -> Result<u32, GenerateError> {
        let invocation = report_invocation(config, token);
        let mut sleep = |delay: Duration| (self.sleep)(delay);

        let outcome = retry(config.retry, &mut sleep, |attempt| {
            self.executor.run(&invocation).inspect_err(|failure| {
                warn!(
                    component = "pipeline",
                    event = "generate_attempt_failed",
                    attempt,
                    max_attempts = config.retry.max_attempts,
                    error = %failure.message,
                );
            })
        });

        match outcome {
            Ok(success) => {
                info!(
                    component = "pipeline",
                    event = "generate_completed",
                    attempts = success.attempts,
                    output = %String::from_utf8_lossy(&success.value),
                );
                Ok(success.attempts)
            }
            Err(exhausted) => Err(GenerateError {
                attempts: exhausted.attempts,
                output: exhausted.value.output_lossy(),
                message: exhausted.value.message,
            }),
        }
    }

    /// Uploads the generated file to the configured bucket.
    pub fn store(
        &self,
        config: &RunConfig,
        context: &InvocationContext,
    ) -> Result<UploadedObject, StoreError> {
        let mut file = File::open(&config.file_path).map_err(|source| StoreError::OpenFile {
            path: config.file_path.clone(),
            source,
        })?;

        let timestamp = config.timestamp_keys.then_some(context.invoked_at);
        let key = report_object_key(
            &config.key_prefix,
            &config.file_path,
            config.file_type,
            timestamp,
        )?;

        let location = self
            .uploader
            .upload(&config.bucket, &key, &mut file)
            .map_err(|message| StoreError::Upload {
                bucket: config.bucket.clone(),
                key: key.clone(),
                message,
            })?;

        info!(
            component = "pipeline",
            event = "file_uploaded",
            request_id = %context.request_id,
            bucket = %config.bucket,
            key = %key,
            location = %location,
        );

        Ok(UploadedObject {
            bucket: config.bucket.clone(),
            key,
            location,
        })
    }
}

pub fn report_args(config: &RunConfig) -> Vec<String> {
    vec![
        REPORT_SUBCOMMAND.to_string(),
        format!("--dry-run={}", config.dry_run),
        format!("--file-path={}", config.file_path.display()),
        format!("--file-type={}", config.file_type),
    ]
}

fn report_invocation(config: &RunConfig, token: SecretToken) -> ProcessInvocation {
    ProcessInvocation {
        program: config.executable.clone(),
        args: report_args(config),
        env: BTreeMap::from([(config.secret_env_var.clone(), token)]),
        timeout: config.exec_timeout,
    }
}

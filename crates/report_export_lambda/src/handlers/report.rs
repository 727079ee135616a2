use std::time::Instant;

use report_export_core::config::ConfigSource;
use report_export_core::contract::InvocationContext;
use report_export_core::error::Stage;
use report_export_core::pipeline::ReportPipeline;
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReportResponse {
    pub status: String,
    pub dry_run: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHandlerError {
    pub stage: Stage,
    pub message: String,
}

pub fn handle_report_invocation(
    source: &impl ConfigSource,
    context: &InvocationContext,
    pipeline: &ReportPipeline<'_>,
) -> Result<ReportResponse, ReportHandlerError> {
    let started_at = Instant::now();
    info!(
        component = "report_handler",
        event = "report_started",
        request_id = %context.request_id,
        invoked_at = %context.invoked_at.to_rfc3339(),
    );

    match pipeline.run(source, context) {
        Ok(summary) => {
            let (object_key, location) = match summary.uploaded {
                Some(uploaded) => (Some(uploaded.key), Some(uploaded.location)),
                None => (None, None),
            };
            info!(
                component = "report_handler",
                event = "report_completed",
                request_id = %context.request_id,
                dry_run = summary.dry_run,
                attempts = summary.attempts,
                object_key = object_key.as_deref(),
                location = location.as_deref(),
                duration_ms = started_at.elapsed().as_millis() as u64,
            );
            Ok(ReportResponse {
                status: "ok".to_string(),
                dry_run: summary.dry_run,
                attempts: summary.attempts,
                object_key,
                location,
            })
        }
        Err(stage_error) => {
            let message = stage_error.to_string();
            error!(
                component = "report_handler",
                event = "report_failed",
                request_id = %context.request_id,
                stage = %stage_error.stage(),
                error = %message,
                duration_ms = started_at.elapsed().as_millis() as u64,
            );
            Err(ReportHandlerError {
                stage: stage_error.stage(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::Utc;
    use report_export_core::collaborators::{ArtifactUploader, ProcessExecutor, SecretResolver};
    use report_export_core::config::{
        BUCKET_NAME_VAR, DRY_RUN_VAR, FILE_PATH_VAR, FILE_TYPE_VAR, KEY_PREFIX_VAR,
        TOKEN_PATH_VAR,
    };
    use report_export_core::contract::{ExecutionFailure, ProcessInvocation, SecretToken};
    use serde_json::json;

    use super::*;

    struct StaticResolver;

    impl SecretResolver for StaticResolver {
        fn resolve(&self, _name: &str, _with_decryption: bool) -> Result<SecretToken, String> {
            Ok(SecretToken::new("ghp_supersecret"))
        }
    }

    struct PassExecutor;

    impl ProcessExecutor for PassExecutor {
        fn run(&self, _invocation: &ProcessInvocation) -> Result<Vec<u8>, ExecutionFailure> {
            Ok(b"report written".to_vec())
        }
    }

    struct FailingExecutor;

    impl ProcessExecutor for FailingExecutor {
        fn run(&self, _invocation: &ProcessInvocation) -> Result<Vec<u8>, ExecutionFailure> {
            Err(ExecutionFailure::new("exit status: 1", b"rate limited".to_vec()))
        }
    }

    struct CapturingUploader {
        keys: Mutex<Vec<String>>,
    }

    impl CapturingUploader {
        fn new() -> Self {
            Self {
                keys: Mutex::new(Vec::new()),
            }
        }

        fn keys(&self) -> Vec<String> {
            self.keys.lock().expect("poisoned mutex").clone()
        }
    }

    impl ArtifactUploader for CapturingUploader {
        fn upload(&self, bucket: &str, key: &str, body: &mut dyn Read) -> Result<String, String> {
            let mut sink = Vec::new();
            body.read_to_end(&mut sink).map_err(|error| error.to_string())?;
            self.keys
                .lock()
                .expect("poisoned mutex")
                .push(key.to_string());
            Ok(format!("s3://{bucket}/{key}"))
        }
    }

    fn no_sleep(_: Duration) {}

    fn sample_context() -> InvocationContext {
        InvocationContext {
            request_id: "req-123".to_string(),
            invoked_at: Utc::now(),
        }
    }

    fn sample_env(file_path: &str, dry_run: bool) -> HashMap<String, String> {
        HashMap::from([
            (DRY_RUN_VAR.to_string(), dry_run.to_string()),
            (BUCKET_NAME_VAR.to_string(), "reports-bucket".to_string()),
            (FILE_PATH_VAR.to_string(), file_path.to_string()),
            (FILE_TYPE_VAR.to_string(), "csv".to_string()),
            (TOKEN_PATH_VAR.to_string(), "/github/token".to_string()),
            (KEY_PREFIX_VAR.to_string(), "github".to_string()),
        ])
    }

    #[test]
    fn responds_with_uploaded_object() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("report.csv");
        std::fs::File::create(&path)
            .and_then(|mut file| file.write_all(b"repo\nexample\n"))
            .expect("report file should be written");
        let uploader = CapturingUploader::new();
        let (resolver, executor) = (StaticResolver, PassExecutor);
        let pipeline = ReportPipeline::new(&resolver, &executor, &uploader).with_sleep(&no_sleep);

        let response = handle_report_invocation(
            &sample_env(&path.display().to_string(), false),
            &sample_context(),
            &pipeline,
        )
        .expect("invocation should succeed");

        assert_eq!(uploader.keys(), vec!["github/report.csv".to_string()]);
        assert_eq!(
            serde_json::to_value(&response).expect("response should serialize"),
            json!({
                "status": "ok",
                "dry_run": false,
                "attempts": 1,
                "object_key": "github/report.csv",
                "location": "s3://reports-bucket/github/report.csv",
            })
        );
    }

    #[test]
    fn dry_run_response_has_no_object() {
        let uploader = CapturingUploader::new();
        let (resolver, executor) = (StaticResolver, PassExecutor);
        let pipeline = ReportPipeline::new(&resolver, &executor, &uploader).with_sleep(&no_sleep);

        let response = handle_report_invocation(
            &sample_env("/tmp/report.csv", true),
            &sample_context(),
            &pipeline,
        )
        .expect("dry run should succeed");

        assert!(response.dry_run);
        assert_eq!(response.object_key, None);
        assert!(uploader.keys().is_empty());
    }

    #[test]
    fn failures_carry_stage_and_message() {
        let uploader = CapturingUploader::new();
        let (resolver, executor) = (StaticResolver, FailingExecutor);
        let pipeline = ReportPipeline::new(&resolver, &executor, &uploader).with_sleep(&no_sleep);

        let error = handle_report_invocation(
            &sample_env("/tmp/report.csv", false),
            &sample_context(),
            &pipeline,
        )
        .expect_err("generate should fail");

        assert_eq!(error.stage, Stage::Generate);
        assert!(error.message.starts_with("generate error: failed to run after 4 attempt(s)"));
        assert!(error.message.contains("rate limited"));
        assert!(!error.message.contains("ghp_supersecret"));
        assert!(uploader.keys().is_empty());
    }
}

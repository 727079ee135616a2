use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use report_export_core::config::ProcessEnv;
use report_export_core::contract::InvocationContext;
use report_export_core::pipeline::ReportPipeline;
use report_export_lambda::adapters::object_store::S3ArtifactUploader;
use report_export_lambda::adapters::process::CommandExecutor;
use report_export_lambda::adapters::secret_store::SsmSecretResolver;
use report_export_lambda::handlers::report::{handle_report_invocation, ReportResponse};
use report_export_lambda::logging::init_logging;
use serde_json::Value;

async fn handle_request(event: LambdaEvent<Value>) -> Result<ReportResponse, Error> {
    let context = InvocationContext {
        request_id: event.context.request_id.clone(),
        invoked_at: Utc::now(),
    };

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let resolver = SsmSecretResolver::new(aws_sdk_ssm::Client::new(&aws_config));
    let uploader = S3ArtifactUploader::new(aws_sdk_s3::Client::new(&aws_config));
    let executor = CommandExecutor;
    let pipeline = ReportPipeline::new(&resolver, &executor, &uploader);

    handle_report_invocation(&ProcessEnv, &context, &pipeline)
        .map_err(|error| Error::from(error.message))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging()?;
    lambda_runtime::run(service_fn(handle_request)).await
}

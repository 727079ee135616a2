use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::operation::get_parameter::GetParameterOutput;
use report_export_core::collaborators::SecretResolver;
use report_export_core::contract::SecretToken;

/// Reads secrets from SSM Parameter Store.
#[derive(Debug, Clone)]
pub struct SsmSecretResolver {
    ssm_client: aws_sdk_ssm::Client,
}

impl SsmSecretResolver {
    pub fn new(ssm_client: aws_sdk_ssm::Client) -> Self {
        Self { ssm_client }
    }
}

impl SecretResolver for SsmSecretResolver {
    fn resolve(&self, name: &str, with_decryption: bool) -> Result<SecretToken, String> {
        let parameter_name = name.to_string();
        let client = self.ssm_client.clone();

        let output = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .get_parameter()
                    .name(parameter_name)
                    .with_decryption(with_decryption)
                    .send()
                    .await
                    .map_err(|error| {
                        format!(
                            "failed to read ssm parameter: {}",
                            DisplayErrorContext(&error)
                        )
                    })
            })
        })?;

        secret_from_output(name, &output)
    }
}

fn secret_from_output(name: &str, output: &GetParameterOutput) -> Result<SecretToken, String> {
    output
        .parameter()
        .and_then(|parameter| parameter.value())
        .map(SecretToken::new)
        .ok_or_else(|| format!("ssm parameter {name:?} has no value"))
}

#[cfg(test)]
mod tests {
    use aws_sdk_ssm::types::Parameter;

    use super::*;

    #[test]
    fn extracts_parameter_value() {
        let output = GetParameterOutput::builder()
            .parameter(
                Parameter::builder()
                    .name("/github/token")
                    .value("ghp_supersecret")
                    .build(),
            )
            .build();

        let token = secret_from_output("/github/token", &output).expect("value should resolve");
        assert_eq!(token.expose(), "ghp_supersecret");
    }

    #[test]
    fn rejects_parameter_without_value() {
        let output = GetParameterOutput::builder()
            .parameter(Parameter::builder().name("/github/token").build())
            .build();

        let error = secret_from_output("/github/token", &output).expect_err("missing value");
        assert!(error.contains("has no value"));
    }

    #[test]
    fn rejects_missing_parameter() {
        let output = GetParameterOutput::builder().build();
        assert!(secret_from_output("/github/token", &output).is_err());
    }
}

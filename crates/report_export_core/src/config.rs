//! Run configuration, read once per invocation from named environment values.
//!
//! Every required value is validated here so that a bad deployment fails in
//! the setup stage before any secret lookup, subprocess or upload happens.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::SetupError;
use crate::retry::{Backoff, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::storage_keys::report_object_name;

pub const DRY_RUN_VAR: &str = "GHTOOL_DRY_RUN";
pub const BUCKET_NAME_VAR: &str = "BUCKET_NAME";
pub const FILE_PATH_VAR: &str = "GHTOOL_FILE_PATH";
pub const FILE_TYPE_VAR: &str = "GHTOOL_FILE_TYPE";
pub const TOKEN_PATH_VAR: &str = "TOKEN_PATH";
pub const EXECUTABLE_VAR: &str = "GHTOOL_EXECUTABLE";
pub const TOKEN_ENV_VAR: &str = "GHTOOL_TOKEN_ENV";
pub const MAX_ATTEMPTS_VAR: &str = "REPORT_MAX_ATTEMPTS";
pub const RETRY_BACKOFF_VAR: &str = "REPORT_RETRY_BACKOFF";
pub const KEY_PREFIX_VAR: &str = "REPORT_KEY_PREFIX";
pub const TIMESTAMP_KEYS_VAR: &str = "REPORT_TIMESTAMP_KEYS";
pub const EXEC_TIMEOUT_VAR: &str = "REPORT_EXEC_TIMEOUT_SECS";

pub const DEFAULT_EXECUTABLE: &str = "/github-admin-tool";
pub const DEFAULT_TOKEN_ENV: &str = "GHTOOL_TOKEN";

/// Lookup of named configuration values.
pub trait ConfigSource {
    fn get(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Json,
}

impl FileType {
    /// Exact match only; padded or upper-case values are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub bucket: String,
    pub dry_run: bool,
    pub file_path: PathBuf,
    pub file_type: FileType,
    pub secret_name: String,
    pub secret_env_var: String,
    pub executable: PathBuf,
    pub retry: RetryPolicy,
    pub key_prefix: String,
    pub timestamp_keys: bool,
    pub exec_timeout: Option<Duration>,
}

impl RunConfig {
    pub fn load(source: &impl ConfigSource) -> Result<Self, SetupError> {
        let dry_run = resolve_dry_run(source.get(DRY_RUN_VAR).as_deref());

        let bucket = required(source, BUCKET_NAME_VAR).ok_or(SetupError::MissingBucket)?;
        let file_path = required(source, FILE_PATH_VAR)
            .map(PathBuf::from)
            .ok_or(SetupError::MissingFilePath)?;

        let raw_file_type = source.get(FILE_TYPE_VAR).unwrap_or_default();
        let file_type = FileType::parse(&raw_file_type)
            .ok_or_else(|| SetupError::InvalidFileType(raw_file_type.clone()))?;
        report_object_name(&file_path, file_type, None)
            .map_err(|_| SetupError::UnnamedFilePath(file_path.clone()))?;

        let secret_name = required(source, TOKEN_PATH_VAR).ok_or(SetupError::MissingSecretName)?;

        let executable =
            required(source, EXECUTABLE_VAR).unwrap_or_else(|| DEFAULT_EXECUTABLE.to_string());
        let secret_env_var =
            required(source, TOKEN_ENV_VAR).unwrap_or_else(|| DEFAULT_TOKEN_ENV.to_string());

        let max_attempts = match required(source, MAX_ATTEMPTS_VAR) {
            None => DEFAULT_MAX_ATTEMPTS,
            Some(raw) => match raw.parse::<u32>() {
                Ok(value) if value >= 1 => value,
                Ok(_) => return Err(invalid(MAX_ATTEMPTS_VAR, raw, "must be at least 1")),
                Err(error) => return Err(invalid(MAX_ATTEMPTS_VAR, raw, error.to_string())),
            },
        };

        let backoff = match required(source, RETRY_BACKOFF_VAR) {
            None => Backoff::None,
            Some(raw) => {
                Backoff::parse(&raw).map_err(|reason| invalid(RETRY_BACKOFF_VAR, raw, reason))?
            }
        };

        let timestamp_keys = match required(source, TIMESTAMP_KEYS_VAR) {
            None => false,
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| invalid(TIMESTAMP_KEYS_VAR, raw, "expected a boolean"))?,
        };

        let exec_timeout = match required(source, EXEC_TIMEOUT_VAR) {
            None => None,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                Ok(_) => return Err(invalid(EXEC_TIMEOUT_VAR, raw, "must be positive")),
                Err(error) => return Err(invalid(EXEC_TIMEOUT_VAR, raw, error.to_string())),
            },
        };

        Ok(Self {
            bucket,
            dry_run,
            file_path,
            file_type,
            secret_name,
            secret_env_var,
            executable: PathBuf::from(executable),
            retry: RetryPolicy {
                max_attempts,
                backoff,
            },
            key_prefix: source.get(KEY_PREFIX_VAR).unwrap_or_default(),
            timestamp_keys,
            exec_timeout,
        })
    }
}

/// Accepts the same spellings as Go's `strconv.ParseBool`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Unset or unparsable values fall back to a dry run.
fn resolve_dry_run(raw: Option<&str>) -> bool {
    match raw {
        None => true,
        Some(value) => parse_bool(value).unwrap_or_else(|| {
            tracing::warn!(
                component = "config",
                event = "dry_run_fallback",
                value,
                "unparsable {DRY_RUN_VAR}, defaulting to dry run"
            );
            true
        }),
    }
}

/// Present and non-empty. Values are taken verbatim.
fn required(source: &impl ConfigSource, name: &str) -> Option<String> {
    source.get(name).filter(|value| !value.is_empty())
}

fn invalid(name: &'static str, value: String, reason: impl Into<String>) -> SetupError {
    SetupError::InvalidSetting {
        name,
        value,
        reason: reason.into(),
    }
}

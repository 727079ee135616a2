use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline phase a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Generate,
    Store,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Generate => "generate",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("generate error: {0}")]
    Generate(#[from] GenerateError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Setup(_) => Stage::Setup,
            Self::Generate(_) => Stage::Generate,
            Self::Store(_) => Stage::Store,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("bucket name not set")]
    MissingBucket,

    #[error("file path not set")]
    MissingFilePath,

    #[error("file path {0:?} has no file name to name the object after")]
    UnnamedFilePath(PathBuf),

    #[error("file type not set to csv or json (got {0:?})")]
    InvalidFileType(String),

    #[error("secret parameter name not set")]
    MissingSecretName,

    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidSetting {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("get secret parameter {name:?} failed: {message}")]
    SecretLookup { name: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to run after {attempts} attempt(s), got: {message}, output: {output}")]
pub struct GenerateError {
    pub attempts: u32,
    pub message: String,
    pub output: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open file {path:?}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot derive an object name from {0:?}")]
    UnnamedFile(PathBuf),

    #[error("failed to upload file to bucket {bucket:?} as {key:?}: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },
}

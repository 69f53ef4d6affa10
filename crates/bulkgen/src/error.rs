use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::generator::GenerationError;
use crate::job::StoreError;
use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum BulkgenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Spreadsheet error: {0}")]
    Parse(#[from] ParseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Pipeline fault in job {job_id}: {reason}")]
    PipelineFault { job_id: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Unsupported config file extension: '{0}'")]
    UnsupportedExtension(PathBuf),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Spreadsheet-level parse failure. Aborts a submission before any job exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unsupported spreadsheet format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed spreadsheet at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("Spreadsheet contains no article rows")]
    EmptyFile,
}

impl ParseError {
    /// Stable machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            ParseError::UnsupportedFormat(_) => "unsupported-format",
            ParseError::MalformedRow { .. } => "malformed-row",
            ParseError::EmptyFile => "empty-file",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Image pool holds {count} images, exceeding the limit of {max}")]
    TooManyImages { count: usize, max: usize },

    #[error("Duplicate image id '{0}' in pool")]
    DuplicateImage(String),

    #[error("Spreadsheet is {size} bytes, exceeding the limit of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },
}

pub type Result<T> = std::result::Result<T, BulkgenError>;

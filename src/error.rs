//! Error types for confluent-ops

use thiserror::Error;

/// Result type for confluent-ops operations
pub type Result<T> = std::result::Result<T, OpsError>;

/// Schema Registry error code for an unknown subject
pub const SUBJECT_NOT_FOUND: i64 = 40401;

/// Schema Registry error code for an unknown version
pub const VERSION_NOT_FOUND: i64 = 40402;

/// Errors raised by the registry client, the workflow and the CLI wrappers
#[derive(Error, Debug)]
pub enum OpsError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid compatibility level: {0}")]
    InvalidCompatibility(String),

    #[error("Invalid subject filter: {0}")]
    InvalidFilter(#[from] regex::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Command `{command}` failed (exit code {status:?}): {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OpsError {
    /// Shorthand for a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        OpsError::Validation(message.into())
    }

    /// Whether the registry reported that the subject or version does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OpsError::Api { code, .. } if *code == SUBJECT_NOT_FOUND || *code == VERSION_NOT_FOUND
        )
    }
}

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading or aggregating a dataset
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Missing required column: {column}")]
    SchemaMismatch { column: String },

    #[error("Dataset contains no readings")]
    EmptyDataset,

    #[error("Invalid row at line {line}: {reason}")]
    InvalidRow { line: u64, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur when talking to a narrative backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NarrativeError {
    #[error("Narrative service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Narrative service did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Question must not be empty")]
    EmptyQuestion,

    #[error("Failed to build prompt: {0}")]
    PromptBuild(String),
}

impl NarrativeError {
    /// Whether the failure means the service could not be reached or answered in time
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for NarrativeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            NarrativeError::InvalidResponse(e.to_string())
        } else {
            NarrativeError::ServiceUnavailable(e.to_string())
        }
    }
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

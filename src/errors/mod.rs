// Error handling module
// Contains custom error types and error handling utilities

use std::path::PathBuf;
use thiserror::Error;

// Application error type
#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    #[error("Model path does not exist: {}", .0.display())]
    ModelPathMissing(PathBuf),

    #[error("Environment setup failed: {0}")]
    SetupError(String),

    #[error("Smoke test failed: {0}")]
    SmokeError(String),

    #[error("Web UI launch failed: {0}")]
    WebUiError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Unknown error: {0}")]
    Other(String),

    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}

impl From<reqwest::Error> for LauncherError {
    fn from(err: reqwest::Error) -> Self {
        LauncherError::WebUiError(err.to_string())
    }
}

impl From<String> for LauncherError {
    fn from(err: String) -> Self {
        LauncherError::Other(err)
    }
}

impl From<&str> for LauncherError {
    fn from(err: &str) -> Self {
        LauncherError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for LauncherError {
    fn from(err: serde_json::Error) -> Self {
        LauncherError::SerializationError(err.to_string())
    }
}

// Result type alias for application
pub type LauncherResult<T> = Result<T, LauncherError>;

//! Error types for netbox-deploy

use http::StatusCode;
use thiserror::Error;

/// Main error type for netbox-deploy
#[derive(Error, Debug)]
pub enum DeployerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Non-success status while downloading a source archive
    #[error("Fetch error: {url} returned {status}")]
    FetchError { url: String, status: StatusCode },

    /// Non-2xx response from the platform API
    #[error("HTTP error: failed with status {status}")]
    HttpError { status: StatusCode, body: String },

    #[error("Manifest parse error: {0}")]
    ManifestParseError(String),

    #[error("Archive format error: {0}")]
    ArchiveFormatError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployerError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            DeployerError::RequestError(e) => !e.is_decode() && !e.is_builder(),
            DeployerError::FetchError { status, .. } | DeployerError::HttpError { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

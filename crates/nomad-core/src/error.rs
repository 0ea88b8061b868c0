use std::fmt;

use thiserror::Error;

/// Application-wide error types for Nomad.
#[derive(Error, Debug)]
pub enum AppError {
    /// The source or company no longer exists (HTTP 404/410).
    #[error("source not found: {0}")]
    NotFound(String),

    /// The source refused the request (HTTP 401/403/429).
    #[error("HTTP {status_code} from {url}")]
    RateLimited { status_code: u16, url: String },

    /// Request timed out.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Response did not match the shape the adapter expects.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A target lacks metadata its protocol requires.
    #[error("missing target metadata: {0}")]
    MissingMetadata(String),

    /// Any other non-success HTTP status.
    #[error("HTTP {status_code} from {url}")]
    HttpError { status_code: u16, url: String },

    /// Network/connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Platform-wide configuration is absent or invalid. Aborts a run.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

/// Classification of a per-target failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    RateLimited,
    Timeout,
    MalformedResponse,
    Configuration,
    /// Transport failure or an unclassified HTTP status.
    Upstream,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::Timeout => "timeout",
            ErrorKind::MalformedResponse => "malformed response",
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Upstream => "upstream error",
            ErrorKind::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::RateLimited { .. } => ErrorKind::RateLimited,
            AppError::Timeout(_) => ErrorKind::Timeout,
            AppError::MalformedResponse(_) | AppError::SerializationError(_) => {
                ErrorKind::MalformedResponse
            }
            AppError::MissingMetadata(_) | AppError::ConfigError(_) => ErrorKind::Configuration,
            AppError::HttpError { .. } | AppError::NetworkError(_) => ErrorKind::Upstream,
            AppError::Generic(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if this error is likely to clear up on a later run.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimited | ErrorKind::Timeout | ErrorKind::Upstream
        )
    }

    /// The message recorded against a target: `"<kind>: <detail>"`.
    pub fn classified_message(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

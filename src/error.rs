//! Error types for queries, mutations, storage and configuration.

use thiserror::Error;

/// Error produced by a query fetch or a mutation.
///
/// Errors are cloneable because one fetch result is shared by every observer
/// that attached to the same in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Fetch failed: {0}")]
    FetchError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Cached value for {key} has a different type")]
    TypeMismatch { key: String },

    #[error("Fetch task aborted: {0}")]
    Aborted(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl QueryError {
    /// Returns `true` if retrying the same request may succeed.
    ///
    /// Network failures, server errors, rate limiting and aborted tasks are
    /// transient. Authentication, decoding and not-found errors are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError(_) | Self::FetchError(_) | Self::Aborted(_) => true,
            Self::Backend { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            Self::Unauthenticated
            | Self::NotFound(_)
            | Self::Decode(_)
            | Self::TypeMismatch { .. }
            | Self::Storage(_) => false,
        }
    }

    /// Returns `true` if the error means the session is missing or expired.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Maps an HTTP status and body into the matching error variant.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::Unauthenticated,
            404 => Self::NotFound(message.into()),
            _ => Self::Backend {
                status,
                message: message.into(),
            },
        }
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), err.to_string())
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Error type for persisted key-value storage.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No data directory available on this platform")]
    NoDataDir,
}

/// Error type for loading [`AppConfig`](crate::config::AppConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

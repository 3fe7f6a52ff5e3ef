//! Error types for LeadForge
//!
//! Two families of failure live here:
//! - `AppError`: structural problems (bad input, bad configuration) that
//!   propagate to the caller as `Err`
//! - `SourceUnavailable`: a data source could not serve a request; the
//!   retry layer and the cascade turn these into typed outcomes and never
//!   let them escape as `Err`

use crate::records::SourceTag;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    EmptyKeyword,
    InvalidLimit,

    // Configuration errors (2xxx)
    ConfigurationError,
    UnknownSource,

    // Upstream errors (8xxx)
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::EmptyKeyword => 1001,
            ErrorCode::InvalidLimit => 1002,

            // Configuration (2xxx)
            ErrorCode::ConfigurationError => 2001,
            ErrorCode::UnknownSource => 2002,

            // Upstream (8xxx)
            ErrorCode::UpstreamError => 8001,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::SerializationError => 9002,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Search keyword is empty")]
    EmptyKeyword,

    #[error("Invalid limit {limit}: must be between 1 and {max}")]
    InvalidLimit { limit: usize, max: usize },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Unknown source: {name}")]
    UnknownSource { name: String },

    // Upstream errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::EmptyKeyword => ErrorCode::EmptyKeyword,
            AppError::InvalidLimit { .. } => ErrorCode::InvalidLimit,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::ConfigLoad(_) => ErrorCode::ConfigurationError,
            AppError::UnknownSource { .. } => ErrorCode::UnknownSource,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Input problems the caller can fix by changing the request
    pub fn is_input_error(&self) -> bool {
        matches!(self, AppError::EmptyKeyword | AppError::InvalidLimit { .. })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

/// Why a source could not serve a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Request timed out
    Timeout,
    /// Provider throttled us (HTTP 429 or local budget exhausted)
    RateLimited,
    /// Provider returned 5xx or dropped the connection
    ServerError,
    /// Provider refused us (403, captcha wall, missing credentials)
    Blocked,
    /// Response could not be decoded
    MalformedResponse,
}

impl FailureKind {
    /// Transient failures are worth retrying with backoff
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            FailureKind::Timeout | FailureKind::RateLimited | FailureKind::ServerError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::ServerError => "server_error",
            FailureKind::Blocked => "blocked",
            FailureKind::MalformedResponse => "malformed_response",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source failed to serve one fetch
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("source {source_tag} unavailable ({kind}): {message}")]
pub struct SourceUnavailable {
    pub source_tag: SourceTag,
    pub kind: FailureKind,
    pub message: String,
}

impl SourceUnavailable {
    pub fn new(source_tag: SourceTag, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            source_tag,
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(source_tag: SourceTag, message: impl Into<String>) -> Self {
        Self::new(source_tag, FailureKind::RateLimited, message)
    }

    pub fn blocked(source_tag: SourceTag, message: impl Into<String>) -> Self {
        Self::new(source_tag, FailureKind::Blocked, message)
    }

    pub fn malformed(source_tag: SourceTag, message: impl Into<String>) -> Self {
        Self::new(source_tag, FailureKind::MalformedResponse, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::EmptyKeyword;
        assert_eq!(err.code(), ErrorCode::EmptyKeyword);
        assert_eq!(err.code().as_code(), 1001);
        assert!(err.is_input_error());
    }

    #[test]
    fn test_configuration_error_is_not_input() {
        let err = AppError::UnknownSource { name: "bing".into() };
        assert_eq!(err.code(), ErrorCode::UnknownSource);
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_failure_kind_transience() {
        assert!(FailureKind::Timeout.is_transient());
        assert!(FailureKind::RateLimited.is_transient());
        assert!(FailureKind::ServerError.is_transient());
        assert!(!FailureKind::Blocked.is_transient());
        assert!(!FailureKind::MalformedResponse.is_transient());
    }

    #[test]
    fn test_source_unavailable_display() {
        let err = SourceUnavailable::rate_limited(SourceTag::new("directory"), "HTTP 429");
        assert_eq!(
            err.to_string(),
            "source directory unavailable (rate_limited): HTTP 429"
        );
        assert!(err.is_transient());
    }
}

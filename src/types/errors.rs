//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context. The taxonomy mirrors the engine's
//! request-fatal failure modes: fetch, export selection, shape, executability,
//! admission. Execution timeouts are not request-fatal — the executor captures
//! them as failures rather than raising them.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the toolhost engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Validation errors (map to HTTP 400).
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found (map to HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Remote module artifact could not be fetched (map to HTTP 502).
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// Requested export is absent from the module's export map (map to HTTP 404).
    /// Carries the available export names for diagnostics.
    #[error("export '{export}' not found (available: {})", available.join(", "))]
    ExportNotFound {
        export: String,
        available: Vec<String>,
    },

    /// Resolved export lacks the minimal tool shape — a description and an
    /// execute capability (map to HTTP 422).
    #[error("invalid tool shape: {0}")]
    InvalidToolShape(String),

    /// Export could not be normalized into an execute-capable handle
    /// (map to HTTP 422).
    #[error("not executable: {0}")]
    NotExecutable(String),

    /// Caller exceeded the admission rate limit (map to HTTP 429).
    #[error("rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// Internal errors (map to HTTP 500).
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convert to an HTTP status code for the transport layer.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::FetchFailed(_) => StatusCode::BAD_GATEWAY,
            Error::ExportNotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidToolShape(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotExecutable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION",
            Error::NotFound(_) => "NOT_FOUND",
            Error::FetchFailed(_) => "FETCH_FAILED",
            Error::ExportNotFound { .. } => "EXPORT_NOT_FOUND",
            Error::InvalidToolShape(_) => "INVALID_TOOL_SHAPE",
            Error::NotExecutable(_) => "NOT_EXECUTABLE",
            Error::RateLimited { .. } => "RATE_LIMITED",
            Error::Internal(_) => "INTERNAL",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Io(_) => "IO",
        }
    }
}

// Convenience constructors
impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn fetch_failed(msg: impl Into<String>) -> Self {
        Self::FetchFailed(msg.into())
    }

    pub fn invalid_tool_shape(msg: impl Into<String>) -> Self {
        Self::InvalidToolShape(msg.into())
    }

    pub fn not_executable(msg: impl Into<String>) -> Self {
        Self::NotExecutable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

//! Error types for the policylens API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for policylens operations
pub type Result<T> = std::result::Result<T, Error>;

/// API errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or invalid session
    #[error("Authentication required")]
    Unauthorized,

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Request validation error
    #[error("{0}")]
    Validation(String),

    /// Uploaded file exceeds the size limit
    #[error("File size must be less than {limit} bytes (got {size})")]
    FileTooLarge { size: usize, limit: usize },

    /// Uploaded file has an unsupported content type
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    /// Analysis pipeline failure (PDF extraction, LLM, etc.)
    #[error("Processing failed: {0}")]
    Processing(String),

    /// Fixed-window request cap exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Object storage error
    #[error("Object storage error: {0}")]
    ObjectStore(String),

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Payment provider error
    #[error("Payment provider error: {0}")]
    Payment(String),

    /// Email provider error
    #[error("Email provider error: {0}")]
    Email(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create a processing error
    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable error code returned to the frontend
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthorized => "UNAUTHORIZED",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Validation(_) | Error::Config(_) => "VALIDATION_ERROR",
            Error::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Error::InvalidFileType(_) => "INVALID_FILE_TYPE",
            Error::Processing(_) | Error::Llm(_) | Error::ObjectStore(_) => "PROCESSING_ERROR",
            Error::RateLimited => "RATE_LIMIT_EXCEEDED",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_)
            | Error::Config(_)
            | Error::FileTooLarge { .. }
            | Error::InvalidFileType(_) => StatusCode::BAD_REQUEST,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Unauthorized.code(), "UNAUTHORIZED");
        assert_eq!(Error::not_found("Policy").code(), "NOT_FOUND");
        assert_eq!(Error::validation("bad date").code(), "VALIDATION_ERROR");
        assert_eq!(
            Error::FileTooLarge { size: 11, limit: 10 }.code(),
            "FILE_TOO_LARGE"
        );
        assert_eq!(Error::RateLimited.code(), "RATE_LIMIT_EXCEEDED");
        assert_eq!(Error::Llm("boom".into()).code(), "PROCESSING_ERROR");
        assert_eq!(Error::internal("oops").code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("Policy");
        assert_eq!(err.to_string(), "Policy not found");
    }
}

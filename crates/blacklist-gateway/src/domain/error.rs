//! Gateway error types.
//!
//! `ApiError` is what a caller sees: an HTTP status plus a `{"error": ...}`
//! body. It carries the status as a plain number so the domain layer stays
//! free of HTTP framework types; the axum conversion lives in `adapters`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP status codes used by the gateway
pub mod codes {
    pub const BAD_REQUEST: u16 = 400;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
}

/// Payload returned to blocked callers, identical for every endpoint.
pub const ACCESS_DENIED_MESSAGE: &str = "Access denied: IP blocked";

/// Caller-visible error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Message placed in the `error` field
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Body could not be parsed as JSON
    pub fn parse_error(details: impl fmt::Display) -> Self {
        Self::new(codes::BAD_REQUEST, format!("Invalid JSON: {}", details))
    }

    /// Request carried no body where one is required
    pub fn empty_body() -> Self {
        Self::new(codes::BAD_REQUEST, "No data received")
    }

    /// A field is absent, empty or has the wrong type
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            codes::BAD_REQUEST,
            format!("Missing or empty field: {}", field),
        )
    }

    /// A field is present but its value is unacceptable
    pub fn invalid_field(field: &str, details: impl fmt::Display) -> Self {
        Self::new(
            codes::BAD_REQUEST,
            format!("Invalid field '{}': {}", field, details),
        )
    }

    /// Path index segment is not an integer
    pub fn invalid_index() -> Self {
        Self::new(codes::BAD_REQUEST, "Index must be an integer")
    }

    /// Caller IP is on the blacklist
    pub fn access_denied() -> Self {
        Self::new(codes::FORBIDDEN, ACCESS_DENIED_MESSAGE)
    }

    /// No route for this verb and path
    pub fn endpoint_not_found() -> Self {
        Self::new(codes::NOT_FOUND, "Endpoint not found")
    }

    /// delete targeted an index the ledger does not hold
    pub fn record_not_found(index: impl fmt::Display) -> Self {
        Self::new(
            codes::NOT_FOUND,
            format!("No attack found at index {}", index),
        )
    }

    /// Ledger call failed for a reason the caller cannot act on.
    /// The detail is logged, never returned.
    pub fn ledger_failure() -> Self {
        Self::new(codes::BAD_REQUEST, "Ledger operation failed")
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Wire shape of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<&ApiError> for ErrorBody {
    fn from(err: &ApiError) -> Self {
        Self {
            error: err.message.clone(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::parse_error(e)
    }
}

/// Result type for command operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Gateway-level errors (startup and serving, not caller-visible)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Listener could not be bound; startup is aborted
    #[error("server bind error: {0}")]
    Bind(String),

    /// Accept loop terminated with an I/O error
    #[error("server error: {0}")]
    Serve(String),
}

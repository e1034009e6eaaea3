//! # API Error Type
//!
//! Unified error and response envelope for CLI commands.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  command ──► aurum-engine ──► EngineError                              │
//! │                                  │                                      │
//! │              Domain(CoreError) ──┼──► code + domain message            │
//! │                                  │                                      │
//! │      PersistenceFailure(DbError) ┴──► DATABASE_ERROR                   │
//! │                                       detail logged, generic message   │
//! │                                       (full detail with app.debug)     │
//! │                                                                         │
//! │  stdout:                                                                │
//! │  { "success": false,                                                    │
//! │    "error": { "code": "INSUFFICIENT_STOCK",                             │
//! │               "message": "Insufficient stock for P1: requested 5, ..." }│
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use aurum_db::DbError;
use aurum_engine::{ConfigError, EngineError, ErrorKind};

/// Error returned by a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

/// Error codes for responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    InsufficientStock,
    InsufficientPoints,
    ExternalServiceUnavailable,
    NoRateAvailable,
    DatabaseError,
    ConfigError,
    Internal,
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::Validation => ErrorCode::ValidationError,
            ErrorKind::InsufficientStock => ErrorCode::InsufficientStock,
            ErrorKind::InsufficientPoints => ErrorCode::InsufficientPoints,
            ErrorKind::ExternalServiceUnavailable => ErrorCode::ExternalServiceUnavailable,
            ErrorKind::NoRateAvailable => ErrorCode::NoRateAvailable,
            ErrorKind::PersistenceFailure => ErrorCode::DatabaseError,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Converts an engine error, hiding storage detail unless `debug`.
    pub fn from_engine(err: EngineError, debug: bool) -> Self {
        let code = ErrorCode::from(err.kind());
        match err {
            EngineError::Domain(e) => ApiError::new(code, e.to_string()),
            EngineError::PersistenceFailure(e) => {
                tracing::error!(error = %e, "Storage failure");
                if debug {
                    ApiError::new(code, e.to_string())
                } else {
                    ApiError::new(code, generic_storage_message(&e))
                }
            }
        }
    }
}

fn generic_storage_message(err: &DbError) -> &'static str {
    match err {
        DbError::Busy(_) | DbError::PoolExhausted => "Database is busy, try again",
        DbError::ConnectionFailed(_) => "Database connection failed",
        DbError::MigrationFailed(_) => "Database migration failed",
        _ => "Database operation failed",
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for commands.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Response Envelope
// =============================================================================

/// What every command prints.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: ApiError) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

impl<T: Serialize> From<ApiResult<T>> for ApiResponse<T> {
    fn from(result: ApiResult<T>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data),
            Err(error) => ApiResponse::err(error),
        }
    }
}

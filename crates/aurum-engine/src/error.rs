//! # Engine Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       EngineError                                       │
//! │                                                                         │
//! │  Domain(CoreError)              PersistenceFailure(DbError)            │
//! │  ├── NotFound                   ├── Busy           ← retried           │
//! │  ├── Validation                 ├── PoolExhausted  ← retried           │
//! │  ├── InsufficientStock          └── everything else                    │
//! │  ├── InsufficientPoints                                                │
//! │  ├── ExternalServiceUnavailable                                        │
//! │  └── NoRateAvailable                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Either variant means the unit of work was rolled back in full.

use aurum_core::{CoreError, ValidationError};
use aurum_db::DbError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure of a unit of work.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the request.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// The storage layer failed.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] DbError),
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Domain(CoreError::Validation(err))
    }
}

/// Stable tag for each failure kind, for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    InsufficientStock,
    InsufficientPoints,
    ExternalServiceUnavailable,
    NoRateAvailable,
    PersistenceFailure,
}

impl EngineError {
    /// The failure kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Domain(CoreError::NotFound { .. }) => ErrorKind::NotFound,
            EngineError::Domain(CoreError::Validation(_)) => ErrorKind::Validation,
            EngineError::Domain(CoreError::InsufficientStock { .. }) => ErrorKind::InsufficientStock,
            EngineError::Domain(CoreError::InsufficientPoints { .. }) => {
                ErrorKind::InsufficientPoints
            }
            EngineError::Domain(CoreError::ExternalServiceUnavailable { .. }) => {
                ErrorKind::ExternalServiceUnavailable
            }
            EngineError::Domain(CoreError::NoRateAvailable(_)) => ErrorKind::NoRateAvailable,
            EngineError::PersistenceFailure(_) => ErrorKind::PersistenceFailure,
        }
    }

    /// True when the storage layer reported lock contention and the whole
    /// unit of work can be attempted again.
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, EngineError::PersistenceFailure(e) if e.is_busy())
    }

    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            EngineError::Domain(e) => Some(e),
            EngineError::PersistenceFailure(_) => None,
        }
    }

    pub(crate) fn not_found(entity: &str, id: &str) -> Self {
        EngineError::Domain(CoreError::not_found(entity, id))
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Configuration load/save/validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Failed to read or write the config file.
    #[error("Config file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize the config.
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No path given and no platform config directory available.
    #[error("No config path available")]
    NoPath,
}

/// Result type alias for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err: EngineError = CoreError::InsufficientStock {
            product: "RING-22K".into(),
            requested: 5,
            available: 2,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(
            err.to_string(),
            "Insufficient stock for RING-22K: requested 5, available 2"
        );

        let err: EngineError = ValidationError::MustBePositive {
            field: "points".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_only_busy_is_retryable() {
        let busy: EngineError = DbError::Busy("database is locked".into()).into();
        assert!(busy.is_retryable_conflict());
        assert_eq!(busy.kind(), ErrorKind::PersistenceFailure);

        let fk: EngineError = DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".into(),
        }
        .into();
        assert!(!fk.is_retryable_conflict());

        let domain: EngineError = CoreError::NoRateAvailable("22K".into()).into();
        assert!(!domain.is_retryable_conflict());
        assert!(domain.as_domain().is_some());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::InsufficientPoints).unwrap(),
            "\"insufficient_points\""
        );
    }
}

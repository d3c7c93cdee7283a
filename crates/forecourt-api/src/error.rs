//! # API Error Type
//!
//! Unified error type for the command layer.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Forecourt                              │
//! │                                                                         │
//! │  Collaborator                Rust Backend                               │
//! │  ────────────                ────────────                               │
//! │                                                                         │
//! │  submit_daily_operations(close = true)                                  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Ledger rule? ──── CoreError::IncompleteShift ──────┐            │  │
//! │  │         │                                           │            │  │
//! │  │         ▼                                           ▼            │  │
//! │  │  Storage? ──────── DbError::Busy ─────────────── ApiError ──────►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ───────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  {                                                                      │
//! │    "code": "INCOMPLETE_SHIFT",                                          │
//! │    "message": "Shift … cannot close: 1 reading(s) missing",             │
//! │    "retryable": false,                                                  │
//! │    "details": { "missing": [{ "nozzleId": …, "readingType": … }] }      │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Infrastructure failures are logged with their cause and reach the
//! caller only as a generic message.

use forecourt_core::CoreError;
use forecourt_db::DbError;
use serde::Serialize;
use serde_json::json;

use crate::state::ConfigError;

/// API error returned from commands.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Whether the same request may succeed if sent again unchanged
    pub retryable: bool,

    /// Structured context, e.g. the missing readings of a shift
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error codes for API responses, one per ledger failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed or out-of-range input
    ValidationError,

    /// Duplicate scoped code
    Conflict,

    /// Referenced entity missing, inactive or in the wrong scope
    ReferenceError,

    /// Lookup by id found nothing
    NotFound,

    /// Meter value would run backward
    ReadingRegression,

    /// Shift already closed
    ImmutableState,

    /// Shift close with readings missing
    IncompleteShift,

    /// Cylinder movement exceeds stock on hand
    InsufficientStock,

    /// Tank has no opening baseline for the date
    MissingBaseline,

    /// Database locked or pool exhausted
    Busy,

    /// Database operation failed
    DatabaseError,

    /// Configuration could not be loaded
    ConfigError,

    /// Internal error
    Internal,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            retryable: false,
            details: None,
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn reference(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ReferenceError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        let transient = err.is_transient();
        let api = match err {
            DbError::Core(core) => return ApiError::from(core),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, .. } => {
                ApiError::new(ErrorCode::Conflict, format!("Duplicate value for {}", field))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::reference("Invalid reference")
            }
            DbError::ConstraintViolation(msg) => {
                tracing::error!("Constraint violation: {}", msg);
                ApiError::validation("Value rejected by a database constraint")
            }
            DbError::Busy(msg) => {
                tracing::warn!("Database busy: {}", msg);
                ApiError::new(ErrorCode::Busy, "Database is busy, try again")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::Busy, "Database pool exhausted, try again")
            }
            DbError::ConnectionFailed(msg) => {
                tracing::error!("Database connection failed: {}", msg);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(msg) => {
                tracing::error!("Migration failed: {}", msg);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(msg) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", msg);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::Internal(msg) => {
                tracing::error!("Internal database error: {}", msg);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        };

        if transient {
            api.retryable()
        } else {
            api
        }
    }
}

/// Converts ledger rule violations to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
            CoreError::Conflict {
                entity,
                field,
                value,
                scope,
            } => ApiError::new(ErrorCode::Conflict, message).with_details(json!({
                "entity": entity,
                "field": field,
                "value": value,
                "scope": scope,
            })),
            CoreError::Reference { entity, id, reason } => {
                ApiError::new(ErrorCode::ReferenceError, message).with_details(json!({
                    "entity": entity,
                    "id": id,
                    "reason": reason,
                }))
            }
            CoreError::NotFound { .. } => ApiError::new(ErrorCode::NotFound, message),
            CoreError::ReadingRegression {
                nozzle_id,
                reading_type,
                value,
                minimum,
            } => ApiError::new(ErrorCode::ReadingRegression, message).with_details(json!({
                "nozzleId": nozzle_id,
                "readingType": reading_type,
                "value": value,
                "minimum": minimum,
            })),
            CoreError::ImmutableState { .. } => ApiError::new(ErrorCode::ImmutableState, message),
            CoreError::IncompleteShift { shift_id, missing } => {
                ApiError::new(ErrorCode::IncompleteShift, message).with_details(json!({
                    "shiftId": shift_id,
                    "missing": missing,
                }))
            }
            CoreError::InsufficientStock {
                cylinder_type,
                bucket,
                available,
                requested,
            } => ApiError::new(ErrorCode::InsufficientStock, message).with_details(json!({
                "cylinderType": cylinder_type,
                "bucket": bucket,
                "available": available,
                "requested": requested,
            })),
            CoreError::MissingBaseline { tank_id, date } => {
                ApiError::new(ErrorCode::MissingBaseline, message).with_details(json!({
                    "tankId": tank_id,
                    "date": date,
                }))
            }
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use forecourt_core::{MissingReading, ReadingType, ValidationError};

    #[test]
    fn test_incomplete_shift_carries_missing_pairs() {
        let err: ApiError = CoreError::IncompleteShift {
            shift_id: "s1".to_string(),
            missing: vec![MissingReading {
                nozzle_id: "n2".to_string(),
                nozzle_number: "2".to_string(),
                reading_type: ReadingType::Closing,
            }],
        }
        .into();

        assert_eq!(err.code, ErrorCode::IncompleteShift);
        assert!(!err.retryable);

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INCOMPLETE_SHIFT");
        assert_eq!(json["details"]["missing"][0]["nozzleId"], "n2");
        assert_eq!(json["details"]["missing"][0]["readingType"], "CLOSING");
    }

    #[test]
    fn test_busy_is_retryable_and_generic() {
        let err: ApiError = DbError::Busy("database is locked".to_string()).into();
        assert_eq!(err.code, ErrorCode::Busy);
        assert!(err.retryable);

        let err: ApiError = DbError::QueryFailed("no such column: secret".to_string()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.retryable);
        assert!(!err.message.contains("secret"));
    }

    #[test]
    fn test_core_errors_pass_through_db_layer() {
        let err: ApiError = DbError::Core(CoreError::Validation(ValidationError::Required {
            field: "reading_value".to_string(),
        }))
        .into();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "reading_value is required");

        let json = serde_json::to_value(ApiError::not_found("Tank", "t1")).unwrap();
        assert!(json.get("details").is_none());
    }
}

//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Rule violation (CoreError)        │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  DbError (this module) ◄────────────── DbError::Core                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (forecourt-api) ← Serialized for collaborators               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use forecourt_core::{CoreError, ValidationError};
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Database operation errors.
///
/// Business rule violations travel inside [`DbError::Core`]; every other
/// variant is an infrastructure failure.
#[derive(Debug, Error)]
pub enum DbError {
    /// A station ledger rule was violated.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A row expected by a query is missing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation that escaped an explicit check.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint or trigger rejected the write.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The database was locked by another writer past the busy timeout.
    #[error("Database is busy: {0}")]
    Busy(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    ///
    /// Only storage unavailability qualifies; rule violations never do.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Busy(_) | DbError::PoolExhausted | DbError::ConnectionFailed(_)
        )
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound         → DbError::NotFound
/// sqlx::Error::Database (unique)   → DbError::UniqueViolation
/// sqlx::Error::Database (fk)       → DbError::ForeignKeyViolation
/// sqlx::Error::Database (check)    → DbError::ConstraintViolation
/// sqlx::Error::Database (locked)   → DbError::Busy
/// sqlx::Error::PoolTimedOut        → DbError::PoolExhausted
/// sqlx::Error::Io / PoolClosed     → DbError::ConnectionFailed
/// Other                            → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();

                match db_err.kind() {
                    // "UNIQUE constraint failed: <table>.<column>"
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        field: msg
                            .split("UNIQUE constraint failed: ")
                            .nth(1)
                            .unwrap_or("unknown")
                            .to_string(),
                        value: "unknown".to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message: msg },
                    ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                        DbError::ConstraintViolation(msg)
                    }
                    _ if is_busy(&msg) => DbError::Busy(msg),
                    _ if msg.contains("append-only") => DbError::ConstraintViolation(msg),
                    _ => DbError::QueryFailed(msg),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED messages.
fn is_busy(msg: &str) -> bool {
    msg.contains("database is locked")
        || msg.contains("database table is locked")
        || msg.contains("database is busy")
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DbError::Busy("database is locked".to_string()).is_transient());
        assert!(DbError::PoolExhausted.is_transient());
        assert!(!DbError::Core(CoreError::not_found("Tank", "t1")).is_transient());
        assert!(!DbError::ConstraintViolation("CHECK".to_string()).is_transient());
    }

    #[test]
    fn test_validation_lifts_into_core() {
        let err: DbError = ValidationError::Required {
            field: "code".to_string(),
        }
        .into();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }
}

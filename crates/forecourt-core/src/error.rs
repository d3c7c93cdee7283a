//! # Error Types
//!
//! Domain-specific error types for forecourt-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  forecourt-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations (the taxonomy)         │
//! │  └── ValidationError  - Missing/malformed input                         │
//! │                                                                         │
//! │  forecourt-db errors                                                    │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  forecourt-api errors                                                   │
//! │  └── ApiError         - What collaborators see (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Caller        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant is a user-visible failure. Nothing here is retried
//! automatically and no variant is ever downgraded to a silent clamp.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::quantity::Volume;
use crate::types::ReadingType;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the station ledger.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A scoped code already exists.
    ///
    /// ## When This Occurs
    /// - Second tank "T1" in the same branch
    /// - Second fuel type "PMG" in the same business
    /// - Second nozzle number on the same pump
    #[error("{entity} with {field} '{value}' already exists in {scope}")]
    Conflict {
        entity: String,
        field: String,
        value: String,
        scope: String,
    },

    /// A referenced entity is missing, inactive, or in the wrong scope.
    #[error("{entity} {id} cannot be used: {reason}")]
    Reference {
        entity: String,
        id: String,
        reason: String,
    },

    /// Lookup by primary id found nothing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A meter value would run backward.
    ///
    /// ## User Workflow
    /// ```text
    /// Nozzle baseline: 1200.00 L
    ///      │
    ///      ▼
    /// Cashier enters OPENING 1150.00 L
    ///      │
    ///      ▼
    /// ReadingRegression { value: 1150.00 L, minimum: 1200.00 L }
    /// ```
    #[error(
        "{reading_type:?} reading {value} for nozzle {nozzle_id} is below the minimum {minimum}"
    )]
    ReadingRegression {
        nozzle_id: String,
        reading_type: ReadingType,
        value: Volume,
        minimum: Volume,
    },

    /// The entity is in a terminal state and cannot be changed.
    #[error("{entity} {id} is {status}, cannot perform operation")]
    ImmutableState {
        entity: String,
        id: String,
        status: String,
    },

    /// A shift close was attempted before every active nozzle reported.
    #[error("Shift {shift_id} cannot close: {} reading(s) missing", .missing.len())]
    IncompleteShift {
        shift_id: String,
        missing: Vec<MissingReading>,
    },

    /// Cylinder issue/return exceeds what is on hand.
    #[error(
        "Insufficient {bucket} stock of {cylinder_type}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        cylinder_type: String,
        bucket: StockBucket,
        available: i64,
        requested: i64,
    },

    /// Dip continuity is broken: no opening dip and no prior closing.
    #[error("Tank {tank_id} has no opening baseline for {date}: prior day's closing dip is missing")]
    MissingBaseline { tank_id: String, date: NaiveDate },
}

impl CoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn reference(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::Reference {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Reference error for a soft-deleted row.
    pub fn inactive(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::reference(entity, id, "inactive")
    }
}

/// A (nozzle, reading type) pair that is still missing from a shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingReading {
    pub nozzle_id: String,
    pub nozzle_number: String,
    pub reading_type: ReadingType,
}

/// Which side of the cylinder stock a check ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockBucket {
    Filled,
    Empty,
}

impl std::fmt::Display for StockBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockBucket::Filled => write!(f, "filled"),
            StockBucket::Empty => write!(f, "empty"),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors. Always recoverable client-side.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid code characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A volume exceeds the tank's physical capacity.
    #[error("{field} {value} exceeds tank capacity {capacity}")]
    ExceedsCapacity {
        field: String,
        value: Volume,
        capacity: Volume,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            cylinder_type: "12KG".to_string(),
            bucket: StockBucket::Filled,
            available: 75,
            requested: 80,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient filled stock of 12KG: available 75, requested 80"
        );
    }

    #[test]
    fn test_regression_message() {
        let err = CoreError::ReadingRegression {
            nozzle_id: "n1".to_string(),
            reading_type: ReadingType::Closing,
            value: Volume::from_litres(90),
            minimum: Volume::from_litres(100),
        };
        assert_eq!(
            err.to_string(),
            "Closing reading 90.00 L for nozzle n1 is below the minimum 100.00 L"
        );
    }

    #[test]
    fn test_incomplete_shift_counts_missing() {
        let err = CoreError::IncompleteShift {
            shift_id: "s1".to_string(),
            missing: vec![MissingReading {
                nozzle_id: "n2".to_string(),
                nozzle_number: "2".to_string(),
                reading_type: ReadingType::Closing,
            }],
        };
        assert_eq!(err.to_string(), "Shift s1 cannot close: 1 reading(s) missing");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let err: CoreError = ValidationError::Required {
            field: "code".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}

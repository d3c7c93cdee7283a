//! # Validation Module
//!
//! Input validation utilities for the station ledger.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Command layer (forecourt-api)                                 │
//! │  └── Type validation (deserialization)                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - field rules before any write                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Repositories - scoped uniqueness, references, state           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite - UNIQUE, CHECK and FOREIGN KEY constraints           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::quantity::{LossRate, Volume};
use crate::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest business code accepted (branch, fuel type, tank number, ...).
pub const MAX_CODE_LEN: usize = 32;

/// Longest display name accepted.
pub const MAX_NAME_LEN: usize = 120;

/// Longest free-text note on a cylinder transaction.
pub const MAX_NOTES_LEN: usize = 500;

/// Largest cylinder quantity accepted in one transaction.
pub const MAX_CYLINDER_QUANTITY: i64 = 10_000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a scoped business code and returns it trimmed.
///
/// ## Rules
/// - Must not be empty
/// - At most [`MAX_CODE_LEN`] characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use forecourt_core::validation::validate_code;
///
/// assert_eq!(validate_code("tank_number", " T1 ").unwrap(), "T1");
/// assert!(validate_code("tank_number", "").is_err());
/// assert!(validate_code("tank_number", "T 1").is_err());
/// ```
pub fn validate_code(field: &str, code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if code.len() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(code.to_string())
}

/// Validates a display name and returns it trimmed.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Validates optional notes; blank notes become `None`.
pub fn validate_notes(notes: Option<&str>) -> ValidationResult<Option<String>> {
    match notes.map(str::trim) {
        None | Some("") => Ok(None),
        Some(n) if n.len() > MAX_NOTES_LEN => Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LEN,
        }),
        Some(n) => Ok(Some(n.to_string())),
    }
}

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use forecourt_core::validation::validate_uuid;
///
/// assert!(validate_uuid("branch_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("branch_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a UTC offset in minutes (-14:00 ..= +14:00).
pub fn validate_utc_offset(minutes: i32) -> ValidationResult<()> {
    if !(-840..=840).contains(&minutes) {
        return Err(ValidationError::OutOfRange {
            field: "utc_offset_minutes".to_string(),
            min: -840,
            max: 840,
        });
    }
    Ok(())
}

/// Validates a fuel price. Zero is rejected: a free litre is a data error.
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.cents() <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Validates a permissible loss rate (0% to 100%).
pub fn validate_loss_rate(rate: LossRate) -> ValidationResult<()> {
    if rate.bps() > LossRate::MAX_BPS {
        return Err(ValidationError::OutOfRange {
            field: "permissible_loss".to_string(),
            min: 0,
            max: LossRate::MAX_BPS as i64,
        });
    }
    Ok(())
}

/// Validates a tank capacity.
pub fn validate_capacity(capacity: Volume) -> ValidationResult<()> {
    if !capacity.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "capacity".to_string(),
        });
    }
    Ok(())
}

/// Validates a cumulative meter value.
pub fn validate_meter_value(value: Volume) -> ValidationResult<()> {
    if value.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "reading_value".to_string(),
        });
    }
    Ok(())
}

/// Validates a stock volume against a tank's capacity.
///
/// ## Rules
/// - `0 ≤ stock ≤ capacity`
pub fn validate_stock_level(stock: Volume, capacity: Volume) -> ValidationResult<()> {
    if stock.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "calculated_stock".to_string(),
        });
    }
    if stock > capacity {
        return Err(ValidationError::ExceedsCapacity {
            field: "calculated_stock".to_string(),
            value: stock,
            capacity,
        });
    }
    Ok(())
}

/// Validates a cylinder transaction quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - At most [`MAX_CYLINDER_QUANTITY`]
pub fn validate_cylinder_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_CYLINDER_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_CYLINDER_QUANTITY,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_code() {
        assert_eq!(validate_code("code", "PMG").unwrap(), "PMG");
        assert_eq!(validate_code("code", "  KHI-01 ").unwrap(), "KHI-01");
        assert!(validate_code("code", "").is_err());
        assert!(validate_code("code", "   ").is_err());
        assert!(validate_code("code", "has space").is_err());
        assert!(validate_code("code", &"A".repeat(40)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Premium Motor Gasoline").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(200)).is_err());
    }

    #[test]
    fn test_validate_notes() {
        assert_eq!(validate_notes(None).unwrap(), None);
        assert_eq!(validate_notes(Some("  ")).unwrap(), None);
        assert_eq!(
            validate_notes(Some(" truck 42 ")).unwrap(),
            Some("truck 42".to_string())
        );
        assert!(validate_notes(Some(&"x".repeat(600))).is_err());
    }

    #[test]
    fn test_validate_stock_level() {
        let cap = Volume::from_litres(10_000);
        assert!(validate_stock_level(Volume::zero(), cap).is_ok());
        assert!(validate_stock_level(cap, cap).is_ok());
        assert!(matches!(
            validate_stock_level(Volume::from_litres(10_001), cap),
            Err(ValidationError::ExceedsCapacity { .. })
        ));
        assert!(validate_stock_level(Volume::from_centilitres(-1), cap).is_err());
    }

    #[test]
    fn test_validate_cylinder_quantity() {
        assert!(validate_cylinder_quantity(1).is_ok());
        assert!(validate_cylinder_quantity(0).is_err());
        assert!(validate_cylinder_quantity(-3).is_err());
        assert!(validate_cylinder_quantity(MAX_CYLINDER_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_rates_and_prices() {
        assert!(validate_loss_rate(LossRate::from_bps(25)).is_ok());
        assert!(validate_loss_rate(LossRate::from_bps(10_001)).is_err());
        assert!(validate_price(Money::from_cents(27_990)).is_ok());
        assert!(validate_price(Money::zero()).is_err());
        assert!(validate_utc_offset(300).is_ok());
        assert!(validate_utc_offset(900).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "123").is_err());
    }
}

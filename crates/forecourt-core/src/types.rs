//! # Domain Types
//!
//! Core domain types used throughout the station ledger.
//!
//! ## Topology
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Business ──┬── Branch ──┬── StorageTank ◄──────────┐                   │
//! │             │            │        ▲ fuel_type_id    │ tank_id           │
//! │             │            ├── Pump ──── Nozzle ──────┘                   │
//! │             │            ├── ShiftDefinition ── ShiftInstance           │
//! │             │            │                          └── MeterReading    │
//! │             │            └── CylinderStock ── CylinderTransaction       │
//! │             ├── FuelType                                                │
//! │             └── CylinderType                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every topology entity has:
//! - `id`: UUID v4 - immutable, used for relations
//! - Business code: (`code`, `tank_number`, `pump_number`, `nozzle_number`) -
//!   human-readable, unique within its owning scope
//!
//! Relations are explicit id fields; referential checks happen at write time
//! in the repositories, not through cascades.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::quantity::{Depth, LossRate, Volume, Weight};

// =============================================================================
// Enumerations
// =============================================================================

/// Which end of a shift a meter reading belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadingType {
    Opening,
    Closing,
}

/// Kind of tank dip measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DipReadingType {
    /// Start-of-day stock.
    Opening,
    /// End-of-day stock; advances the tank's current stock.
    Closing,
    /// Volume delivered into the tank during the day.
    Receipt,
}

/// Shift lifecycle: `Open → Closed` (terminal).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftStatus {
    /// Readings may be written and overwritten.
    #[default]
    Open,
    /// Frozen; baselines have been advanced.
    Closed,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Open => "open",
            ShiftStatus::Closed => "closed",
        }
    }
}

/// Cylinder stock movement kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CylinderTxType {
    /// Filled cylinders delivered by the supplier.
    Receive,
    /// Filled cylinder handed over in exchange for the customer's empty.
    Issue,
    /// Empties sent back to the supplier.
    Return,
}

// =============================================================================
// Topology
// =============================================================================

/// Tenant root.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Business {
    pub id: String,
    /// Globally unique business code.
    pub code: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A fuel station site.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Branch {
    pub id: String,
    pub business_id: String,
    /// Unique within the business.
    pub code: String,
    pub name: String,
    /// Offset of the branch's local time from UTC, in minutes.
    pub utc_offset_minutes: i32,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Branch {
    /// Calendar date at the branch for the given instant.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        (now + Duration::minutes(self.utc_offset_minutes as i64)).date_naive()
    }
}

/// A named shift pattern for a branch. The default one drives
/// `get_or_create_shift`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ShiftDefinition {
    pub id: String,
    pub branch_id: String,
    pub name: String,
    pub is_default: bool,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A grade of fuel sold by a business.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct FuelType {
    pub id: String,
    pub business_id: String,
    /// Unique within the business (e.g. "PMG", "HSD").
    pub code: String,
    pub name: String,
    /// Current price per litre, set externally.
    pub price: Money,
    /// Tolerated dip/meter variance as a share of dispensed volume.
    pub permissible_loss: LossRate,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// An underground storage tank bound to one fuel type.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StorageTank {
    pub id: String,
    pub branch_id: String,
    pub fuel_type_id: String,
    /// Unique within the branch (e.g. "T1").
    pub tank_number: String,
    pub capacity: Volume,
    /// Last closing dip volume. Invariant: `0 ≤ current_stock ≤ capacity`.
    pub current_stock: Volume,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl StorageTank {
    /// Free space left in the tank.
    #[inline]
    pub fn ullage(&self) -> Volume {
        self.capacity - self.current_stock
    }
}

/// A dispenser unit on the forecourt.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Pump {
    pub id: String,
    pub branch_id: String,
    /// Unique within the branch.
    pub pump_number: String,
    pub label: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A hose on a pump, drawing one fuel type from one tank.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Nozzle {
    pub id: String,
    pub pump_id: String,
    pub fuel_type_id: String,
    pub tank_id: String,
    /// Unique within the pump.
    pub nozzle_number: String,
    /// Cumulative meter baseline; the implicit OPENING of the next shift.
    /// Only a shift close advances it.
    pub current_meter_reading: Volume,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Shift Ledger
// =============================================================================

/// One shift of one branch on one business date.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ShiftInstance {
    pub id: String,
    pub branch_id: String,
    pub shift_definition_id: String,
    #[ts(as = "String")]
    pub business_date: NaiveDate,
    pub status: ShiftStatus,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl ShiftInstance {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == ShiftStatus::Open
    }
}

/// A nozzle meter value captured at one end of a shift.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MeterReading {
    pub id: String,
    pub shift_id: String,
    pub nozzle_id: String,
    pub reading_type: ReadingType,
    pub reading_value: Volume,
    /// Price per litre frozen when the shift closed (closing rows only).
    pub unit_price: Option<Money>,
    #[ts(as = "String")]
    pub recorded_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Dip Readings
// =============================================================================

/// A gauge measurement of a tank on a business date.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DipReading {
    pub id: String,
    pub tank_id: String,
    #[ts(as = "String")]
    pub reading_date: NaiveDate,
    pub reading_type: DipReadingType,
    /// Raw gauge depth.
    pub dip_depth: Depth,
    /// Volume derived from the depth via the tank's calibration chart.
    /// For RECEIPT rows, the delivered volume.
    pub calculated_stock: Volume,
    #[ts(as = "String")]
    pub recorded_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Cylinders
// =============================================================================

/// A gas cylinder size sold by a business.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CylinderType {
    pub id: String,
    pub business_id: String,
    /// Unique within the business (e.g. "12KG").
    pub code: String,
    pub name: String,
    pub weight: Weight,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Filled/empty counts for one cylinder type at one branch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CylinderStock {
    pub id: String,
    pub branch_id: String,
    pub cylinder_type_id: String,
    pub filled_qty: i64,
    pub empty_qty: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Append-only record of an applied cylinder stock movement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CylinderTransaction {
    pub id: String,
    pub branch_id: String,
    pub cylinder_type_id: String,
    pub tx_type: CylinderTxType,
    pub quantity: i64,
    pub filled_delta: i64,
    pub empty_delta: i64,
    pub filled_after: i64,
    pub empty_after: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Upsert Outcome
// =============================================================================

/// Result of a find-then-create-else-update entry point.
///
/// Creation of topology never yields `Updated`; reading upserts never yield
/// `Conflict`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome<T> {
    Created(T),
    Updated(T),
    Conflict {
        field: String,
        value: String,
        existing_id: String,
    },
}

impl<T> UpsertOutcome<T> {
    /// The written value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            UpsertOutcome::Created(v) | UpsertOutcome::Updated(v) => Some(v),
            UpsertOutcome::Conflict { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            UpsertOutcome::Created(v) | UpsertOutcome::Updated(v) => Some(v),
            UpsertOutcome::Conflict { .. } => None,
        }
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn branch(offset: i32) -> Branch {
        let now = Utc::now();
        Branch {
            id: "b1".to_string(),
            business_id: "biz".to_string(),
            code: "KHI-01".to_string(),
            name: "Karachi 01".to_string(),
            utc_offset_minutes: offset,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_branch_local_date_crosses_midnight() {
        // 21:30 UTC is already the next day at UTC+5
        let instant = Utc.with_ymd_and_hms(2026, 3, 1, 21, 30, 0).unwrap();
        assert_eq!(
            branch(300).local_date(instant),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );
        assert_eq!(
            branch(0).local_date(instant),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_shift_status_default() {
        assert_eq!(ShiftStatus::default(), ShiftStatus::Open);
        assert_eq!(ShiftStatus::Closed.as_str(), "closed");
    }

    #[test]
    fn test_enum_wire_format() {
        assert_eq!(
            serde_json::to_string(&DipReadingType::Receipt).unwrap(),
            "\"RECEIPT\""
        );
        let parsed: CylinderTxType = serde_json::from_str("\"ISSUE\"").unwrap();
        assert_eq!(parsed, CylinderTxType::Issue);
    }

    #[test]
    fn test_upsert_outcome_accessors() {
        let created: UpsertOutcome<u8> = UpsertOutcome::Created(1);
        assert!(created.is_created());
        assert_eq!(created.value(), Some(&1));

        let conflict: UpsertOutcome<u8> = UpsertOutcome::Conflict {
            field: "code".to_string(),
            value: "T1".to_string(),
            existing_id: "x".to_string(),
        };
        assert!(conflict.into_value().is_none());
    }
}

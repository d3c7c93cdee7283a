//! # Meter Rules
//!
//! Pure rules of the shift ledger: meter monotonicity, shift completeness,
//! derived sales and sale value.
//!
//! ## Monotonicity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  shift n-1                 shift n                                      │
//! │  ┌─────────┬─────────┐     ┌─────────┬─────────┐                        │
//! │  │ OPENING │ CLOSING │ ──► │ OPENING │ CLOSING │                        │
//! │  └─────────┴────┬────┘     └────▲────┴─────────┘                        │
//! │                 │               │                                       │
//! │                 └── baseline ───┘  (advanced only by close_shift)       │
//! │                                                                         │
//! │  closing(n) ≥ opening(n) ≥ baseline = closing(n-1)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{CoreError, CoreResult, MissingReading};
use crate::money::Money;
use crate::quantity::Volume;
use crate::types::{MeterReading, Nozzle, ReadingType, ShiftInstance, ShiftStatus};
use crate::validation::validate_meter_value;

/// Fails with `ImmutableState` unless the shift is open.
pub fn ensure_open(shift: &ShiftInstance) -> CoreResult<()> {
    match shift.status {
        ShiftStatus::Open => Ok(()),
        ShiftStatus::Closed => Err(CoreError::ImmutableState {
            entity: "Shift".to_string(),
            id: shift.id.clone(),
            status: shift.status.as_str().to_string(),
        }),
    }
}

/// The OPENING value to record: the explicit value, or the baseline.
#[inline]
pub fn resolve_opening(baseline: Volume, explicit: Option<Volume>) -> Volume {
    explicit.unwrap_or(baseline)
}

/// Checks an OPENING write against the nozzle baseline and, when the shift
/// already holds a CLOSING for the nozzle, against that closing.
pub fn check_opening(
    nozzle_id: &str,
    baseline: Volume,
    value: Volume,
    existing_closing: Option<Volume>,
) -> CoreResult<()> {
    validate_meter_value(value)?;

    if value < baseline {
        return Err(CoreError::ReadingRegression {
            nozzle_id: nozzle_id.to_string(),
            reading_type: ReadingType::Opening,
            value,
            minimum: baseline,
        });
    }

    if let Some(closing) = existing_closing {
        if closing < value {
            return Err(CoreError::ReadingRegression {
                nozzle_id: nozzle_id.to_string(),
                reading_type: ReadingType::Closing,
                value: closing,
                minimum: value,
            });
        }
    }

    Ok(())
}

/// Checks a CLOSING write against the shift's OPENING for the nozzle.
pub fn check_closing(nozzle_id: &str, opening: Volume, value: Volume) -> CoreResult<()> {
    validate_meter_value(value)?;

    if value < opening {
        return Err(CoreError::ReadingRegression {
            nozzle_id: nozzle_id.to_string(),
            reading_type: ReadingType::Closing,
            value,
            minimum: opening,
        });
    }

    Ok(())
}

/// Litres dispensed between the two readings.
#[inline]
pub fn derived_sales(opening: Volume, closing: Volume) -> Volume {
    closing - opening
}

/// Both ends of one nozzle's shift, as far as they are known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadingPair {
    pub opening: Option<Volume>,
    pub closing: Option<Volume>,
    pub closing_price: Option<Money>,
}

impl ReadingPair {
    /// Dispensed volume, once both readings exist.
    pub fn sales(&self) -> Option<Volume> {
        match (self.opening, self.closing) {
            (Some(o), Some(c)) => Some(derived_sales(o, c)),
            _ => None,
        }
    }
}

/// Groups a shift's readings by nozzle id.
pub fn pair_readings(readings: &[MeterReading]) -> BTreeMap<String, ReadingPair> {
    let mut pairs: BTreeMap<String, ReadingPair> = BTreeMap::new();
    for r in readings {
        let pair = pairs.entry(r.nozzle_id.clone()).or_default();
        match r.reading_type {
            ReadingType::Opening => pair.opening = Some(r.reading_value),
            ReadingType::Closing => {
                pair.closing = Some(r.reading_value);
                pair.closing_price = r.unit_price;
            }
        }
    }
    pairs
}

/// Lists every (active nozzle, reading type) pair the shift still lacks.
///
/// An empty result means the shift may close.
pub fn missing_readings(active_nozzles: &[Nozzle], readings: &[MeterReading]) -> Vec<MissingReading> {
    let pairs = pair_readings(readings);
    let mut missing = Vec::new();

    for nozzle in active_nozzles {
        let pair = pairs.get(&nozzle.id).copied().unwrap_or_default();
        if pair.opening.is_none() {
            missing.push(MissingReading {
                nozzle_id: nozzle.id.clone(),
                nozzle_number: nozzle.nozzle_number.clone(),
                reading_type: ReadingType::Opening,
            });
        }
        if pair.closing.is_none() {
            missing.push(MissingReading {
                nozzle_id: nozzle.id.clone(),
                nozzle_number: nozzle.nozzle_number.clone(),
                reading_type: ReadingType::Closing,
            });
        }
    }

    missing
}

// =============================================================================
// Sales Lines
// =============================================================================

/// One nozzle's contribution to a shift's sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesLine {
    pub nozzle_id: String,
    pub fuel_type_id: String,
    pub tank_id: String,
    pub opening: Volume,
    pub closing: Volume,
    pub volume: Volume,
    pub unit_price: Money,
    pub value: Money,
}

impl SalesLine {
    /// Builds the line from a complete reading pair; `None` if a reading is
    /// missing. The snapshot price wins over `current_price` once present.
    pub fn from_pair(nozzle: &Nozzle, pair: &ReadingPair, current_price: Money) -> Option<Self> {
        let (opening, closing) = (pair.opening?, pair.closing?);
        let volume = derived_sales(opening, closing);
        let unit_price = pair.closing_price.unwrap_or(current_price);
        Some(SalesLine {
            nozzle_id: nozzle.id.clone(),
            fuel_type_id: nozzle.fuel_type_id.clone(),
            tank_id: nozzle.tank_id.clone(),
            opening,
            closing,
            volume,
            unit_price,
            value: unit_price.for_volume(volume),
        })
    }
}

/// Totals for one fuel type across a shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelTotal {
    pub fuel_type_id: String,
    pub volume: Volume,
    pub value: Money,
}

/// Aggregates sales lines per fuel type, ordered by fuel type id.
pub fn totals_by_fuel(lines: &[SalesLine]) -> Vec<FuelTotal> {
    let mut totals: BTreeMap<&str, (Volume, Money)> = BTreeMap::new();
    for line in lines {
        let entry = totals
            .entry(line.fuel_type_id.as_str())
            .or_insert((Volume::zero(), Money::zero()));
        entry.0 += line.volume;
        entry.1 += line.value;
    }
    totals
        .into_iter()
        .map(|(fuel_type_id, (volume, value))| FuelTotal {
            fuel_type_id: fuel_type_id.to_string(),
            volume,
            value,
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

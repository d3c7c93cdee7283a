//! # Dip Reconciliation
//!
//! Compares the stock a tank should hold according to its meters against
//! what the dip stick says it holds.
//!
//! ## The Identity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  expected_closing = opening + Σ receipts − sales_today                  │
//! │  variance         = actual_closing − expected_closing                   │
//! │  tolerance        = permissible_loss × sales_today                      │
//! │                                                                         │
//! │        −tolerance          0          +tolerance                        │
//! │  ──────────┼───────────────┼───────────────┼──────────                  │
//! │     Loss   │            Normal             │   Gain                     │
//! │  (leak,    │                               │ (anomalous,                │
//! │   theft)   │                               │  always flagged)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::quantity::{LossRate, Volume};

/// Classification of a day's variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VarianceClass {
    /// Within the permissible loss tolerance.
    Normal,
    /// Physical shortage beyond tolerance.
    Loss,
    /// Surplus beyond tolerance.
    Gain,
}

/// Inputs for one tank-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DipInputs {
    pub opening: Volume,
    pub receipts: Volume,
    pub sales: Volume,
}

impl DipInputs {
    /// `opening + receipts − sales`, exact.
    #[inline]
    pub fn expected_closing(&self) -> Volume {
        self.opening + self.receipts - self.sales
    }
}

/// Output of reconciling one tank-day against an actual closing dip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub opening: Volume,
    pub receipts: Volume,
    pub sales: Volume,
    pub expected_closing: Volume,
    pub actual_closing: Volume,
    pub variance: Volume,
    pub tolerance: Volume,
    pub class: VarianceClass,
}

/// Tolerated variance for the day's dispensed volume.
#[inline]
pub fn tolerance(sales: Volume, rate: LossRate) -> Volume {
    sales.abs().apply_rate(rate)
}

/// Classifies a variance against a tolerance. Boundaries count as Normal.
pub fn classify(variance: Volume, tolerance: Volume) -> VarianceClass {
    if variance.abs() <= tolerance {
        VarianceClass::Normal
    } else if variance.is_negative() {
        VarianceClass::Loss
    } else {
        VarianceClass::Gain
    }
}

/// Reconciles one tank-day.
///
/// ## Example
/// ```rust
/// use forecourt_core::reconciliation::{reconcile, DipInputs, VarianceClass};
/// use forecourt_core::{LossRate, Volume};
///
/// let inputs = DipInputs {
///     opening: Volume::from_litres(8_500),
///     receipts: Volume::zero(),
///     sales: Volume::from_litres(80),
/// };
/// let r = reconcile(inputs, Volume::from_litres(8_415), LossRate::from_bps(25));
/// assert_eq!(r.expected_closing, Volume::from_litres(8_420));
/// assert_eq!(r.variance, Volume::from_litres(-5));
/// assert_eq!(r.class, VarianceClass::Loss);
/// ```
pub fn reconcile(inputs: DipInputs, actual_closing: Volume, rate: LossRate) -> Reconciliation {
    let expected_closing = inputs.expected_closing();
    let variance = actual_closing - expected_closing;
    let tolerance = tolerance(inputs.sales, rate);

    Reconciliation {
        opening: inputs.opening,
        receipts: inputs.receipts,
        sales: inputs.sales,
        expected_closing,
        actual_closing,
        variance,
        tolerance,
        class: classify(variance, tolerance),
    }
}

/// Where a tank-day's opening stock came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BaselineSource {
    /// An OPENING dip recorded for the day.
    OpeningDip,
    /// The prior calendar day's CLOSING dip.
    PriorClosing,
    /// No earlier readings: first operational day, opening is zero.
    FirstDay,
}

/// Resolves the opening stock for `date`.
///
/// ## Rules
/// 1. An OPENING dip for the day wins.
/// 2. With no dip readings before `date`, the tank is on its first
///    operational day and opens at zero.
/// 3. Otherwise the prior day's CLOSING dip carries over.
/// 4. Otherwise continuity is broken: `MissingBaseline`.
pub fn resolve_opening(
    tank_id: &str,
    date: NaiveDate,
    opening_dip: Option<Volume>,
    prior_closing: Option<Volume>,
    has_earlier_readings: bool,
) -> CoreResult<(Volume, BaselineSource)> {
    if let Some(v) = opening_dip {
        return Ok((v, BaselineSource::OpeningDip));
    }
    if !has_earlier_readings {
        return Ok((Volume::zero(), BaselineSource::FirstDay));
    }
    if let Some(v) = prior_closing {
        return Ok((v, BaselineSource::PriorClosing));
    }
    Err(CoreError::MissingBaseline {
        tank_id: tank_id.to_string(),
        date,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn test_loss_beyond_tolerance() {
        let inputs = DipInputs {
            opening: Volume::from_litres(8_500),
            receipts: Volume::zero(),
            sales: Volume::from_litres(80),
        };
        let r = reconcile(inputs, Volume::from_litres(8_415), LossRate::from_bps(25));

        assert_eq!(r.expected_closing, Volume::from_litres(8_420));
        assert_eq!(r.variance, Volume::from_litres(-5));
        assert_eq!(r.tolerance, Volume::from_centilitres(20));
        assert_eq!(r.class, VarianceClass::Loss);
    }

    #[test]
    fn test_conservation_includes_receipts() {
        let inputs = DipInputs {
            opening: Volume::from_litres(2_000),
            receipts: Volume::from_litres(5_000),
            sales: Volume::from_centilitres(123_456),
        };
        assert_eq!(
            inputs.expected_closing(),
            Volume::from_centilitres(200_000 + 500_000 - 123_456)
        );
    }

    #[test]
    fn test_classification_boundaries() {
        let tol = Volume::from_centilitres(20);
        assert_eq!(classify(Volume::from_centilitres(-20), tol), VarianceClass::Normal);
        assert_eq!(classify(Volume::from_centilitres(20), tol), VarianceClass::Normal);
        assert_eq!(classify(Volume::from_centilitres(-21), tol), VarianceClass::Loss);
        assert_eq!(classify(Volume::from_centilitres(21), tol), VarianceClass::Gain);
        assert_eq!(classify(Volume::zero(), Volume::zero()), VarianceClass::Normal);
    }

    #[test]
    fn test_gain_is_flagged_not_absorbed() {
        let inputs = DipInputs {
            opening: Volume::from_litres(1_000),
            receipts: Volume::zero(),
            sales: Volume::from_litres(100),
        };
        let r = reconcile(inputs, Volume::from_litres(905), LossRate::from_bps(50));
        assert_eq!(r.variance, Volume::from_litres(5));
        assert_eq!(r.class, VarianceClass::Gain);
    }

    #[test]
    fn test_resolve_opening_order() {
        let v = Volume::from_litres(10);
        assert_eq!(
            resolve_opening("t1", day(), Some(v), None, true).unwrap(),
            (v, BaselineSource::OpeningDip)
        );
        assert_eq!(
            resolve_opening("t1", day(), None, None, false).unwrap(),
            (Volume::zero(), BaselineSource::FirstDay)
        );
        assert_eq!(
            resolve_opening("t1", day(), None, Some(v), true).unwrap(),
            (v, BaselineSource::PriorClosing)
        );
        assert!(matches!(
            resolve_opening("t1", day(), None, None, true),
            Err(CoreError::MissingBaseline { .. })
        ));
    }
}

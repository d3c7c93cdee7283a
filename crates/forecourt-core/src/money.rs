//! # Money Module
//!
//! Provides the `Money` type for sale values and fuel prices.
//!
//! ## Usage
//! ```rust
//! use forecourt_core::{Money, Volume};
//!
//! // Price per litre in cents
//! let price = Money::from_cents(27_990); // 279.90 per litre
//!
//! // 50.00 L dispensed
//! let value = price.for_volume(Volume::from_litres(50));
//! assert_eq!(value.cents(), 1_399_500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

use crate::quantity::Volume;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  FuelType.price_cents ──► MeterReading.unit_price_cents (snapshot)     │
/// │                                  │                                      │
/// │  derived_sales (Volume) ─────────┴──► sale value = price × litres      │
/// │                                                                         │
/// │  Shift summary ──► Σ sale value per fuel type                           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts, only the major unit should be negative.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Value of `volume` at this per-litre price.
    ///
    /// `price (cents/L) × volume (cL) / 100`, rounded half away from zero to
    /// the cent. i128 keeps large meter totals from overflowing.
    ///
    /// ## Example
    /// ```rust
    /// use forecourt_core::{Money, Volume};
    ///
    /// let price = Money::from_cents(333); // 3.33 per litre
    /// // 0.50 L → 1.665 → 1.67
    /// assert_eq!(price.for_volume(Volume::from_centilitres(50)).cents(), 167);
    /// ```
    pub fn for_volume(&self, volume: Volume) -> Money {
        let raw = self.0 as i128 * volume.centilitres() as i128;
        let rounded = if raw >= 0 { (raw + 50) / 100 } else { (raw - 50) / 100 };
        Money(rounded as i64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(279, 90).cents(), 27_990);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(27_990).to_string(), "279.90");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_for_volume_whole_litres() {
        let price = Money::from_cents(25_000);
        assert_eq!(price.for_volume(Volume::from_litres(80)).cents(), 2_000_000);
    }

    #[test]
    fn test_for_volume_rounding() {
        let price = Money::from_cents(333);
        assert_eq!(price.for_volume(Volume::from_centilitres(50)).cents(), 167);
        assert_eq!(price.for_volume(Volume::from_centilitres(1)).cents(), 3);
        assert_eq!(price.for_volume(Volume::zero()), Money::zero());
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_cents(100), Money::from_cents(250)]
            .into_iter()
            .sum();
        assert_eq!(total.cents(), 350);
    }
}

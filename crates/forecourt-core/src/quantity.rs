//! # Physical Quantities
//!
//! Fixed-point types for fuel volumes, loss tolerances, dip depths and
//! cylinder weights.
//!
//! ## Why Integer Centilitres?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE RECONCILIATION PROBLEM                                             │
//! │                                                                         │
//! │  expected = opening + receipts - sales                                  │
//! │                                                                         │
//! │  With floats:   8500.0 - 50.0 - 30.0 might not equal 8420.0 exactly,   │
//! │                 so a perfect day can show a phantom variance.           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Centilitres (1 L = 100 cL)                       │
//! │    850000 - 5000 - 3000 = 842000   (always exact)                      │
//! │                                                                         │
//! │  Meters, dips, capacities and sales all share this unit, so the        │
//! │  conservation identity holds with no implicit unit loss.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Volume
// =============================================================================

/// A fuel volume in centilitres (hundredths of a litre).
///
/// Signed so that variances (actual - expected) can be negative.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Volume(i64);

impl Volume {
    /// Creates a volume from centilitres.
    ///
    /// ## Example
    /// ```rust
    /// use forecourt_core::Volume;
    ///
    /// let v = Volume::from_centilitres(15_050);
    /// assert_eq!(v.to_string(), "150.50 L");
    /// ```
    #[inline]
    pub const fn from_centilitres(cl: i64) -> Self {
        Volume(cl)
    }

    /// Creates a volume from whole litres.
    #[inline]
    pub const fn from_litres(litres: i64) -> Self {
        Volume(litres * 100)
    }

    /// Creates a volume from litres and hundredths (e.g. `100, 25` = 100.25 L).
    ///
    /// For negative volumes only the litre part carries the sign.
    #[inline]
    pub const fn from_litres_hundredths(litres: i64, hundredths: i64) -> Self {
        if litres < 0 {
            Volume(litres * 100 - hundredths)
        } else {
            Volume(litres * 100 + hundredths)
        }
    }

    #[inline]
    pub const fn centilitres(&self) -> i64 {
        self.0
    }

    /// Whole-litre part (truncated toward zero).
    #[inline]
    pub const fn litres(&self) -> i64 {
        self.0 / 100
    }

    #[inline]
    pub const fn zero() -> Self {
        Volume(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Volume(self.0.abs())
    }

    /// Applies a loss rate to this volume, giving the tolerated variance.
    ///
    /// Rounds half away from zero to the nearest centilitre:
    /// `(cl * bps + 5000) / 10000` for non-negative volumes.
    ///
    /// ## Example
    /// ```rust
    /// use forecourt_core::{LossRate, Volume};
    ///
    /// // 0.25% of 80 L = 0.20 L
    /// let tol = Volume::from_litres(80).apply_rate(LossRate::from_bps(25));
    /// assert_eq!(tol.centilitres(), 20);
    /// ```
    pub fn apply_rate(&self, rate: LossRate) -> Volume {
        let raw = self.0 as i128 * rate.bps() as i128;
        let rounded = if raw >= 0 {
            (raw + 5000) / 10000
        } else {
            (raw - 5000) / 10000
        };
        Volume(rounded as i64)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02} L", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Add for Volume {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Volume(self.0 + other.0)
    }
}

impl AddAssign for Volume {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Volume {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Volume(self.0 - other.0)
    }
}

impl SubAssign for Volume {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Volume {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Volume(-self.0)
    }
}

impl Sum for Volume {
    fn sum<I: Iterator<Item = Volume>>(iter: I) -> Self {
        iter.fold(Volume::zero(), Add::add)
    }
}

// =============================================================================
// Loss Rate
// =============================================================================

/// Permissible loss expressed in basis points of dispensed volume.
///
/// 1 bps = 0.01%, so 25 bps = 0.25% (typical evaporation allowance).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct LossRate(u32);

impl LossRate {
    /// Upper bound: 100%.
    pub const MAX_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        LossRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Rate as a percentage (display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        LossRate(0)
    }
}

impl fmt::Display for LossRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Depth
// =============================================================================

/// Raw dip gauge depth in hundredths of a millimetre.
///
/// Converting depth to volume needs the tank's calibration chart, which lives
/// outside this crate; callers supply the calculated volume alongside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Depth(i64);

impl Depth {
    #[inline]
    pub const fn from_hundredths_mm(v: i64) -> Self {
        Depth(v)
    }

    #[inline]
    pub const fn from_mm(mm: i64) -> Self {
        Depth(mm * 100)
    }

    #[inline]
    pub const fn hundredths_mm(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02} mm", self.0 / 100, (self.0 % 100).abs())
    }
}

// =============================================================================
// Weight
// =============================================================================

/// Nominal cylinder weight in grams (a 12 kg cylinder is `12_000`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Weight(i64);

impl Weight {
    #[inline]
    pub const fn from_grams(g: i64) -> Self {
        Weight(g)
    }

    #[inline]
    pub const fn from_kg(kg: i64) -> Self {
        Weight(kg * 1000)
    }

    #[inline]
    pub const fn grams(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{} kg", self.0 / 1000)
        } else {
            write!(f, "{}.{:03} kg", self.0 / 1000, (self.0 % 1000).abs())
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

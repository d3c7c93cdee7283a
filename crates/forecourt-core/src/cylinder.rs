//! # Cylinder Stock Transitions
//!
//! The swap-based cylinder cycle, as pure arithmetic on filled/empty counts.
//!
//! ```text
//!   supplier ──RECEIVE──► [ filled ] ──ISSUE──► customer
//!                                                  │ (hands back an empty)
//!   supplier ◄──RETURN── [ empty  ] ◄──────────────┘
//! ```
//!
//! A transition either applies in full or fails; counts never go negative
//! and are never clamped.

use serde::Serialize;

use crate::error::{CoreError, CoreResult, StockBucket};
use crate::types::CylinderTxType;
use crate::validation::validate_cylinder_quantity;

/// Filled and empty counts for one (branch, cylinder type).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CylinderLevels {
    pub filled: i64,
    pub empty: i64,
}

/// Signed change a transaction applies to each bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDelta {
    pub filled: i64,
    pub empty: i64,
}

impl StockDelta {
    /// Delta for a validated quantity. Availability is not checked here.
    pub fn for_transaction(tx_type: CylinderTxType, quantity: i64) -> Self {
        match tx_type {
            CylinderTxType::Receive => StockDelta {
                filled: quantity,
                empty: 0,
            },
            CylinderTxType::Issue => StockDelta {
                filled: -quantity,
                empty: quantity,
            },
            CylinderTxType::Return => StockDelta {
                filled: 0,
                empty: -quantity,
            },
        }
    }

    /// The bucket this delta draws down, if any.
    pub fn drawn_bucket(&self) -> Option<StockBucket> {
        if self.filled < 0 {
            Some(StockBucket::Filled)
        } else if self.empty < 0 {
            Some(StockBucket::Empty)
        } else {
            None
        }
    }
}

impl CylinderLevels {
    pub fn new(filled: i64, empty: i64) -> Self {
        CylinderLevels { filled, empty }
    }

    /// Count held in one bucket.
    pub fn bucket(&self, bucket: StockBucket) -> i64 {
        match bucket {
            StockBucket::Filled => self.filled,
            StockBucket::Empty => self.empty,
        }
    }

    /// Applies a transaction, returning the new levels and the delta applied.
    ///
    /// ## Example
    /// ```rust
    /// use forecourt_core::cylinder::CylinderLevels;
    /// use forecourt_core::CylinderTxType;
    ///
    /// let (after, _) = CylinderLevels::new(85, 15)
    ///     .apply("12KG", CylinderTxType::Issue, 10)
    ///     .unwrap();
    /// assert_eq!(after, CylinderLevels::new(75, 25));
    /// ```
    pub fn apply(
        &self,
        cylinder_type: &str,
        tx_type: CylinderTxType,
        quantity: i64,
    ) -> CoreResult<(CylinderLevels, StockDelta)> {
        validate_cylinder_quantity(quantity)?;

        let delta = StockDelta::for_transaction(tx_type, quantity);
        if let Some(bucket) = delta.drawn_bucket() {
            let available = self.bucket(bucket);
            if available < quantity {
                return Err(CoreError::InsufficientStock {
                    cylinder_type: cylinder_type.to_string(),
                    bucket,
                    available,
                    requested: quantity,
                });
            }
        }

        let after = CylinderLevels {
            filled: self.filled + delta.filled,
            empty: self.empty + delta.empty,
        };
        Ok((after, delta))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_swaps_filled_for_empty() {
        let start = CylinderLevels::new(85, 15);
        let (after, delta) = start.apply("12KG", CylinderTxType::Issue, 10).unwrap();
        assert_eq!(after, CylinderLevels::new(75, 25));
        assert_eq!(delta, StockDelta { filled: -10, empty: 10 });

        let err = after.apply("12KG", CylinderTxType::Issue, 80).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                bucket: StockBucket::Filled,
                available: 75,
                requested: 80,
                ..
            }
        ));
    }

    #[test]
    fn test_receive_and_return() {
        let (after, _) = CylinderLevels::default()
            .apply("12KG", CylinderTxType::Receive, 40)
            .unwrap();
        assert_eq!(after, CylinderLevels::new(40, 0));

        assert!(matches!(
            after.apply("12KG", CylinderTxType::Return, 1),
            Err(CoreError::InsufficientStock {
                bucket: StockBucket::Empty,
                ..
            })
        ));

        let (after, _) = CylinderLevels::new(0, 5)
            .apply("12KG", CylinderTxType::Return, 5)
            .unwrap();
        assert_eq!(after, CylinderLevels::new(0, 0));
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let levels = CylinderLevels::new(10, 10);
        for qty in [0, -1] {
            assert!(matches!(
                levels.apply("12KG", CylinderTxType::Receive, qty),
                Err(CoreError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_levels_never_negative() {
        let mut levels = CylinderLevels::new(3, 0);
        let script = [
            (CylinderTxType::Issue, 2),
            (CylinderTxType::Issue, 2),
            (CylinderTxType::Return, 3),
            (CylinderTxType::Return, 2),
            (CylinderTxType::Receive, 1),
            (CylinderTxType::Issue, 2),
        ];
        for (tx, qty) in script {
            if let Ok((next, _)) = levels.apply("12KG", tx, qty) {
                levels = next;
            }
            assert!(levels.filled >= 0 && levels.empty >= 0);
        }
        assert_eq!(levels, CylinderLevels::new(0, 2));
    }
}

//! # forecourt-core: Pure Station Logic for Forecourt
//!
//! The rules of the fuel-station ledger as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Forecourt Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Collaborators (UI / HTTP layer)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ DTOs                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 forecourt-api (command layer)                   │   │
//! │  │   get_daily_operations, submit_dip_readings, post_cylinder...   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ forecourt-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌────────────────┐ ┌──────────┐   │   │
//! │  │   │  types   │ │  meter   │ │ reconciliation │ │ cylinder │   │   │
//! │  │   │ quantity │ │  rules   │ │  dip variance  │ │  swaps   │   │   │
//! │  │   └──────────┘ └──────────┘ └────────────────┘ └──────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS • PURE FUNCTIONS       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              forecourt-db (SQLite repositories)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities and enums
//! - [`quantity`] - Fixed-point Volume, LossRate, Depth, Weight
//! - [`money`] - Money in minor units
//! - [`meter`] - Shift ledger rules: monotonicity, completeness, sales lines
//! - [`reconciliation`] - Dip variance and opening-baseline resolution
//! - [`cylinder`] - Filled/empty cylinder transitions
//! - [`validation`] - Field rules
//! - [`error`] - Domain error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use forecourt_core::{LossRate, Money, Volume};
//!
//! let sold = Volume::from_litres(80);
//! let price = Money::from_cents(27_990);
//!
//! assert_eq!(price.for_volume(sold).cents(), 2_239_200);
//! assert_eq!(sold.apply_rate(LossRate::from_bps(25)), Volume::from_centilitres(20));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cylinder;
pub mod error;
pub mod meter;
pub mod money;
pub mod quantity;
pub mod reconciliation;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, MissingReading, StockBucket, ValidationError};
pub use money::Money;
pub use quantity::{Depth, LossRate, Volume, Weight};
pub use reconciliation::{BaselineSource, Reconciliation, VarianceClass};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Name of the shift definition created with every branch.
pub const DEFAULT_SHIFT_NAME: &str = "DAY";

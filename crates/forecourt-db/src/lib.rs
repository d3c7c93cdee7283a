//! # forecourt-db: Database Layer for the Station Ledger
//!
//! SQLite storage for the four ledger components, with sqlx for async
//! access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Forecourt Data Flow                              │
//! │                                                                         │
//! │  forecourt-api command (submit_daily_operations)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  forecourt-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ Registry       │    │ 001_initial  │  │   │
//! │  │   │ SqlitePool    │◄───│ Shift          │    │ 002_cylinders│  │   │
//! │  │   │ WAL + busy    │    │ Dip            │    │              │  │   │
//! │  │   │ timeout       │    │ Cylinder       │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/forecourt/forecourt.db                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per ledger component
//!
//! ## Usage
//!
//! ```rust,ignore
//! use forecourt_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/forecourt.db")).await?;
//!
//! let shift = db.shifts().get_or_create_shift(&branch_id, date).await?;
//! db.shifts().close_shift(&shift.id).await?;
//! let report = db.dips().reconcile(&tank_id, date).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cylinder::{AppliedTransaction, CylinderRepository};
pub use repository::dip::{DipEntry, DipRepository, TankDayReport};
pub use repository::registry::{RegistryRepository, TopologyEntity};
pub use repository::shift::{
    NozzleBaseline, ReadingBatch, ReadingEntry, ShiftCloseReport, ShiftRepository, ShiftSummary,
};

//! # Repository Module
//!
//! One repository per ledger component.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  forecourt-api command                                                  │
//! │       │  db.cylinders().apply_transaction(branch, type, Issue, 2, None) │
//! │       ▼                                                                 │
//! │  CylinderRepository                                                     │
//! │  ├── BEGIN                                                              │
//! │  ├── first statement is a write  ← takes the database write lock       │
//! │  ├── reads see the latest committed state                              │
//! │  ├── forecourt-core rule decides                                       │
//! │  ├── guarded UPDATE (compare-and-swap)                                 │
//! │  └── COMMIT, or drop → ROLLBACK                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Helpers that run inside a transaction take `&mut SqliteConnection` so the
//! same code serves pooled reads and transactional writes.
//!
//! ## Available Repositories
//!
//! - [`RegistryRepository`](registry::RegistryRepository) - Topology
//! - [`ShiftRepository`](shift::ShiftRepository) - Shifts and meter readings
//! - [`DipRepository`](dip::DipRepository) - Dip readings and reconciliation
//! - [`CylinderRepository`](cylinder::CylinderRepository) - Cylinder stock

pub mod cylinder;
pub mod dip;
pub mod registry;
pub mod shift;

use forecourt_core::{
    Branch, Business, CoreError, CylinderType, FuelType, Nozzle, Pump, StorageTank,
    UpsertOutcome,
};
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::DbResult;

/// Generates a new primary key.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fetches one row of `table` by primary key.
pub(crate) async fn fetch_by_id<T>(
    conn: &mut SqliteConnection,
    table: &str,
    id: &str,
) -> DbResult<Option<T>>
where
    T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
{
    let sql = format!("SELECT * FROM {} WHERE id = ?1", table);
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

// =============================================================================
// Soft Delete
// =============================================================================

/// Entities carrying an `is_active` flag.
pub(crate) trait SoftDelete {
    fn is_active(&self) -> bool;
}

macro_rules! soft_delete {
    ($($ty:ty),* $(,)?) => {
        $(impl SoftDelete for $ty {
            fn is_active(&self) -> bool {
                self.is_active
            }
        })*
    };
}

soft_delete!(Business, Branch, FuelType, StorageTank, Pump, Nozzle, CylinderType);

/// Turns a looked-up reference into a usable one: missing or inactive rows
/// are a `Reference` error.
pub(crate) fn require_active<T: SoftDelete>(row: Option<T>, entity: &str, id: &str) -> DbResult<T> {
    match row {
        None => Err(CoreError::reference(entity, id, "not found").into()),
        Some(r) if !r.is_active() => Err(CoreError::inactive(entity, id).into()),
        Some(r) => Ok(r),
    }
}

/// Unwraps a creation outcome, turning `Conflict` into a `Conflict` error.
pub(crate) fn into_created<T>(outcome: UpsertOutcome<T>, entity: &str, scope: &str) -> DbResult<T> {
    match outcome {
        UpsertOutcome::Created(v) | UpsertOutcome::Updated(v) => Ok(v),
        UpsertOutcome::Conflict { field, value, .. } => Err(CoreError::Conflict {
            entity: entity.to_string(),
            field,
            value,
            scope: scope.to_string(),
        }
        .into()),
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

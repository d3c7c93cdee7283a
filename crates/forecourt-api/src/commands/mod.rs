//! # Commands Module
//!
//! All commands exposed to UI and HTTP collaborators.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs               ◄─── You are here (shared helpers)
//! ├── daily_operations.rs  ◄─── Nozzle readings and shift close
//! ├── dip_readings.rs      ◄─── Tank dips and the daily dip sheet
//! ├── cylinder.rs          ◄─── Cylinder stock movements
//! └── registry.rs          ◄─── Price updates and deactivation
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Command Flow                                         │
//! │                                                                         │
//! │  Collaborator                                                           │
//! │  ────────────                                                           │
//! │  POST /daily-operations { branchId, readings: [...], close: true }      │
//! │         │                                                               │
//! │         │ (JSON, camelCase, integer minor units)                        │
//! │         ▼                                                               │
//! │  Rust Backend                                                           │
//! │  ────────────                                                           │
//! │  async fn submit_daily_operations(                                      │
//! │      db: &DbState,                      ◄── Owned by the host           │
//! │      request: SubmitDailyOperations,    ◄── Deserialized payload        │
//! │  ) -> Result<SubmitDailyOperationsResponse, ApiError>                   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Collaborator receives the response DTO or an ApiError                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads accept an optional business date; when omitted, the branch-local
//! calendar date is used.

pub mod cylinder;
pub mod daily_operations;
pub mod dip_readings;
pub mod registry;

use chrono::{NaiveDate, Utc};
use forecourt_core::validation::validate_uuid;
use forecourt_core::{Branch, CoreError};
use forecourt_db::Database;

use crate::error::ApiError;

/// Rejects ids that are not UUIDs before they reach the database.
pub(crate) fn check_id(field: &str, id: &str) -> Result<(), ApiError> {
    validate_uuid(field, id).map_err(|e| ApiError::from(CoreError::Validation(e)))
}

/// Loads a branch or fails with `NOT_FOUND`.
pub(crate) async fn load_branch(db: &Database, branch_id: &str) -> Result<Branch, ApiError> {
    check_id("branch_id", branch_id)?;
    db.registry()
        .get_branch(branch_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Branch", branch_id))
}

/// The requested date, or today at the branch.
pub(crate) fn business_date(branch: &Branch, date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| branch.local_date(Utc::now()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! A one-branch station for command tests.

    use forecourt_core::{
        Branch, CylinderType, FuelType, LossRate, Money, Nozzle, StorageTank, Volume, Weight,
    };
    use forecourt_db::{Database, DbConfig};

    use crate::state::DbState;

    /// Well-formed id that matches no row.
    pub const UNKNOWN_ID: &str = "00000000-0000-4000-8000-000000000000";

    pub struct Site {
        pub db: DbState,
        pub branch: Branch,
        pub pmg: FuelType,
        pub tank: StorageTank,
        pub nozzles: Vec<Nozzle>,
        pub cylinder: CylinderType,
    }

    /// Branch LHR-01 with tank T1 (PMG, 20,000 L) and pump P1 carrying two
    /// nozzles at 1,000 L and 2,000 L.
    pub async fn site() -> Site {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let registry = db.registry();

        let business = registry.create_business("LHR", "Lahore Petroleum").await.unwrap();
        let branch = registry
            .create_branch(&business.id, "LHR-01", "Gulberg", 300)
            .await
            .unwrap();
        let pmg = registry
            .create_fuel_type(
                &business.id,
                "PMG",
                "Premium Motor Gasoline",
                Money::from_cents(27_990),
                LossRate::from_bps(25),
            )
            .await
            .unwrap();
        let tank = registry
            .create_tank(&branch.id, &pmg.id, "T1", Volume::from_litres(20_000))
            .await
            .unwrap();
        let pump = registry.create_pump(&branch.id, "P1", "Island 1").await.unwrap();

        let mut nozzles = Vec::new();
        for i in 1..=2 {
            let nozzle = registry
                .create_nozzle(
                    &pump.id,
                    &i.to_string(),
                    &tank.id,
                    &pmg.id,
                    Volume::from_litres(1_000 * i as i64),
                )
                .await
                .unwrap();
            nozzles.push(nozzle);
        }

        let cylinder = registry
            .create_cylinder_type(&business.id, "12KG", "Domestic 11.8 kg", Weight::from_kg(12))
            .await
            .unwrap();

        Site {
            db: DbState::new(db),
            branch,
            pmg,
            tank,
            nozzles,
            cylinder,
        }
    }
}

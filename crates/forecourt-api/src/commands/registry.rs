//! # Registry Commands
//!
//! Back-office changes to the station network: fuel prices and soft
//! deactivation. Creation of the topology happens through seeding or
//! provisioning tools talking to [`forecourt_db::RegistryRepository`].

use chrono::{DateTime, Utc};
use forecourt_core::{FuelType, Money};
use forecourt_db::TopologyEntity;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;

use super::check_id;
use crate::error::ApiError;
use crate::state::DbState;

/// Fuel type as shown on the price board.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FuelPriceDto {
    pub fuel_type_id: String,
    pub code: String,
    pub name: String,
    pub price: Money,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl From<FuelType> for FuelPriceDto {
    fn from(f: FuelType) -> Self {
        FuelPriceDto {
            fuel_type_id: f.id,
            code: f.code,
            name: f.name,
            price: f.price,
            updated_at: f.updated_at,
        }
    }
}

/// Sets the current price of a fuel type.
///
/// Open shifts pick the new price up at close; closed shifts keep their
/// snapshot.
pub async fn update_fuel_price(
    db: &DbState,
    fuel_type_id: String,
    price: Money,
) -> Result<FuelPriceDto, ApiError> {
    debug!(fuel_type_id = %fuel_type_id, %price, "update_fuel_price command");
    check_id("fuel_type_id", &fuel_type_id)?;

    let fuel = db.inner().registry().update_fuel_price(&fuel_type_id, price).await?;

    info!(fuel_type_id = %fuel.id, code = %fuel.code, %price, "Fuel price updated via command");
    Ok(FuelPriceDto::from(fuel))
}

/// Soft-deactivates a topology entity. Its history stays readable.
pub async fn deactivate_entity(
    db: &DbState,
    entity: TopologyEntity,
    id: String,
) -> Result<(), ApiError> {
    debug!(entity = entity.label(), id = %id, "deactivate_entity command");
    check_id("id", &id)?;

    db.inner().registry().deactivate(entity, &id).await?;

    info!(entity = entity.label(), id = %id, "Entity deactivated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::daily_operations::{
        get_daily_operations, submit_daily_operations, NozzleReadingInput, SubmitDailyOperations,
    };
    use crate::commands::fixtures::{site, UNKNOWN_ID};
    use crate::error::ErrorCode;
    use chrono::NaiveDate;
    use forecourt_core::Volume;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn test_price_change_after_close_keeps_snapshot() {
        let site = site().await;

        submit_daily_operations(
            &site.db,
            SubmitDailyOperations {
                branch_id: site.branch.id.clone(),
                date: Some(day()),
                readings: site
                    .nozzles
                    .iter()
                    .map(|n| NozzleReadingInput {
                        nozzle_id: n.id.clone(),
                        opening: None,
                        closing: Some(n.current_meter_reading + Volume::from_litres(10)),
                    })
                    .collect(),
                close: true,
            },
        )
        .await
        .unwrap();

        let dto = update_fuel_price(&site.db, site.pmg.id.clone(), Money::from_cents(30_000))
            .await
            .unwrap();
        assert_eq!(dto.price, Money::from_cents(30_000));
        assert_eq!(dto.code, "PMG");

        let sheet = get_daily_operations(&site.db, site.branch.id.clone(), Some(day()))
            .await
            .unwrap();
        assert_eq!(sheet.nozzles[0].price_per_unit, Money::from_cents(27_990));

        // next day still open, so it shows the new price
        let next = get_daily_operations(&site.db, site.branch.id.clone(), day().succ_opt())
            .await
            .unwrap();
        assert_eq!(next.nozzles[0].price_per_unit, Money::from_cents(30_000));
    }

    #[tokio::test]
    async fn test_deactivated_nozzle_leaves_sheet() {
        let site = site().await;

        deactivate_entity(&site.db, TopologyEntity::Nozzle, site.nozzles[1].id.clone())
            .await
            .unwrap();

        let sheet = get_daily_operations(&site.db, site.branch.id.clone(), Some(day()))
            .await
            .unwrap();
        assert_eq!(sheet.nozzles.len(), 1);

        let err = deactivate_entity(&site.db, TopologyEntity::Pump, UNKNOWN_ID.to_string())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = update_fuel_price(&site.db, site.pmg.id.clone(), Money::from_cents(-1))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}

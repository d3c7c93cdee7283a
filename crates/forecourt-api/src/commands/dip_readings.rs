//! # Dip Reading Commands
//!
//! Tank dip entry and the per-tank daily dip sheet.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Tank T1 (PMG)     opening 10,000.00   receipts 0   sales 500.00        │
//! │                    expected 9,500.00   closing dip 9,480.00             │
//! │                    variance -20.00     tolerance 1.25    ► LOSS         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use forecourt_core::{Depth, DipReading, DipReadingType, Volume};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;

use super::{business_date, check_id, load_branch};
use crate::error::ApiError;
use crate::state::DbState;
use forecourt_db::{DipEntry, TankDayReport};

/// One gauge entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DipReadingInput {
    pub tank_id: String,
    pub reading_type: DipReadingType,
    pub dip_depth: Depth,
    /// Stock read off the tank's calibration chart; for RECEIPT, the
    /// delivered volume.
    pub calculated_stock: Volume,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SubmitDipReadings {
    pub branch_id: String,
    #[ts(as = "Option<String>")]
    pub date: Option<NaiveDate>,
    pub readings: Vec<DipReadingInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SubmitDipReadingsResponse {
    #[ts(as = "String")]
    pub business_date: NaiveDate,
    pub readings: Vec<DipReading>,
}

/// Daily dip sheet of a branch: every active tank with its reconciliation.
pub async fn get_dip_readings(
    db: &DbState,
    branch_id: String,
    date: Option<NaiveDate>,
) -> Result<Vec<TankDayReport>, ApiError> {
    debug!(branch_id = %branch_id, ?date, "get_dip_readings command");
    let db = db.inner();

    let branch = load_branch(db, &branch_id).await?;
    let reading_date = business_date(&branch, date);

    let sheet = db.dips().daily_dip_sheet(&branch.id, reading_date).await?;
    debug!(tanks = sheet.len(), %reading_date, "get_dip_readings complete");
    Ok(sheet)
}

/// Records or overwrites dips for tanks of one branch.
///
/// Every tank must belong to the branch. The batch commits as a whole: a
/// failing entry leaves every reading and tank stock untouched.
pub async fn submit_dip_readings(
    db: &DbState,
    request: SubmitDipReadings,
) -> Result<SubmitDipReadingsResponse, ApiError> {
    debug!(
        branch_id = %request.branch_id,
        readings = request.readings.len(),
        "submit_dip_readings command"
    );
    let db = db.inner();

    let branch = load_branch(db, &request.branch_id).await?;
    let reading_date = business_date(&branch, request.date);

    let mut entries = Vec::with_capacity(request.readings.len());
    for input in &request.readings {
        check_id("tank_id", &input.tank_id)?;
        entries.push(DipEntry {
            tank_id: input.tank_id.clone(),
            reading_type: input.reading_type,
            dip_depth: input.dip_depth,
            calculated_stock: input.calculated_stock,
        });
    }

    let stored = db.dips().record_dips(&branch.id, reading_date, &entries).await?;

    info!(branch_id = %branch.id, %reading_date, count = stored.len(), "Dip readings stored");

    Ok(SubmitDipReadingsResponse {
        business_date: reading_date,
        readings: stored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::site;
    use crate::error::ErrorCode;
    use forecourt_core::{BaselineSource, VarianceClass};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn dip(tank_id: &str, reading_type: DipReadingType, litres: i64) -> DipReadingInput {
        DipReadingInput {
            tank_id: tank_id.to_string(),
            reading_type,
            dip_depth: Depth::from_mm(1_500),
            calculated_stock: Volume::from_litres(litres),
        }
    }

    #[tokio::test]
    async fn test_submit_and_read_sheet() {
        let site = site().await;

        let response = submit_dip_readings(
            &site.db,
            SubmitDipReadings {
                branch_id: site.branch.id.clone(),
                date: Some(day()),
                readings: vec![
                    dip(&site.tank.id, DipReadingType::Opening, 10_000),
                    dip(&site.tank.id, DipReadingType::Closing, 10_000),
                ],
            },
        )
        .await
        .unwrap();
        assert_eq!(response.business_date, day());
        assert_eq!(response.readings.len(), 2);

        let sheet = get_dip_readings(&site.db, site.branch.id.clone(), Some(day()))
            .await
            .unwrap();
        assert_eq!(sheet.len(), 1);

        let tank = &sheet[0];
        assert_eq!(tank.opening, Some(Volume::from_litres(10_000)));
        assert_eq!(tank.opening_source, Some(BaselineSource::OpeningDip));
        assert_eq!(tank.current_stock, Volume::from_litres(10_000));

        let rec = tank.reconciliation.as_ref().unwrap();
        assert_eq!(rec.variance, Volume::zero());
        assert_eq!(rec.class, VarianceClass::Normal);
    }

    #[tokio::test]
    async fn test_sheet_without_baseline_lists_tank() {
        let site = site().await;

        // closing two days back, none for the prior day
        let earlier = day().pred_opt().unwrap().pred_opt().unwrap();
        submit_dip_readings(
            &site.db,
            SubmitDipReadings {
                branch_id: site.branch.id.clone(),
                date: Some(earlier),
                readings: vec![dip(&site.tank.id, DipReadingType::Closing, 7_000)],
            },
        )
        .await
        .unwrap();

        let sheet = get_dip_readings(&site.db, site.branch.id.clone(), Some(day()))
            .await
            .unwrap();
        assert_eq!(sheet.len(), 1);
        assert!(sheet[0].opening.is_none());
        assert!(sheet[0].reconciliation.is_none());
    }

    #[tokio::test]
    async fn test_rejects_foreign_tank_and_bad_stock() {
        let site = site().await;
        let registry = site.db.inner().registry();

        let other = registry
            .create_branch(&site.branch.business_id, "LHR-02", "DHA", 300)
            .await
            .unwrap();
        let foreign = registry
            .create_tank(&other.id, &site.pmg.id, "T1", Volume::from_litres(5_000))
            .await
            .unwrap();

        let err = submit_dip_readings(
            &site.db,
            SubmitDipReadings {
                branch_id: site.branch.id.clone(),
                date: Some(day()),
                readings: vec![dip(&foreign.id, DipReadingType::Opening, 1_000)],
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ReferenceError);

        let err = submit_dip_readings(
            &site.db,
            SubmitDipReadings {
                branch_id: site.branch.id.clone(),
                date: Some(day()),
                readings: vec![dip(&site.tank.id, DipReadingType::Closing, 25_000)],
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_failing_dip_rolls_back_batch() {
        let site = site().await;

        let err = submit_dip_readings(
            &site.db,
            SubmitDipReadings {
                branch_id: site.branch.id.clone(),
                date: Some(day()),
                readings: vec![
                    dip(&site.tank.id, DipReadingType::Closing, 9_000),
                    dip(&site.tank.id, DipReadingType::Opening, 25_000),
                ],
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let sheet = get_dip_readings(&site.db, site.branch.id.clone(), Some(day()))
            .await
            .unwrap();
        assert!(sheet[0].closing_dip.is_none());
        assert_eq!(sheet[0].current_stock, site.tank.current_stock);
    }
}

//! # Daily Operations Commands
//!
//! Nozzle meter entry and shift close for one branch and business date.
//!
//! ## Cashier Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    End of Day at the Forecourt                          │
//! │                                                                         │
//! │  get_daily_operations(branch, today)                                   │
//! │       │   shift created lazily, openings default to nozzle baselines    │
//! │       ▼                                                                 │
//! │  ┌────────────────────────────────────────────────────────────┐        │
//! │  │ P1 / 1  PMG  279.90   opening 1000.00   closing [ 1080.00 ]│        │
//! │  │ P1 / 2  PMG  279.90   opening 2000.00   closing [ 2015.50 ]│        │
//! │  └────────────────────────────────────────────────────────────┘        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  submit_daily_operations({ readings, close: true })                    │
//! │       │   readings and close in one transaction                         │
//! │       ▼                                                                 │
//! │  baselines advanced to the closing values                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use forecourt_core::{FuelType, Money, ReadingType, ShiftStatus, Volume};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use ts_rs::TS;

use super::{business_date, check_id, load_branch};
use crate::error::ApiError;
use crate::state::DbState;
use forecourt_db::{NozzleBaseline, ReadingEntry, ShiftSummary};

/// One row of the daily operations sheet.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NozzleSheetRow {
    pub nozzle_id: String,
    pub nozzle_number: String,
    pub pump_number: String,
    pub pump_label: String,
    pub fuel_type_id: String,
    /// Fuel type code, e.g. "PMG".
    pub fuel_type: String,
    pub tank_id: String,
    /// Snapshot price once the shift is closed, current price before.
    pub price_per_unit: Money,
    /// Recorded OPENING, or the nozzle baseline when none is recorded yet.
    pub opening: Volume,
    pub opening_recorded: bool,
    pub closing: Option<Volume>,
    pub sales: Option<Volume>,
}

/// Daily operations sheet of a branch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DailyOperations {
    pub shift_id: String,
    pub branch_id: String,
    #[ts(as = "String")]
    pub business_date: NaiveDate,
    pub status: ShiftStatus,
    pub nozzles: Vec<NozzleSheetRow>,
}

/// Meter values entered for one nozzle.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NozzleReadingInput {
    pub nozzle_id: String,
    pub opening: Option<Volume>,
    pub closing: Option<Volume>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SubmitDailyOperations {
    pub branch_id: String,
    #[ts(as = "Option<String>")]
    pub date: Option<NaiveDate>,
    pub readings: Vec<NozzleReadingInput>,
    /// Close the shift after the readings are stored.
    #[serde(default)]
    pub close: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitDailyOperationsResponse {
    pub shift_id: String,
    /// Number of meter readings written.
    pub recorded: usize,
    pub closed: bool,
    /// Baselines moved by the close; empty when the shift stays open.
    pub baselines: Vec<NozzleBaseline>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseShiftResponse {
    pub shift_id: String,
    pub status: ShiftStatus,
    pub baselines: Vec<NozzleBaseline>,
}

/// Gets (and lazily opens) the branch's shift with every active nozzle.
///
/// ## Arguments
/// * `branch_id` - Branch UUID
/// * `date` - Business date (default: today at the branch)
pub async fn get_daily_operations(
    db: &DbState,
    branch_id: String,
    date: Option<NaiveDate>,
) -> Result<DailyOperations, ApiError> {
    debug!(branch_id = %branch_id, ?date, "get_daily_operations command");
    let db = db.inner();

    let branch = load_branch(db, &branch_id).await?;
    let business_date = business_date(&branch, date);
    let shift = db.shifts().get_or_create_shift(&branch.id, business_date).await?;

    let registry = db.registry();
    let pumps: HashMap<String, (String, String)> = registry
        .list_active_pumps(&branch.id)
        .await?
        .into_iter()
        .map(|p| (p.id, (p.pump_number, p.label)))
        .collect();

    let mut readings: HashMap<(String, ReadingType), (Volume, Option<Money>)> = HashMap::new();
    for r in db.shifts().readings(&shift.id).await? {
        readings.insert((r.nozzle_id, r.reading_type), (r.reading_value, r.unit_price));
    }

    let mut fuel_types: BTreeMap<String, FuelType> = BTreeMap::new();
    let mut rows = Vec::new();
    for nozzle in registry.list_active_nozzles(&branch.id).await? {
        if !fuel_types.contains_key(&nozzle.fuel_type_id) {
            let fuel = registry
                .get_fuel_type(&nozzle.fuel_type_id)
                .await?
                .ok_or_else(|| ApiError::not_found("FuelType", &nozzle.fuel_type_id))?;
            fuel_types.insert(fuel.id.clone(), fuel);
        }
        let fuel = &fuel_types[&nozzle.fuel_type_id];

        let (pump_number, pump_label) = pumps.get(&nozzle.pump_id).cloned().unwrap_or_default();

        let opening = readings.get(&(nozzle.id.clone(), ReadingType::Opening));
        let closing = readings.get(&(nozzle.id.clone(), ReadingType::Closing));

        let opening_value = opening.map_or(nozzle.current_meter_reading, |(v, _)| *v);
        let closing_value = closing.map(|(v, _)| *v);
        let price = closing.and_then(|(_, p)| *p).unwrap_or(fuel.price);

        rows.push(NozzleSheetRow {
            nozzle_id: nozzle.id.clone(),
            nozzle_number: nozzle.nozzle_number.clone(),
            pump_number,
            pump_label,
            fuel_type_id: fuel.id.clone(),
            fuel_type: fuel.code.clone(),
            tank_id: nozzle.tank_id.clone(),
            price_per_unit: price,
            opening: opening_value,
            opening_recorded: opening.is_some(),
            closing: closing_value,
            sales: match (opening, closing_value) {
                (Some(_), Some(c)) => Some(c - opening_value),
                _ => None,
            },
        });
    }

    Ok(DailyOperations {
        shift_id: shift.id,
        branch_id: branch.id,
        business_date,
        status: shift.status,
        nozzles: rows,
    })
}

/// Stores the entered meter values and optionally closes the shift.
///
/// The readings and the close commit together: any failing reading, or a
/// close with nozzles still missing (`INCOMPLETE_SHIFT`, listed in
/// `details`), leaves the shift exactly as it was.
pub async fn submit_daily_operations(
    db: &DbState,
    request: SubmitDailyOperations,
) -> Result<SubmitDailyOperationsResponse, ApiError> {
    debug!(
        branch_id = %request.branch_id,
        readings = request.readings.len(),
        close = request.close,
        "submit_daily_operations command"
    );
    let db = db.inner();

    let branch = load_branch(db, &request.branch_id).await?;
    let business_date = business_date(&branch, request.date);

    let mut entries = Vec::with_capacity(request.readings.len() * 2);
    for input in &request.readings {
        check_id("nozzle_id", &input.nozzle_id)?;
        if input.opening.is_none() && input.closing.is_none() {
            return Err(ApiError::validation(format!(
                "Nozzle {} has neither an opening nor a closing value",
                input.nozzle_id
            )));
        }
        let values = [
            (ReadingType::Opening, input.opening),
            (ReadingType::Closing, input.closing),
        ];
        for (reading_type, value) in values {
            if value.is_some() {
                entries.push(ReadingEntry {
                    nozzle_id: input.nozzle_id.clone(),
                    reading_type,
                    value,
                });
            }
        }
    }

    let shift = db.shifts().get_or_create_shift(&branch.id, business_date).await?;
    let batch = db
        .shifts()
        .record_readings(&shift.id, &entries, request.close)
        .await?;
    let recorded = batch.readings.len();

    info!(
        shift_id = %shift.id,
        recorded,
        closed = request.close,
        "submit_daily_operations complete"
    );

    Ok(SubmitDailyOperationsResponse {
        shift_id: shift.id,
        recorded,
        closed: batch.close.is_some(),
        baselines: batch.close.map(|r| r.baselines).unwrap_or_default(),
    })
}

/// Closes a shift and returns the advanced nozzle baselines.
pub async fn close_daily_operations(
    db: &DbState,
    shift_id: String,
) -> Result<CloseShiftResponse, ApiError> {
    debug!(shift_id = %shift_id, "close_daily_operations command");
    check_id("shift_id", &shift_id)?;

    let report = db.inner().shifts().close_shift(&shift_id).await?;

    info!(shift_id = %shift_id, nozzles = report.baselines.len(), "Shift closed via command");

    Ok(CloseShiftResponse {
        shift_id: report.shift.id,
        status: report.shift.status,
        baselines: report.baselines,
    })
}

/// Sales lines and fuel totals of a shift.
pub async fn get_shift_summary(db: &DbState, shift_id: String) -> Result<ShiftSummary, ApiError> {
    debug!(shift_id = %shift_id, "get_shift_summary command");
    check_id("shift_id", &shift_id)?;
    Ok(db.inner().shifts().shift_summary(&shift_id).await?)
}

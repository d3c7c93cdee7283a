//! # Shift Repository
//!
//! Shift lifecycle and nozzle meter readings.
//!
//! ## Shift Lifecycle
//! ```text
//! get_or_create_shift(branch, date)
//!      │  INSERT … ON CONFLICT DO NOTHING, then SELECT
//!      ▼
//!  ┌────────┐   record_reading (last write wins)
//!  │  OPEN  │◄──────────────────────────────┐
//!  └───┬────┘───────────────────────────────┘
//!      │ close_shift: all active nozzles have OPENING + CLOSING
//!      ▼
//!  ┌────────┐   closing rows stamped with the current price
//!  │ CLOSED │   nozzle baselines advanced to the closing values
//!  └────────┘   no further writes
//! ```
//!
//! ## Meter Monotonicity
//! ```text
//! baseline ≤ OPENING ≤ CLOSING ≤ next shift's OPENING ...
//! ```
//! The nozzle's `current_meter_reading` is the baseline and only a close
//! moves it.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Utc};
use forecourt_core::meter::{
    self, check_closing, check_opening, missing_readings, pair_readings, totals_by_fuel, FuelTotal,
    ReadingPair, SalesLine,
};
use forecourt_core::{
    Branch, CoreError, FuelType, MeterReading, Money, Nozzle, Pump, ReadingType, ShiftInstance,
    ShiftStatus, StorageTank, UpsertOutcome, ValidationError, Volume,
};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::registry::{
    active_nozzles, branch_nozzles, default_shift_definition, BRANCHES, FUEL_TYPES, NOZZLES,
    PUMPS, STORAGE_TANKS,
};
use super::{fetch_by_id, new_id, require_active};
use crate::error::{DbError, DbResult};

pub(crate) const SHIFT_INSTANCES: &str = "shift_instances";

/// A nozzle baseline moved by a shift close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NozzleBaseline {
    pub nozzle_id: String,
    pub nozzle_number: String,
    pub previous: Volume,
    pub current: Volume,
}

/// Result of a successful shift close.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftCloseReport {
    pub shift: ShiftInstance,
    pub baselines: Vec<NozzleBaseline>,
}

/// One meter value of a reading batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingEntry {
    pub nozzle_id: String,
    pub reading_type: ReadingType,
    /// `None` lets an OPENING default to the nozzle baseline.
    pub value: Option<Volume>,
}

/// Readings written by a batch, and the close report when it closed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingBatch {
    pub readings: Vec<MeterReading>,
    pub close: Option<ShiftCloseReport>,
}

/// Per-nozzle sales lines and per-fuel totals of one shift.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftSummary {
    pub shift: ShiftInstance,
    pub lines: Vec<SalesLine>,
    pub totals: Vec<FuelTotal>,
}

/// Repository for shift ledger operations.
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    /// Returns the branch's shift for a business date, creating it on first
    /// use. Concurrent callers all get the same row.
    pub async fn get_or_create_shift(
        &self,
        branch_id: &str,
        business_date: NaiveDate,
    ) -> DbResult<ShiftInstance> {
        let mut conn = self.pool.acquire().await?;

        require_active(
            fetch_by_id::<Branch>(&mut *conn, BRANCHES, branch_id).await?,
            "Branch",
            branch_id,
        )?;
        let definition = default_shift_definition(&mut *conn, branch_id)
            .await?
            .ok_or_else(|| {
                CoreError::reference("Branch", branch_id, "has no default shift definition")
            })?;

        let result = sqlx::query(
            r#"
            INSERT INTO shift_instances (
                id, branch_id, shift_definition_id, business_date, status, opened_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (shift_definition_id, business_date) DO NOTHING
            "#,
        )
        .bind(new_id())
        .bind(branch_id)
        .bind(&definition.id)
        .bind(business_date)
        .bind(ShiftStatus::Open)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        let shift = sqlx::query_as::<_, ShiftInstance>(
            r#"
            SELECT * FROM shift_instances
            WHERE shift_definition_id = ?1 AND business_date = ?2
            "#,
        )
        .bind(&definition.id)
        .bind(business_date)
        .fetch_one(&mut *conn)
        .await?;

        if result.rows_affected() == 1 {
            info!(
                shift_id = %shift.id,
                branch_id = %branch_id,
                business_date = %business_date,
                "Shift opened"
            );
        }

        Ok(shift)
    }

    pub async fn get_shift(&self, shift_id: &str) -> DbResult<Option<ShiftInstance>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut *conn, SHIFT_INSTANCES, shift_id).await
    }

    /// All readings of a shift.
    pub async fn readings(&self, shift_id: &str) -> DbResult<Vec<MeterReading>> {
        let mut conn = self.pool.acquire().await?;
        shift_readings(&mut conn, shift_id).await
    }

    /// Records or overwrites a meter reading while the shift is open.
    ///
    /// ## Rules
    /// - OPENING defaults to the nozzle baseline and may not go below it
    /// - OPENING may not be moved above an existing CLOSING
    /// - CLOSING requires a value and may not go below the OPENING
    /// - CLOSING without an OPENING records the baseline as the OPENING
    /// - the nozzle, its pump, tank, fuel type and the branch must be active
    pub async fn record_reading(
        &self,
        shift_id: &str,
        nozzle_id: &str,
        reading_type: ReadingType,
        value: Option<Volume>,
    ) -> DbResult<UpsertOutcome<MeterReading>> {
        debug!(shift_id = %shift_id, nozzle_id = %nozzle_id, ?reading_type, "Recording meter reading");

        let mut tx = self.pool.begin().await?;
        let shift = lock_open_shift(&mut tx, shift_id).await?;
        let outcome = write_reading(&mut tx, &shift, nozzle_id, reading_type, value).await?;
        tx.commit().await?;

        Ok(outcome)
    }

    /// Records a batch of readings and optionally closes the shift, all in
    /// one transaction. The first failing entry rolls back the whole batch.
    pub async fn record_readings(
        &self,
        shift_id: &str,
        entries: &[ReadingEntry],
        close: bool,
    ) -> DbResult<ReadingBatch> {
        debug!(shift_id = %shift_id, entries = entries.len(), close, "Recording reading batch");

        let mut tx = self.pool.begin().await?;
        let shift = lock_open_shift(&mut tx, shift_id).await?;

        let mut readings = Vec::with_capacity(entries.len());
        for entry in entries {
            let outcome = write_reading(
                &mut tx,
                &shift,
                &entry.nozzle_id,
                entry.reading_type,
                entry.value,
            )
            .await?;
            if let Some(reading) = outcome.into_value() {
                readings.push(reading);
            }
        }

        let report = if close {
            Some(close_open_shift(&mut tx, shift_id).await?)
        } else {
            None
        };

        tx.commit().await?;

        if let Some(report) = &report {
            log_closed(report);
        }
        info!(shift_id = %shift_id, recorded = readings.len(), closed = close, "Reading batch stored");

        Ok(ReadingBatch {
            readings,
            close: report,
        })
    }

    /// Closing minus opening for one nozzle, once both are recorded.
    pub async fn derived_sales(&self, shift_id: &str, nozzle_id: &str) -> DbResult<Option<Volume>> {
        let mut conn = self.pool.acquire().await?;
        Ok(nozzle_pair(&mut conn, shift_id, nozzle_id).await?.sales())
    }

    /// Value of one nozzle's sales: the closing snapshot price once the
    /// shift is closed, the fuel type's current price before that.
    pub async fn sale_value(&self, shift_id: &str, nozzle_id: &str) -> DbResult<Option<Money>> {
        let mut conn = self.pool.acquire().await?;

        let nozzle = fetch_by_id::<Nozzle>(&mut *conn, NOZZLES, nozzle_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Nozzle", nozzle_id))?;
        let current_price: Money = sqlx::query_scalar("SELECT price FROM fuel_types WHERE id = ?1")
            .bind(&nozzle.fuel_type_id)
            .fetch_one(&mut *conn)
            .await?;

        let pair = nozzle_pair(&mut conn, shift_id, nozzle_id).await?;
        Ok(SalesLine::from_pair(&nozzle, &pair, current_price).map(|line| line.value))
    }

    /// Closes a shift.
    ///
    /// ## What This Does (one transaction)
    /// 1. Flips the status `open → closed` (fails if already closed)
    /// 2. Checks every active nozzle has OPENING and CLOSING
    /// 3. Stamps closing rows with the fuel type's current price
    /// 4. Advances each nozzle baseline to its closing value, guarded by
    ///    `current_meter_reading <= opening`
    ///
    /// Any failure rolls back all four steps. The guard rejects a shift whose
    /// OPENING was taken from a baseline that another close has since moved.
    pub async fn close_shift(&self, shift_id: &str) -> DbResult<ShiftCloseReport> {
        debug!(shift_id = %shift_id, "Closing shift");

        let mut tx = self.pool.begin().await?;
        let report = close_open_shift(&mut tx, shift_id).await?;
        tx.commit().await?;

        log_closed(&report);
        Ok(report)
    }

    /// Sales lines for every nozzle with both readings, plus fuel totals.
    pub async fn shift_summary(&self, shift_id: &str) -> DbResult<ShiftSummary> {
        let mut conn = self.pool.acquire().await?;

        let shift = fetch_by_id::<ShiftInstance>(&mut *conn, SHIFT_INSTANCES, shift_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Shift", shift_id))?;
        let readings = shift_readings(&mut conn, shift_id).await?;
        let nozzles = branch_nozzles(&mut conn, &shift.branch_id).await?;
        let prices = current_prices(&mut conn, &shift.branch_id).await?;

        let pairs = pair_readings(&readings);
        let lines: Vec<SalesLine> = nozzles
            .iter()
            .filter_map(|nozzle| {
                let pair = pairs.get(&nozzle.id)?;
                let price = prices.get(&nozzle.fuel_type_id).copied()?;
                SalesLine::from_pair(nozzle, pair, price)
            })
            .collect();
        let totals = totals_by_fuel(&lines);

        Ok(ShiftSummary {
            shift,
            lines,
            totals,
        })
    }

    /// Derived sales per tank over every shift of the branch's business
    /// date. Nozzles missing either reading contribute nothing.
    pub async fn sales_by_tank(
        &self,
        branch_id: &str,
        business_date: NaiveDate,
    ) -> DbResult<BTreeMap<String, Volume>> {
        let mut conn = self.pool.acquire().await?;
        branch_tank_sales(&mut conn, branch_id, business_date).await
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Takes the write lock on an open shift of an active branch and returns it.
async fn lock_open_shift(conn: &mut SqliteConnection, shift_id: &str) -> DbResult<ShiftInstance> {
    let result = sqlx::query(
        "UPDATE shift_instances SET status = status WHERE id = ?1 AND status = 'open'",
    )
    .bind(shift_id)
    .execute(&mut *conn)
    .await?;

    let shift = fetch_by_id::<ShiftInstance>(&mut *conn, SHIFT_INSTANCES, shift_id).await?;
    if result.rows_affected() == 0 {
        return Err(not_open(shift, shift_id));
    }
    let shift = shift.ok_or_else(|| CoreError::not_found("Shift", shift_id))?;

    require_active(
        fetch_by_id::<Branch>(&mut *conn, BRANCHES, &shift.branch_id).await?,
        "Branch",
        &shift.branch_id,
    )?;
    Ok(shift)
}

/// Error for a shift that could not be locked as open.
fn not_open(shift: Option<ShiftInstance>, shift_id: &str) -> DbError {
    match shift {
        None => CoreError::not_found("Shift", shift_id).into(),
        Some(shift) => match meter::ensure_open(&shift) {
            Err(e) => e.into(),
            Ok(()) => DbError::Internal(format!("shift {} open but not lockable", shift_id)),
        },
    }
}

/// Writes one reading into a locked open shift.
async fn write_reading(
    conn: &mut SqliteConnection,
    shift: &ShiftInstance,
    nozzle_id: &str,
    reading_type: ReadingType,
    value: Option<Volume>,
) -> DbResult<UpsertOutcome<MeterReading>> {
    let nozzle = require_active(
        fetch_by_id::<Nozzle>(&mut *conn, NOZZLES, nozzle_id).await?,
        "Nozzle",
        nozzle_id,
    )?;
    let pump = require_active(
        fetch_by_id::<Pump>(&mut *conn, PUMPS, &nozzle.pump_id).await?,
        "Pump",
        &nozzle.pump_id,
    )?;
    if pump.branch_id != shift.branch_id {
        return Err(CoreError::reference("Nozzle", nozzle_id, "belongs to another branch").into());
    }
    require_active(
        fetch_by_id::<StorageTank>(&mut *conn, STORAGE_TANKS, &nozzle.tank_id).await?,
        "StorageTank",
        &nozzle.tank_id,
    )?;
    require_active(
        fetch_by_id::<FuelType>(&mut *conn, FUEL_TYPES, &nozzle.fuel_type_id).await?,
        "FuelType",
        &nozzle.fuel_type_id,
    )?;

    let pair = nozzle_pair(&mut *conn, &shift.id, nozzle_id).await?;
    let baseline = nozzle.current_meter_reading;

    let (reading, existed) = match reading_type {
        ReadingType::Opening => {
            let opening = meter::resolve_opening(baseline, value);
            check_opening(nozzle_id, baseline, opening, pair.closing)?;
            let reading =
                upsert_reading(&mut *conn, &shift.id, nozzle_id, ReadingType::Opening, opening)
                    .await?;
            (reading, pair.opening.is_some())
        }
        ReadingType::Closing => {
            let closing = value.ok_or_else(|| ValidationError::Required {
                field: "reading_value".to_string(),
            })?;
            let opening = pair.opening.unwrap_or(baseline);
            check_closing(nozzle_id, opening, closing)?;

            if pair.opening.is_none() {
                upsert_reading(&mut *conn, &shift.id, nozzle_id, ReadingType::Opening, baseline)
                    .await?;
            }
            let reading =
                upsert_reading(&mut *conn, &shift.id, nozzle_id, ReadingType::Closing, closing)
                    .await?;
            (reading, pair.closing.is_some())
        }
    };

    debug!(
        shift_id = %shift.id,
        nozzle_id = %nozzle_id,
        value = %reading.reading_value,
        overwritten = existed,
        "Meter reading written"
    );

    Ok(if existed {
        UpsertOutcome::Updated(reading)
    } else {
        UpsertOutcome::Created(reading)
    })
}

/// Closes an open shift inside the caller's transaction.
async fn close_open_shift(conn: &mut SqliteConnection, shift_id: &str) -> DbResult<ShiftCloseReport> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE shift_instances SET status = 'closed', closed_at = ?2
        WHERE id = ?1 AND status = 'open'
        "#,
    )
    .bind(shift_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let shift = fetch_by_id::<ShiftInstance>(&mut *conn, SHIFT_INSTANCES, shift_id).await?;
    if result.rows_affected() == 0 {
        return Err(not_open(shift, shift_id));
    }
    let shift = shift.ok_or_else(|| CoreError::not_found("Shift", shift_id))?;

    let nozzles = active_nozzles(&mut *conn, &shift.branch_id).await?;
    let readings = shift_readings(&mut *conn, shift_id).await?;

    let missing = missing_readings(&nozzles, &readings);
    if !missing.is_empty() {
        warn!(shift_id = %shift_id, missing = missing.len(), "Shift close rejected");
        return Err(CoreError::IncompleteShift {
            shift_id: shift_id.to_string(),
            missing,
        }
        .into());
    }

    sqlx::query(
        r#"
        UPDATE meter_readings
        SET unit_price = (
            SELECT f.price FROM nozzles n
            JOIN fuel_types f ON f.id = n.fuel_type_id
            WHERE n.id = meter_readings.nozzle_id
        )
        WHERE shift_id = ?1 AND reading_type = 'closing'
        "#,
    )
    .bind(shift_id)
    .execute(&mut *conn)
    .await?;

    let pairs = pair_readings(&readings);
    let mut baselines = Vec::new();

    for nozzle in branch_nozzles(&mut *conn, &shift.branch_id).await? {
        let Some(pair) = pairs.get(&nozzle.id) else {
            continue;
        };
        let (Some(opening), Some(closing)) = (pair.opening, pair.closing) else {
            continue;
        };

        // opening <= closing holds for stored pairs, so this also keeps the
        // baseline at or below the closing
        let result = sqlx::query(
            r#"
            UPDATE nozzles SET current_meter_reading = ?2, updated_at = ?4
            WHERE id = ?1 AND current_meter_reading <= ?3
            "#,
        )
        .bind(&nozzle.id)
        .bind(closing)
        .bind(opening)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            warn!(
                shift_id = %shift_id,
                nozzle_id = %nozzle.id,
                baseline = %nozzle.current_meter_reading,
                opening = %opening,
                "Baseline ahead of opening reading, close aborted"
            );
            return Err(CoreError::ReadingRegression {
                nozzle_id: nozzle.id,
                reading_type: ReadingType::Opening,
                value: opening,
                minimum: nozzle.current_meter_reading,
            }
            .into());
        }

        baselines.push(NozzleBaseline {
            nozzle_id: nozzle.id,
            nozzle_number: nozzle.nozzle_number,
            previous: nozzle.current_meter_reading,
            current: closing,
        });
    }

    Ok(ShiftCloseReport { shift, baselines })
}

fn log_closed(report: &ShiftCloseReport) {
    info!(
        shift_id = %report.shift.id,
        branch_id = %report.shift.branch_id,
        business_date = %report.shift.business_date,
        nozzles = report.baselines.len(),
        "Shift closed"
    );
}

async fn shift_readings(conn: &mut SqliteConnection, shift_id: &str) -> DbResult<Vec<MeterReading>> {
    let readings = sqlx::query_as::<_, MeterReading>(
        "SELECT * FROM meter_readings WHERE shift_id = ?1 ORDER BY nozzle_id, reading_type DESC",
    )
    .bind(shift_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(readings)
}

async fn nozzle_pair(
    conn: &mut SqliteConnection,
    shift_id: &str,
    nozzle_id: &str,
) -> DbResult<ReadingPair> {
    let readings = sqlx::query_as::<_, MeterReading>(
        "SELECT * FROM meter_readings WHERE shift_id = ?1 AND nozzle_id = ?2",
    )
    .bind(shift_id)
    .bind(nozzle_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(pair_readings(&readings)
        .remove(nozzle_id)
        .unwrap_or_default())
}

/// Writes one reading; an existing row for the same slot is overwritten.
async fn upsert_reading(
    conn: &mut SqliteConnection,
    shift_id: &str,
    nozzle_id: &str,
    reading_type: ReadingType,
    value: Volume,
) -> DbResult<MeterReading> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO meter_readings (
            id, shift_id, nozzle_id, reading_type, reading_value,
            unit_price, recorded_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?6)
        ON CONFLICT (shift_id, nozzle_id, reading_type) DO UPDATE SET
            reading_value = excluded.reading_value,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(new_id())
    .bind(shift_id)
    .bind(nozzle_id)
    .bind(reading_type)
    .bind(value)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let reading = sqlx::query_as::<_, MeterReading>(
        r#"
        SELECT * FROM meter_readings
        WHERE shift_id = ?1 AND nozzle_id = ?2 AND reading_type = ?3
        "#,
    )
    .bind(shift_id)
    .bind(nozzle_id)
    .bind(reading_type)
    .fetch_one(&mut *conn)
    .await?;

    Ok(reading)
}

/// Current price of every fuel type of the branch's business.
async fn current_prices(
    conn: &mut SqliteConnection,
    branch_id: &str,
) -> DbResult<HashMap<String, Money>> {
    let rows = sqlx::query_as::<_, (String, Money)>(
        r#"
        SELECT f.id, f.price FROM fuel_types f
        JOIN branches b ON b.business_id = f.business_id
        WHERE b.id = ?1
        "#,
    )
    .bind(branch_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Derived sales per tank of a branch on a business date, all shifts.
pub(crate) async fn branch_tank_sales(
    conn: &mut SqliteConnection,
    branch_id: &str,
    business_date: NaiveDate,
) -> DbResult<BTreeMap<String, Volume>> {
    let rows = sqlx::query_as::<_, (String, Volume)>(
        r#"
        SELECT n.tank_id, SUM(c.reading_value - o.reading_value)
        FROM shift_instances s
        JOIN meter_readings c
            ON c.shift_id = s.id AND c.reading_type = 'closing'
        JOIN meter_readings o
            ON o.shift_id = s.id AND o.nozzle_id = c.nozzle_id AND o.reading_type = 'opening'
        JOIN nozzles n ON n.id = c.nozzle_id
        WHERE s.branch_id = ?1 AND s.business_date = ?2
        GROUP BY n.tank_id
        "#,
    )
    .bind(branch_id)
    .bind(business_date)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}

// =============================================================================
// Unit Tests
// =============================================================================

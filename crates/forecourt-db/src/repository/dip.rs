//! # Dip Repository
//!
//! Tank dip readings and the daily stock reconciliation.
//!
//! ## Daily Reconciliation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  opening   OPENING dip of the day                                      │
//! │            else 0 on the tank's first day                              │
//! │            else CLOSING dip of the previous day                        │
//! │            else MissingBaseline                                        │
//! │  receipts  RECEIPT dip of the day                                      │
//! │  sales     Σ (closing − opening) of the tank's nozzles, all shifts     │
//! │                                                                         │
//! │  expected = opening + receipts − sales                                 │
//! │  variance = actual CLOSING − expected                                  │
//! │  |variance| ≤ permissible loss × sales  → NORMAL                       │
//! │  below / above                          → LOSS / GAIN (logged at warn) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use forecourt_core::reconciliation::{self, resolve_opening, DipInputs};
use forecourt_core::validation::validate_stock_level;
use forecourt_core::{
    BaselineSource, Branch, CoreError, CoreResult, Depth, DipReading, DipReadingType, FuelType,
    LossRate, Reconciliation, StorageTank, UpsertOutcome, ValidationError, VarianceClass, Volume,
};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::registry::{BRANCHES, FUEL_TYPES, STORAGE_TANKS};
use super::shift::branch_tank_sales;
use super::{fetch_by_id, new_id, require_active};
use crate::error::DbResult;

/// One tank's figures for one business date.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TankDayReport {
    pub tank_id: String,
    pub tank_number: String,
    pub fuel_type_id: String,
    pub capacity: Volume,
    pub current_stock: Volume,
    pub reading_date: NaiveDate,
    pub opening_dip: Option<DipReading>,
    pub closing_dip: Option<DipReading>,
    pub receipts: Volume,
    pub sales: Volume,
    /// Resolved opening stock; absent when the baseline is missing.
    pub opening: Option<Volume>,
    pub opening_source: Option<BaselineSource>,
    pub expected_closing: Option<Volume>,
    /// Present once a CLOSING dip exists.
    pub reconciliation: Option<Reconciliation>,
}

/// One gauge entry of a dip batch.
#[derive(Debug, Clone)]
pub struct DipEntry {
    pub tank_id: String,
    pub reading_type: DipReadingType,
    pub dip_depth: Depth,
    /// Stock from the calibration chart; for RECEIPT, the delivered volume.
    pub calculated_stock: Volume,
}

/// Repository for dip readings.
#[derive(Debug, Clone)]
pub struct DipRepository {
    pool: SqlitePool,
}

impl DipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DipRepository { pool }
    }

    /// Records or overwrites the day's dip of the given type.
    ///
    /// ## Rules
    /// - OPENING/CLOSING stock within `0..=capacity`
    /// - RECEIPT is a delivered volume, `> 0` and at most the capacity
    /// - the tank and its branch must be active
    /// - CLOSING sets the tank's current stock, unless a later day's
    ///   CLOSING already did
    pub async fn record_dip(
        &self,
        tank_id: &str,
        reading_date: NaiveDate,
        reading_type: DipReadingType,
        dip_depth: Depth,
        calculated_stock: Volume,
    ) -> DbResult<UpsertOutcome<DipReading>> {
        debug!(tank_id = %tank_id, %reading_date, ?reading_type, "Recording dip");

        let entry = DipEntry {
            tank_id: tank_id.to_string(),
            reading_type,
            dip_depth,
            calculated_stock,
        };

        let mut tx = self.pool.begin().await?;
        let outcome = write_dip(&mut tx, None, reading_date, &entry).await?;
        tx.commit().await?;

        Ok(outcome)
    }

    /// Records the dips of one branch for one business date in a single
    /// transaction. Every tank must belong to the branch; the first failing
    /// entry rolls back the whole batch, tank stock included.
    pub async fn record_dips(
        &self,
        branch_id: &str,
        reading_date: NaiveDate,
        entries: &[DipEntry],
    ) -> DbResult<Vec<DipReading>> {
        debug!(branch_id = %branch_id, %reading_date, entries = entries.len(), "Recording dip batch");

        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(reading) = write_dip(&mut tx, Some(branch_id), reading_date, entry)
                .await?
                .into_value()
            {
                stored.push(reading);
            }
        }
        tx.commit().await?;

        info!(branch_id = %branch_id, %reading_date, count = stored.len(), "Dip batch stored");
        Ok(stored)
    }

    /// Every dip of a tank on a business date.
    pub async fn readings(&self, tank_id: &str, reading_date: NaiveDate) -> DbResult<Vec<DipReading>> {
        let readings = sqlx::query_as::<_, DipReading>(
            r#"
            SELECT * FROM dip_readings
            WHERE tank_id = ?1 AND reading_date = ?2
            ORDER BY reading_type
            "#,
        )
        .bind(tank_id)
        .bind(reading_date)
        .fetch_all(&self.pool)
        .await?;
        Ok(readings)
    }

    /// Reconciles one tank for one business date.
    ///
    /// Fails with `MissingBaseline` when the opening stock cannot be
    /// resolved. Without a CLOSING dip the report carries the expected
    /// closing but no reconciliation.
    pub async fn reconcile(&self, tank_id: &str, reading_date: NaiveDate) -> DbResult<TankDayReport> {
        let mut conn = self.pool.acquire().await?;

        let tank = fetch_by_id::<StorageTank>(&mut *conn, STORAGE_TANKS, tank_id)
            .await?
            .ok_or_else(|| CoreError::not_found("StorageTank", tank_id))?;
        let rate = loss_rate(&mut conn, &tank).await?;
        let sales = branch_tank_sales(&mut conn, &tank.branch_id, reading_date)
            .await?
            .remove(&tank.id)
            .unwrap_or_default();

        let day = TankDay::load(&mut conn, &tank, reading_date, sales).await?;
        let opening = day.opening(&tank.id, reading_date)?;

        Ok(day.report(&tank, reading_date, Some(opening), rate))
    }

    /// Per active tank of a branch: the day's dips, receipts, sales and
    /// reconciliation. A tank with a broken baseline is listed without an
    /// opening.
    pub async fn daily_dip_sheet(
        &self,
        branch_id: &str,
        reading_date: NaiveDate,
    ) -> DbResult<Vec<TankDayReport>> {
        let mut conn = self.pool.acquire().await?;

        let tanks = sqlx::query_as::<_, StorageTank>(
            "SELECT * FROM storage_tanks WHERE branch_id = ?1 AND is_active = 1 ORDER BY tank_number",
        )
        .bind(branch_id)
        .fetch_all(&mut *conn)
        .await?;

        let sales = branch_tank_sales(&mut conn, branch_id, reading_date).await?;

        let mut sheet = Vec::with_capacity(tanks.len());
        for tank in &tanks {
            let rate = loss_rate(&mut conn, tank).await?;
            let tank_sales = sales.get(&tank.id).copied().unwrap_or_default();
            let day = TankDay::load(&mut conn, tank, reading_date, tank_sales).await?;

            let opening = match day.opening(&tank.id, reading_date) {
                Ok(opening) => Some(opening),
                Err(CoreError::MissingBaseline { .. }) => {
                    debug!(tank_id = %tank.id, %reading_date, "No opening baseline");
                    None
                }
                Err(e) => return Err(e.into()),
            };

            sheet.push(day.report(tank, reading_date, opening, rate));
        }

        Ok(sheet)
    }
}

/// Writes one dip inside the caller's transaction. With `branch_id` set the
/// tank must belong to that branch.
async fn write_dip(
    conn: &mut SqliteConnection,
    branch_id: Option<&str>,
    reading_date: NaiveDate,
    entry: &DipEntry,
) -> DbResult<UpsertOutcome<DipReading>> {
    let tank_id = entry.tank_id.as_str();
    let calculated_stock = entry.calculated_stock;
    let now = Utc::now();

    if entry.dip_depth.hundredths_mm() < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "dip_depth".to_string(),
        }
        .into());
    }

    // lock the tank row first
    sqlx::query("UPDATE storage_tanks SET updated_at = updated_at WHERE id = ?1")
        .bind(tank_id)
        .execute(&mut *conn)
        .await?;
    let tank = require_active(
        fetch_by_id::<StorageTank>(&mut *conn, STORAGE_TANKS, tank_id).await?,
        "StorageTank",
        tank_id,
    )?;
    if branch_id.is_some_and(|b| b != tank.branch_id) {
        return Err(CoreError::reference("StorageTank", tank_id, "belongs to another branch").into());
    }
    require_active(
        fetch_by_id::<Branch>(&mut *conn, BRANCHES, &tank.branch_id).await?,
        "Branch",
        &tank.branch_id,
    )?;

    match entry.reading_type {
        DipReadingType::Opening | DipReadingType::Closing => {
            validate_stock_level(calculated_stock, tank.capacity)?;
        }
        DipReadingType::Receipt => {
            if !calculated_stock.is_positive() {
                return Err(ValidationError::MustBePositive {
                    field: "calculated_stock".to_string(),
                }
                .into());
            }
            validate_stock_level(calculated_stock, tank.capacity)?;
        }
    }

    let existed = dip_reading(&mut *conn, tank_id, reading_date, entry.reading_type)
        .await?
        .is_some();

    sqlx::query(
        r#"
        INSERT INTO dip_readings (
            id, tank_id, reading_date, reading_type, dip_depth,
            calculated_stock, recorded_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        ON CONFLICT (tank_id, reading_date, reading_type) DO UPDATE SET
            dip_depth = excluded.dip_depth,
            calculated_stock = excluded.calculated_stock,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(new_id())
    .bind(tank_id)
    .bind(reading_date)
    .bind(entry.reading_type)
    .bind(entry.dip_depth)
    .bind(calculated_stock)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if entry.reading_type == DipReadingType::Closing {
        let result = sqlx::query(
            r#"
            UPDATE storage_tanks SET current_stock = ?2, updated_at = ?3
            WHERE id = ?1 AND NOT EXISTS (
                SELECT 1 FROM dip_readings
                WHERE tank_id = ?1 AND reading_type = 'closing' AND reading_date > ?4
            )
            "#,
        )
        .bind(tank_id)
        .bind(calculated_stock)
        .bind(now)
        .bind(reading_date)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 1 {
            info!(
                tank_id = %tank_id,
                previous = %tank.current_stock,
                current = %calculated_stock,
                "Tank stock updated from closing dip"
            );
        }
    }

    let reading = dip_reading(&mut *conn, tank_id, reading_date, entry.reading_type)
        .await?
        .ok_or_else(|| CoreError::not_found("DipReading", tank_id))?;

    Ok(if existed {
        UpsertOutcome::Updated(reading)
    } else {
        UpsertOutcome::Created(reading)
    })
}

// =============================================================================
// Reconciliation Inputs
// =============================================================================

/// Everything stored about a tank-day that the reconciliation needs.
struct TankDay {
    opening_dip: Option<DipReading>,
    closing_dip: Option<DipReading>,
    receipts: Volume,
    prior_closing: Option<Volume>,
    has_earlier_readings: bool,
    sales: Volume,
}

impl TankDay {
    async fn load(
        conn: &mut SqliteConnection,
        tank: &StorageTank,
        reading_date: NaiveDate,
        sales: Volume,
    ) -> DbResult<Self> {
        let opening_dip = dip_reading(conn, &tank.id, reading_date, DipReadingType::Opening).await?;
        let closing_dip = dip_reading(conn, &tank.id, reading_date, DipReadingType::Closing).await?;
        let receipts = dip_reading(conn, &tank.id, reading_date, DipReadingType::Receipt)
            .await?
            .map(|r| r.calculated_stock)
            .unwrap_or_default();

        let prior_closing = match reading_date.pred_opt() {
            Some(prev) => dip_reading(conn, &tank.id, prev, DipReadingType::Closing)
                .await?
                .map(|r| r.calculated_stock),
            None => None,
        };

        let has_earlier_readings: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM dip_readings WHERE tank_id = ?1 AND reading_date < ?2)",
        )
        .bind(&tank.id)
        .bind(reading_date)
        .fetch_one(&mut *conn)
        .await?;

        Ok(TankDay {
            opening_dip,
            closing_dip,
            receipts,
            prior_closing,
            has_earlier_readings,
            sales,
        })
    }

    fn opening(&self, tank_id: &str, reading_date: NaiveDate) -> CoreResult<(Volume, BaselineSource)> {
        resolve_opening(
            tank_id,
            reading_date,
            self.opening_dip.as_ref().map(|d| d.calculated_stock),
            self.prior_closing,
            self.has_earlier_readings,
        )
    }

    fn report(
        self,
        tank: &StorageTank,
        reading_date: NaiveDate,
        opening: Option<(Volume, BaselineSource)>,
        rate: LossRate,
    ) -> TankDayReport {
        let inputs = opening.map(|(opening, _)| DipInputs {
            opening,
            receipts: self.receipts,
            sales: self.sales,
        });

        let reconciliation = match (inputs, &self.closing_dip) {
            (Some(inputs), Some(closing)) => {
                let r = reconciliation::reconcile(inputs, closing.calculated_stock, rate);
                if r.class != VarianceClass::Normal {
                    warn!(
                        tank_id = %tank.id,
                        tank_number = %tank.tank_number,
                        %reading_date,
                        class = ?r.class,
                        variance = %r.variance,
                        tolerance = %r.tolerance,
                        "Dip variance outside tolerance"
                    );
                }
                Some(r)
            }
            _ => None,
        };

        TankDayReport {
            tank_id: tank.id.clone(),
            tank_number: tank.tank_number.clone(),
            fuel_type_id: tank.fuel_type_id.clone(),
            capacity: tank.capacity,
            current_stock: tank.current_stock,
            reading_date,
            opening_dip: self.opening_dip,
            closing_dip: self.closing_dip,
            receipts: self.receipts,
            sales: self.sales,
            opening: opening.map(|(v, _)| v),
            opening_source: opening.map(|(_, source)| source),
            expected_closing: inputs.map(|i| i.expected_closing()),
            reconciliation,
        }
    }
}

async fn dip_reading(
    conn: &mut SqliteConnection,
    tank_id: &str,
    reading_date: NaiveDate,
    reading_type: DipReadingType,
) -> DbResult<Option<DipReading>> {
    let reading = sqlx::query_as::<_, DipReading>(
        r#"
        SELECT * FROM dip_readings
        WHERE tank_id = ?1 AND reading_date = ?2 AND reading_type = ?3
        "#,
    )
    .bind(tank_id)
    .bind(reading_date)
    .bind(reading_type)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(reading)
}

async fn loss_rate(conn: &mut SqliteConnection, tank: &StorageTank) -> DbResult<LossRate> {
    let fuel_type = fetch_by_id::<FuelType>(&mut *conn, FUEL_TYPES, &tank.fuel_type_id)
        .await?
        .ok_or_else(|| CoreError::not_found("FuelType", &tank.fuel_type_id))?;
    Ok(fuel_type.permissible_loss)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::fixtures::{station, station_on, Station};
    use crate::repository::registry::TopologyEntity;
    use crate::{Database, DbConfig};
    use forecourt_core::ReadingType;
    use std::time::Duration;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    async fn dip(s: &Station, date: NaiveDate, t: DipReadingType, litres: i64) -> DipReading {
        s.db.dips()
            .record_dip(&s.tank.id, date, t, Depth::from_mm(1_000), Volume::from_litres(litres))
            .await
            .unwrap()
            .into_value()
            .unwrap()
    }

    async fn meters(s: &Station, date: NaiveDate, values: &[(i64, i64)]) {
        let shifts = s.db.shifts();
        let shift = shifts.get_or_create_shift(&s.branch.id, date).await.unwrap();
        for (nozzle, (open, close)) in s.nozzles.iter().zip(values) {
            shifts
                .record_reading(&shift.id, &nozzle.id, ReadingType::Opening, Some(Volume::from_litres(*open)))
                .await
                .unwrap();
            shifts
                .record_reading(&shift.id, &nozzle.id, ReadingType::Closing, Some(Volume::from_litres(*close)))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_daily_loss_beyond_tolerance() {
        let s = station(2).await;

        dip(&s, day(2), DipReadingType::Opening, 8_500).await;
        meters(&s, day(2), &[(100, 150), (200, 230)]).await;
        dip(&s, day(2), DipReadingType::Closing, 8_415).await;

        let report = s.db.dips().reconcile(&s.tank.id, day(2)).await.unwrap();
        assert_eq!(report.sales, Volume::from_litres(80));
        assert_eq!(report.opening_source, Some(BaselineSource::OpeningDip));
        assert_eq!(report.expected_closing, Some(Volume::from_litres(8_420)));

        let r = report.reconciliation.unwrap();
        assert_eq!(r.variance, Volume::from_litres(-5));
        assert_eq!(r.tolerance, Volume::from_centilitres(20));
        assert_eq!(r.class, VarianceClass::Loss);

        let tank = s.db.registry().get_tank(&s.tank.id).await.unwrap().unwrap();
        assert_eq!(tank.current_stock, Volume::from_litres(8_415));
    }

    #[tokio::test]
    async fn test_first_day_opens_at_zero() {
        let s = station(0).await;

        dip(&s, day(1), DipReadingType::Receipt, 5_000).await;
        dip(&s, day(1), DipReadingType::Closing, 5_000).await;

        let report = s.db.dips().reconcile(&s.tank.id, day(1)).await.unwrap();
        assert_eq!(report.opening, Some(Volume::zero()));
        assert_eq!(report.opening_source, Some(BaselineSource::FirstDay));
        assert_eq!(report.receipts, Volume::from_litres(5_000));
        assert_eq!(report.reconciliation.unwrap().class, VarianceClass::Normal);
    }

    #[tokio::test]
    async fn test_opening_carries_prior_closing() {
        let s = station(0).await;

        dip(&s, day(1), DipReadingType::Closing, 8_415).await;

        let report = s.db.dips().reconcile(&s.tank.id, day(2)).await.unwrap();
        assert_eq!(report.opening, Some(Volume::from_litres(8_415)));
        assert_eq!(report.opening_source, Some(BaselineSource::PriorClosing));
        assert!(report.closing_dip.is_none());
        assert!(report.reconciliation.is_none());
        assert_eq!(report.expected_closing, Some(Volume::from_litres(8_415)));
    }

    #[tokio::test]
    async fn test_gap_day_breaks_continuity() {
        let s = station(0).await;

        dip(&s, day(1), DipReadingType::Closing, 8_415).await;

        let err = s.db.dips().reconcile(&s.tank.id, day(3)).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::MissingBaseline { .. })));

        let sheet = s.db.dips().daily_dip_sheet(&s.branch.id, day(3)).await.unwrap();
        assert_eq!(sheet.len(), 1);
        assert!(sheet[0].opening.is_none());
        assert!(sheet[0].expected_closing.is_none());
    }

    #[tokio::test]
    async fn test_dip_validation() {
        let s = station(0).await;
        let dips = s.db.dips();

        let err = dips
            .record_dip(&s.tank.id, day(1), DipReadingType::Closing, Depth::from_mm(2_000), Volume::from_litres(10_001))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::ExceedsCapacity { .. }))
        ));

        let err = dips
            .record_dip(&s.tank.id, day(1), DipReadingType::Receipt, Depth::from_mm(0), Volume::zero())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));

        s.db.registry()
            .deactivate(TopologyEntity::StorageTank, &s.tank.id)
            .await
            .unwrap();
        let err = dips
            .record_dip(&s.tank.id, day(1), DipReadingType::Opening, Depth::from_mm(10), Volume::from_litres(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Reference { .. })));
    }

    #[tokio::test]
    async fn test_rerecording_closing_keeps_latest_stock() {
        let s = station(0).await;
        let dips = s.db.dips();

        dip(&s, day(1), DipReadingType::Closing, 8_415).await;
        dip(&s, day(2), DipReadingType::Closing, 8_300).await;

        let outcome = dips
            .record_dip(&s.tank.id, day(1), DipReadingType::Closing, Depth::from_mm(1_900), Volume::from_litres(8_400))
            .await
            .unwrap();
        assert!(matches!(outcome, UpsertOutcome::Updated(_)));

        let tank = s.db.registry().get_tank(&s.tank.id).await.unwrap().unwrap();
        assert_eq!(tank.current_stock, Volume::from_litres(8_300));
        assert_eq!(dips.readings(&s.tank.id, day(1)).await.unwrap().len(), 1);
    }

    fn entry(s: &Station, t: DipReadingType, litres: i64) -> DipEntry {
        DipEntry {
            tank_id: s.tank.id.clone(),
            reading_type: t,
            dip_depth: Depth::from_mm(1_000),
            calculated_stock: Volume::from_litres(litres),
        }
    }

    #[tokio::test]
    async fn test_dip_batch_is_all_or_nothing() {
        let s = station(0).await;
        let dips = s.db.dips();

        let err = dips
            .record_dips(
                &s.branch.id,
                day(1),
                &[
                    entry(&s, DipReadingType::Closing, 8_000),
                    entry(&s, DipReadingType::Opening, 10_500),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::ExceedsCapacity { .. }))
        ));
        assert!(dips.readings(&s.tank.id, day(1)).await.unwrap().is_empty());
        let tank = s.db.registry().get_tank(&s.tank.id).await.unwrap().unwrap();
        assert_eq!(tank.current_stock, s.tank.current_stock);

        let stored = dips
            .record_dips(
                &s.branch.id,
                day(1),
                &[
                    entry(&s, DipReadingType::Opening, 8_500),
                    entry(&s, DipReadingType::Closing, 8_000),
                ],
            )
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        let tank = s.db.registry().get_tank(&s.tank.id).await.unwrap().unwrap();
        assert_eq!(tank.current_stock, Volume::from_litres(8_000));
    }

    #[tokio::test]
    async fn test_dips_need_own_active_branch() {
        let s = station(0).await;
        let registry = s.db.registry();

        let other = registry
            .create_branch(&s.business.id, "KHI-02", "DHA", 300)
            .await
            .unwrap();
        let err = s
            .db
            .dips()
            .record_dips(&other.id, day(1), &[entry(&s, DipReadingType::Opening, 100)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Reference { .. })));

        registry
            .deactivate(TopologyEntity::Branch, &s.branch.id)
            .await
            .unwrap();
        let err = s
            .db
            .dips()
            .record_dip(&s.tank.id, day(1), DipReadingType::Opening, Depth::from_mm(10), Volume::from_litres(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Reference { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_closing_dips_leave_stock_matching_last_write() {
        let path = std::env::temp_dir().join(format!("forecourt-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(
            DbConfig::new(&path)
                .max_connections(8)
                .busy_timeout(Duration::from_secs(30)),
        )
        .await
        .unwrap();
        let s = station_on(db, 0).await;

        let mut handles = Vec::new();
        for i in 1..=12 {
            let dips = s.db.dips();
            let tank = s.tank.id.clone();
            handles.push(tokio::spawn(async move {
                dips.record_dip(
                    &tank,
                    day(1),
                    DipReadingType::Closing,
                    Depth::from_mm(1_000),
                    Volume::from_litres(500 * i),
                )
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let readings = s.db.dips().readings(&s.tank.id, day(1)).await.unwrap();
        assert_eq!(readings.len(), 1);
        let tank = s.db.registry().get_tank(&s.tank.id).await.unwrap().unwrap();
        assert_eq!(tank.current_stock, readings[0].calculated_stock);

        s.db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}

//! # Registry Repository
//!
//! Static station topology: businesses, branches, shift definitions, fuel
//! types, tanks, pumps, nozzles and cylinder types.
//!
//! ## Scoped Codes
//! ```text
//! ┌──────────────────┬──────────────────┬────────────────────────────────┐
//! │ Entity           │ Code             │ Unique within                  │
//! ├──────────────────┼──────────────────┼────────────────────────────────┤
//! │ Business         │ code             │ the whole network              │
//! │ Branch           │ code             │ business                       │
//! │ FuelType         │ code             │ business                       │
//! │ CylinderType     │ code             │ business                       │
//! │ StorageTank      │ tank_number      │ branch                         │
//! │ Pump             │ pump_number      │ branch                         │
//! │ Nozzle           │ nozzle_number    │ pump                           │
//! │ ShiftDefinition  │ name             │ branch                         │
//! └──────────────────┴──────────────────┴────────────────────────────────┘
//! ```
//!
//! Every `register_*` is the single idempotent entry point for its entity:
//! `INSERT … ON CONFLICT (scope, code) DO NOTHING`, then `Created` or
//! `Conflict` carrying the existing row's id. `create_*` wraps it and turns
//! `Conflict` into `CoreError::Conflict`. References are checked explicitly
//! before the insert: missing or inactive → `CoreError::Reference`.

use chrono::Utc;
use forecourt_core::validation::{
    validate_capacity, validate_code, validate_loss_rate, validate_meter_value, validate_name,
    validate_price, validate_utc_offset,
};
use forecourt_core::{
    Branch, Business, CoreError, CylinderType, FuelType, LossRate, Money, Nozzle, Pump,
    ShiftDefinition, StorageTank, UpsertOutcome, ValidationError, Volume, Weight,
    DEFAULT_SHIFT_NAME,
};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{fetch_by_id, into_created, new_id, require_active};
use crate::error::{DbError, DbResult};

pub(crate) const BUSINESSES: &str = "businesses";
pub(crate) const BRANCHES: &str = "branches";
pub(crate) const SHIFT_DEFINITIONS: &str = "shift_definitions";
pub(crate) const FUEL_TYPES: &str = "fuel_types";
pub(crate) const STORAGE_TANKS: &str = "storage_tanks";
pub(crate) const PUMPS: &str = "pumps";
pub(crate) const NOZZLES: &str = "nozzles";
pub(crate) const CYLINDER_TYPES: &str = "cylinder_types";

/// Entities that can be soft-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopologyEntity {
    Branch,
    FuelType,
    StorageTank,
    Pump,
    Nozzle,
    CylinderType,
}

impl TopologyEntity {
    fn table(&self) -> &'static str {
        match self {
            TopologyEntity::Branch => BRANCHES,
            TopologyEntity::FuelType => FUEL_TYPES,
            TopologyEntity::StorageTank => STORAGE_TANKS,
            TopologyEntity::Pump => PUMPS,
            TopologyEntity::Nozzle => NOZZLES,
            TopologyEntity::CylinderType => CYLINDER_TYPES,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TopologyEntity::Branch => "Branch",
            TopologyEntity::FuelType => "FuelType",
            TopologyEntity::StorageTank => "StorageTank",
            TopologyEntity::Pump => "Pump",
            TopologyEntity::Nozzle => "Nozzle",
            TopologyEntity::CylinderType => "CylinderType",
        }
    }
}

/// Repository for topology operations.
#[derive(Debug, Clone)]
pub struct RegistryRepository {
    pool: SqlitePool,
}

impl RegistryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RegistryRepository { pool }
    }

    // =========================================================================
    // Businesses
    // =========================================================================

    pub async fn register_business(
        &self,
        code: &str,
        name: &str,
    ) -> DbResult<UpsertOutcome<Business>> {
        let now = Utc::now();
        let business = Business {
            id: new_id(),
            code: validate_code("code", code)?,
            name: validate_name("name", name)?,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO businesses (id, code, name, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, 1, ?4, ?4)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(&business.id)
        .bind(&business.code)
        .bind(&business.name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let existing_id: String =
                sqlx::query_scalar("SELECT id FROM businesses WHERE code = ?1")
                    .bind(&business.code)
                    .fetch_one(&self.pool)
                    .await?;
            return Ok(UpsertOutcome::Conflict {
                field: "code".to_string(),
                value: business.code,
                existing_id,
            });
        }

        info!(id = %business.id, code = %business.code, "Business created");
        Ok(UpsertOutcome::Created(business))
    }

    pub async fn create_business(&self, code: &str, name: &str) -> DbResult<Business> {
        let outcome = self.register_business(code, name).await?;
        into_created(outcome, "Business", "network")
    }

    pub async fn get_business(&self, id: &str) -> DbResult<Option<Business>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut *conn, BUSINESSES, id).await
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// Registers a branch together with its default shift definition, in
    /// one transaction.
    pub async fn register_branch(
        &self,
        business_id: &str,
        code: &str,
        name: &str,
        utc_offset_minutes: i32,
    ) -> DbResult<UpsertOutcome<Branch>> {
        let code = validate_code("code", code)?;
        let name = validate_name("name", name)?;
        validate_utc_offset(utc_offset_minutes)?;

        require_active(self.get_business(business_id).await?, "Business", business_id)?;

        let now = Utc::now();
        let branch = Branch {
            id: new_id(),
            business_id: business_id.to_string(),
            code,
            name,
            utc_offset_minutes,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO branches (
                id, business_id, code, name, utc_offset_minutes,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
            ON CONFLICT (business_id, code) DO NOTHING
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.business_id)
        .bind(&branch.code)
        .bind(&branch.name)
        .bind(branch.utc_offset_minutes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return conflict(&mut tx, BRANCHES, "business_id", business_id, "code", &branch.code)
                .await;
        }

        insert_shift_definition(&mut tx, &branch.id, DEFAULT_SHIFT_NAME, true).await?;
        tx.commit().await?;

        info!(id = %branch.id, code = %branch.code, "Branch created");
        Ok(UpsertOutcome::Created(branch))
    }

    pub async fn create_branch(
        &self,
        business_id: &str,
        code: &str,
        name: &str,
        utc_offset_minutes: i32,
    ) -> DbResult<Branch> {
        let outcome = self
            .register_branch(business_id, code, name, utc_offset_minutes)
            .await?;
        into_created(outcome, "Branch", &format!("business {}", business_id))
    }

    pub async fn get_branch(&self, id: &str) -> DbResult<Option<Branch>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut *conn, BRANCHES, id).await
    }

    pub async fn update_branch(
        &self,
        id: &str,
        name: &str,
        utc_offset_minutes: i32,
    ) -> DbResult<Branch> {
        let name = validate_name("name", name)?;
        validate_utc_offset(utc_offset_minutes)?;

        let result = sqlx::query(
            "UPDATE branches SET name = ?2, utc_offset_minutes = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(&name)
        .bind(utc_offset_minutes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Branch", id).into());
        }

        self.get_branch(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Branch", id).into())
    }

    pub async fn list_active_branches(&self, business_id: &str) -> DbResult<Vec<Branch>> {
        let branches = sqlx::query_as::<_, Branch>(
            "SELECT * FROM branches WHERE business_id = ?1 AND is_active = 1 ORDER BY code",
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(branches)
    }

    // =========================================================================
    // Shift Definitions
    // =========================================================================

    /// Adds a shift pattern to a branch. With `make_default`, the previous
    /// default is cleared in the same transaction.
    pub async fn create_shift_definition(
        &self,
        branch_id: &str,
        name: &str,
        make_default: bool,
    ) -> DbResult<ShiftDefinition> {
        let name = validate_name("name", name)?;
        require_active(self.get_branch(branch_id).await?, "Branch", branch_id)?;

        let mut tx = self.pool.begin().await?;

        if make_default {
            sqlx::query(
                "UPDATE shift_definitions SET is_default = 0 WHERE branch_id = ?1 AND is_default = 1",
            )
            .bind(branch_id)
            .execute(&mut *tx)
            .await?;
        }

        let outcome = match insert_shift_definition(&mut tx, branch_id, &name, make_default).await? {
            Some(definition) => UpsertOutcome::Created(definition),
            None => conflict(&mut tx, SHIFT_DEFINITIONS, "branch_id", branch_id, "name", &name).await?,
        };

        let definition = into_created(outcome, "ShiftDefinition", &format!("branch {}", branch_id))?;
        tx.commit().await?;

        debug!(id = %definition.id, branch_id = %branch_id, make_default, "Shift definition created");
        Ok(definition)
    }

    pub async fn list_shift_definitions(&self, branch_id: &str) -> DbResult<Vec<ShiftDefinition>> {
        let definitions = sqlx::query_as::<_, ShiftDefinition>(
            "SELECT * FROM shift_definitions WHERE branch_id = ?1 AND is_active = 1 ORDER BY name",
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(definitions)
    }

    pub async fn default_shift_definition(
        &self,
        branch_id: &str,
    ) -> DbResult<Option<ShiftDefinition>> {
        let mut conn = self.pool.acquire().await?;
        default_shift_definition(&mut conn, branch_id).await
    }

    // =========================================================================
    // Fuel Types
    // =========================================================================

    pub async fn register_fuel_type(
        &self,
        business_id: &str,
        code: &str,
        name: &str,
        price: Money,
        permissible_loss: LossRate,
    ) -> DbResult<UpsertOutcome<FuelType>> {
        let code = validate_code("code", code)?;
        let name = validate_name("name", name)?;
        validate_price(price)?;
        validate_loss_rate(permissible_loss)?;

        require_active(self.get_business(business_id).await?, "Business", business_id)?;

        let now = Utc::now();
        let fuel_type = FuelType {
            id: new_id(),
            business_id: business_id.to_string(),
            code,
            name,
            price,
            permissible_loss,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO fuel_types (
                id, business_id, code, name, price, permissible_loss,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
            ON CONFLICT (business_id, code) DO NOTHING
            "#,
        )
        .bind(&fuel_type.id)
        .bind(&fuel_type.business_id)
        .bind(&fuel_type.code)
        .bind(&fuel_type.name)
        .bind(fuel_type.price)
        .bind(fuel_type.permissible_loss)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return conflict(&mut conn, FUEL_TYPES, "business_id", business_id, "code", &fuel_type.code)
                .await;
        }

        info!(id = %fuel_type.id, code = %fuel_type.code, price = %fuel_type.price, "Fuel type created");
        Ok(UpsertOutcome::Created(fuel_type))
    }

    pub async fn create_fuel_type(
        &self,
        business_id: &str,
        code: &str,
        name: &str,
        price: Money,
        permissible_loss: LossRate,
    ) -> DbResult<FuelType> {
        let outcome = self
            .register_fuel_type(business_id, code, name, price, permissible_loss)
            .await?;
        into_created(outcome, "FuelType", &format!("business {}", business_id))
    }

    pub async fn get_fuel_type(&self, id: &str) -> DbResult<Option<FuelType>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut *conn, FUEL_TYPES, id).await
    }

    /// Sets the current price per litre. Open shifts value their sales at
    /// this price until they close; closed shifts keep their snapshot.
    pub async fn update_fuel_price(&self, id: &str, price: Money) -> DbResult<FuelType> {
        validate_price(price)?;

        let result = sqlx::query("UPDATE fuel_types SET price = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(price)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("FuelType", id).into());
        }

        info!(id = %id, price = %price, "Fuel price updated");
        self.get_fuel_type(id)
            .await?
            .ok_or_else(|| CoreError::not_found("FuelType", id).into())
    }

    pub async fn update_fuel_type(
        &self,
        id: &str,
        name: &str,
        permissible_loss: LossRate,
    ) -> DbResult<FuelType> {
        let name = validate_name("name", name)?;
        validate_loss_rate(permissible_loss)?;

        let result = sqlx::query(
            "UPDATE fuel_types SET name = ?2, permissible_loss = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(&name)
        .bind(permissible_loss)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("FuelType", id).into());
        }

        self.get_fuel_type(id)
            .await?
            .ok_or_else(|| CoreError::not_found("FuelType", id).into())
    }

    pub async fn list_active_fuel_types(&self, business_id: &str) -> DbResult<Vec<FuelType>> {
        let fuel_types = sqlx::query_as::<_, FuelType>(
            "SELECT * FROM fuel_types WHERE business_id = ?1 AND is_active = 1 ORDER BY code",
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(fuel_types)
    }

    // =========================================================================
    // Storage Tanks
    // =========================================================================

    /// Registers a tank. The branch and the fuel type must be active and
    /// belong to the same business. New tanks start empty.
    pub async fn register_tank(
        &self,
        branch_id: &str,
        fuel_type_id: &str,
        tank_number: &str,
        capacity: Volume,
    ) -> DbResult<UpsertOutcome<StorageTank>> {
        let tank_number = validate_code("tank_number", tank_number)?;
        validate_capacity(capacity)?;

        let branch = require_active(self.get_branch(branch_id).await?, "Branch", branch_id)?;
        let fuel_type =
            require_active(self.get_fuel_type(fuel_type_id).await?, "FuelType", fuel_type_id)?;
        if fuel_type.business_id != branch.business_id {
            return Err(
                CoreError::reference("FuelType", fuel_type_id, "belongs to another business").into(),
            );
        }

        let now = Utc::now();
        let tank = StorageTank {
            id: new_id(),
            branch_id: branch_id.to_string(),
            fuel_type_id: fuel_type_id.to_string(),
            tank_number,
            capacity,
            current_stock: Volume::zero(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO storage_tanks (
                id, branch_id, fuel_type_id, tank_number, capacity, current_stock,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 1, ?6, ?6)
            ON CONFLICT (branch_id, tank_number) DO NOTHING
            "#,
        )
        .bind(&tank.id)
        .bind(&tank.branch_id)
        .bind(&tank.fuel_type_id)
        .bind(&tank.tank_number)
        .bind(tank.capacity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return conflict(&mut conn, STORAGE_TANKS, "branch_id", branch_id, "tank_number", &tank.tank_number)
                .await;
        }

        info!(id = %tank.id, tank_number = %tank.tank_number, capacity = %tank.capacity, "Tank created");
        Ok(UpsertOutcome::Created(tank))
    }

    pub async fn create_tank(
        &self,
        branch_id: &str,
        fuel_type_id: &str,
        tank_number: &str,
        capacity: Volume,
    ) -> DbResult<StorageTank> {
        let outcome = self
            .register_tank(branch_id, fuel_type_id, tank_number, capacity)
            .await?;
        into_created(outcome, "StorageTank", &format!("branch {}", branch_id))
    }

    pub async fn get_tank(&self, id: &str) -> DbResult<Option<StorageTank>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut *conn, STORAGE_TANKS, id).await
    }

    /// Changes a tank's capacity. It can never drop below the stock held.
    pub async fn update_tank(&self, id: &str, capacity: Volume) -> DbResult<StorageTank> {
        validate_capacity(capacity)?;

        let result = sqlx::query(
            r#"
            UPDATE storage_tanks SET capacity = ?2, updated_at = ?3
            WHERE id = ?1 AND current_stock <= ?2
            "#,
        )
        .bind(id)
        .bind(capacity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let tank = self
            .get_tank(id)
            .await?
            .ok_or_else(|| DbError::from(CoreError::not_found("StorageTank", id)))?;

        if result.rows_affected() == 0 {
            return Err(ValidationError::ExceedsCapacity {
                field: "current_stock".to_string(),
                value: tank.current_stock,
                capacity,
            }
            .into());
        }

        Ok(tank)
    }

    pub async fn list_active_tanks(&self, branch_id: &str) -> DbResult<Vec<StorageTank>> {
        let tanks = sqlx::query_as::<_, StorageTank>(
            "SELECT * FROM storage_tanks WHERE branch_id = ?1 AND is_active = 1 ORDER BY tank_number",
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tanks)
    }

    // =========================================================================
    // Pumps
    // =========================================================================

    pub async fn register_pump(
        &self,
        branch_id: &str,
        pump_number: &str,
        label: &str,
    ) -> DbResult<UpsertOutcome<Pump>> {
        let pump_number = validate_code("pump_number", pump_number)?;
        let label = validate_name("label", label)?;

        require_active(self.get_branch(branch_id).await?, "Branch", branch_id)?;

        let now = Utc::now();
        let pump = Pump {
            id: new_id(),
            branch_id: branch_id.to_string(),
            pump_number,
            label,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO pumps (id, branch_id, pump_number, label, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
            ON CONFLICT (branch_id, pump_number) DO NOTHING
            "#,
        )
        .bind(&pump.id)
        .bind(&pump.branch_id)
        .bind(&pump.pump_number)
        .bind(&pump.label)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return conflict(&mut conn, PUMPS, "branch_id", branch_id, "pump_number", &pump.pump_number)
                .await;
        }

        debug!(id = %pump.id, pump_number = %pump.pump_number, "Pump created");
        Ok(UpsertOutcome::Created(pump))
    }

    pub async fn create_pump(&self, branch_id: &str, pump_number: &str, label: &str) -> DbResult<Pump> {
        let outcome = self.register_pump(branch_id, pump_number, label).await?;
        into_created(outcome, "Pump", &format!("branch {}", branch_id))
    }

    pub async fn get_pump(&self, id: &str) -> DbResult<Option<Pump>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut *conn, PUMPS, id).await
    }

    pub async fn update_pump(&self, id: &str, label: &str) -> DbResult<Pump> {
        let label = validate_name("label", label)?;

        let result = sqlx::query("UPDATE pumps SET label = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(&label)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Pump", id).into());
        }

        self.get_pump(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Pump", id).into())
    }

    pub async fn list_active_pumps(&self, branch_id: &str) -> DbResult<Vec<Pump>> {
        let pumps = sqlx::query_as::<_, Pump>(
            "SELECT * FROM pumps WHERE branch_id = ?1 AND is_active = 1 ORDER BY pump_number",
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(pumps)
    }

    // =========================================================================
    // Nozzles
    // =========================================================================

    /// Registers a nozzle on a pump.
    ///
    /// ## Reference Rules
    /// - pump, tank and fuel type exist and are active
    /// - the tank sits in the pump's branch
    /// - the tank holds the nozzle's fuel type
    pub async fn register_nozzle(
        &self,
        pump_id: &str,
        nozzle_number: &str,
        tank_id: &str,
        fuel_type_id: &str,
        initial_meter: Volume,
    ) -> DbResult<UpsertOutcome<Nozzle>> {
        let nozzle_number = validate_code("nozzle_number", nozzle_number)?;
        validate_meter_value(initial_meter)?;

        let pump = require_active(self.get_pump(pump_id).await?, "Pump", pump_id)?;
        let tank = require_active(self.get_tank(tank_id).await?, "StorageTank", tank_id)?;
        require_active(self.get_fuel_type(fuel_type_id).await?, "FuelType", fuel_type_id)?;

        if tank.branch_id != pump.branch_id {
            return Err(
                CoreError::reference("StorageTank", tank_id, "is not in the pump's branch").into(),
            );
        }
        if tank.fuel_type_id != fuel_type_id {
            return Err(CoreError::reference(
                "FuelType",
                fuel_type_id,
                "does not match the tank's fuel type",
            )
            .into());
        }

        let now = Utc::now();
        let nozzle = Nozzle {
            id: new_id(),
            pump_id: pump_id.to_string(),
            fuel_type_id: fuel_type_id.to_string(),
            tank_id: tank_id.to_string(),
            nozzle_number,
            current_meter_reading: initial_meter,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO nozzles (
                id, pump_id, fuel_type_id, tank_id, nozzle_number,
                current_meter_reading, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
            ON CONFLICT (pump_id, nozzle_number) DO NOTHING
            "#,
        )
        .bind(&nozzle.id)
        .bind(&nozzle.pump_id)
        .bind(&nozzle.fuel_type_id)
        .bind(&nozzle.tank_id)
        .bind(&nozzle.nozzle_number)
        .bind(nozzle.current_meter_reading)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return conflict(&mut conn, NOZZLES, "pump_id", pump_id, "nozzle_number", &nozzle.nozzle_number)
                .await;
        }

        debug!(id = %nozzle.id, nozzle_number = %nozzle.nozzle_number, "Nozzle created");
        Ok(UpsertOutcome::Created(nozzle))
    }

    pub async fn create_nozzle(
        &self,
        pump_id: &str,
        nozzle_number: &str,
        tank_id: &str,
        fuel_type_id: &str,
        initial_meter: Volume,
    ) -> DbResult<Nozzle> {
        let outcome = self
            .register_nozzle(pump_id, nozzle_number, tank_id, fuel_type_id, initial_meter)
            .await?;
        into_created(outcome, "Nozzle", &format!("pump {}", pump_id))
    }

    pub async fn get_nozzle(&self, id: &str) -> DbResult<Option<Nozzle>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut *conn, NOZZLES, id).await
    }

    /// Nozzles of a branch that can take readings.
    pub async fn list_active_nozzles(&self, branch_id: &str) -> DbResult<Vec<Nozzle>> {
        let mut conn = self.pool.acquire().await?;
        active_nozzles(&mut conn, branch_id).await
    }

    // =========================================================================
    // Cylinder Types
    // =========================================================================

    pub async fn register_cylinder_type(
        &self,
        business_id: &str,
        code: &str,
        name: &str,
        weight: Weight,
    ) -> DbResult<UpsertOutcome<CylinderType>> {
        let code = validate_code("code", code)?;
        let name = validate_name("name", name)?;
        if weight.grams() <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "weight".to_string(),
            }
            .into());
        }

        require_active(self.get_business(business_id).await?, "Business", business_id)?;

        let now = Utc::now();
        let cylinder_type = CylinderType {
            id: new_id(),
            business_id: business_id.to_string(),
            code,
            name,
            weight,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO cylinder_types (
                id, business_id, code, name, weight, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
            ON CONFLICT (business_id, code) DO NOTHING
            "#,
        )
        .bind(&cylinder_type.id)
        .bind(&cylinder_type.business_id)
        .bind(&cylinder_type.code)
        .bind(&cylinder_type.name)
        .bind(cylinder_type.weight)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return conflict(&mut conn, CYLINDER_TYPES, "business_id", business_id, "code", &cylinder_type.code)
                .await;
        }

        debug!(id = %cylinder_type.id, code = %cylinder_type.code, "Cylinder type created");
        Ok(UpsertOutcome::Created(cylinder_type))
    }

    pub async fn create_cylinder_type(
        &self,
        business_id: &str,
        code: &str,
        name: &str,
        weight: Weight,
    ) -> DbResult<CylinderType> {
        let outcome = self
            .register_cylinder_type(business_id, code, name, weight)
            .await?;
        into_created(outcome, "CylinderType", &format!("business {}", business_id))
    }

    pub async fn get_cylinder_type(&self, id: &str) -> DbResult<Option<CylinderType>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut *conn, CYLINDER_TYPES, id).await
    }

    pub async fn list_active_cylinder_types(&self, business_id: &str) -> DbResult<Vec<CylinderType>> {
        let types = sqlx::query_as::<_, CylinderType>(
            "SELECT * FROM cylinder_types WHERE business_id = ?1 AND is_active = 1 ORDER BY code",
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(types)
    }

    // =========================================================================
    // Deactivation
    // =========================================================================

    /// Soft-deletes an entity. The row stays readable by id for history
    /// but drops out of active listings and new shift/dip/cylinder work.
    pub async fn deactivate(&self, entity: TopologyEntity, id: &str) -> DbResult<()> {
        let sql = format!(
            "UPDATE {} SET is_active = 0, updated_at = ?2 WHERE id = ?1",
            entity.table()
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(entity.label(), id).into());
        }

        info!(entity = entity.label(), id = %id, "Deactivated");
        Ok(())
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Builds the `Conflict` outcome for a scoped code that already exists.
async fn conflict<T>(
    conn: &mut SqliteConnection,
    table: &str,
    scope_column: &str,
    scope_id: &str,
    field: &str,
    value: &str,
) -> DbResult<UpsertOutcome<T>> {
    let sql = format!(
        "SELECT id FROM {} WHERE {} = ?1 AND {} = ?2",
        table, scope_column, field
    );
    let existing_id: String = sqlx::query_scalar(&sql)
        .bind(scope_id)
        .bind(value)
        .fetch_one(&mut *conn)
        .await?;

    debug!(table, field, value, existing_id = %existing_id, "Scoped code already taken");

    Ok(UpsertOutcome::Conflict {
        field: field.to_string(),
        value: value.to_string(),
        existing_id,
    })
}

/// Inserts a shift definition; `None` if the name is taken in the branch.
async fn insert_shift_definition(
    conn: &mut SqliteConnection,
    branch_id: &str,
    name: &str,
    is_default: bool,
) -> DbResult<Option<ShiftDefinition>> {
    let definition = ShiftDefinition {
        id: new_id(),
        branch_id: branch_id.to_string(),
        name: name.to_string(),
        is_default,
        is_active: true,
        created_at: Utc::now(),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO shift_definitions (id, branch_id, name, is_default, is_active, created_at)
        VALUES (?1, ?2, ?3, ?4, 1, ?5)
        ON CONFLICT (branch_id, name) DO NOTHING
        "#,
    )
    .bind(&definition.id)
    .bind(&definition.branch_id)
    .bind(&definition.name)
    .bind(definition.is_default)
    .bind(definition.created_at)
    .execute(&mut *conn)
    .await?;

    Ok((result.rows_affected() == 1).then_some(definition))
}

/// The branch's default active shift definition.
pub(crate) async fn default_shift_definition(
    conn: &mut SqliteConnection,
    branch_id: &str,
) -> DbResult<Option<ShiftDefinition>> {
    let definition = sqlx::query_as::<_, ShiftDefinition>(
        r#"
        SELECT * FROM shift_definitions
        WHERE branch_id = ?1 AND is_default = 1 AND is_active = 1
        "#,
    )
    .bind(branch_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(definition)
}

/// Nozzles that can take readings: the nozzle, its pump, its tank and its
/// fuel type are all active. Ordered by pump then nozzle.
pub(crate) async fn active_nozzles(
    conn: &mut SqliteConnection,
    branch_id: &str,
) -> DbResult<Vec<Nozzle>> {
    let nozzles = sqlx::query_as::<_, Nozzle>(
        r#"
        SELECT n.* FROM nozzles n
        JOIN pumps p ON p.id = n.pump_id
        JOIN storage_tanks t ON t.id = n.tank_id
        JOIN fuel_types f ON f.id = n.fuel_type_id
        WHERE p.branch_id = ?1
          AND n.is_active = 1 AND p.is_active = 1
          AND t.is_active = 1 AND f.is_active = 1
        ORDER BY p.pump_number, n.nozzle_number
        "#,
    )
    .bind(branch_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(nozzles)
}

/// Every nozzle of a branch, active or not.
pub(crate) async fn branch_nozzles(
    conn: &mut SqliteConnection,
    branch_id: &str,
) -> DbResult<Vec<Nozzle>> {
    let nozzles = sqlx::query_as::<_, Nozzle>(
        r#"
        SELECT n.* FROM nozzles n
        JOIN pumps p ON p.id = n.pump_id
        WHERE p.branch_id = ?1
        ORDER BY p.pump_number, n.nozzle_number
        "#,
    )
    .bind(branch_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(nozzles)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::station;

    #[tokio::test]
    async fn test_duplicate_tank_number_conflicts() {
        let s = station(1).await;
        let registry = s.db.registry();

        let err = registry
            .create_tank(&s.branch.id, &s.pmg.id, "T1", Volume::from_litres(5_000))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Conflict { .. })));

        // existing tank untouched
        let tank = registry.get_tank(&s.tank.id).await.unwrap().unwrap();
        assert_eq!(tank.capacity, Volume::from_litres(10_000));
        assert_eq!(registry.list_active_tanks(&s.branch.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_reports_existing_id() {
        let s = station(1).await;
        let outcome = s
            .db
            .registry()
            .register_pump(&s.branch.id, "P1", "Island 9")
            .await
            .unwrap();

        match outcome {
            UpsertOutcome::Conflict {
                field, existing_id, ..
            } => {
                assert_eq!(field, "pump_number");
                assert_eq!(existing_id, s.pump.id);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_codes_in_every_scope() {
        let s = station(1).await;
        let registry = s.db.registry();

        let dup_branch = registry.create_branch(&s.business.id, "KHI-01", "Again", 300).await;
        let dup_fuel = registry
            .create_fuel_type(&s.business.id, "PMG", "Again", Money::from_cents(1), LossRate::zero())
            .await;
        let dup_nozzle = registry
            .create_nozzle(&s.pump.id, "1", &s.tank.id, &s.pmg.id, Volume::zero())
            .await;
        let dup_business = registry.create_business("KHI", "Again").await;

        for result in [
            dup_branch.map(|_| ()),
            dup_fuel.map(|_| ()),
            dup_nozzle.map(|_| ()),
            dup_business.map(|_| ()),
        ] {
            assert!(matches!(result, Err(DbError::Core(CoreError::Conflict { .. }))));
        }
    }

    #[tokio::test]
    async fn test_same_code_allowed_in_another_scope() {
        let s = station(1).await;
        let registry = s.db.registry();

        let other = registry
            .create_branch(&s.business.id, "KHI-02", "DHA", 300)
            .await
            .unwrap();
        assert!(registry
            .create_tank(&other.id, &s.pmg.id, "T1", Volume::from_litres(5_000))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_branch_gets_default_shift_definition() {
        let s = station(0).await;
        let registry = s.db.registry();

        let default = registry
            .default_shift_definition(&s.branch.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(default.name, DEFAULT_SHIFT_NAME);

        let night = registry
            .create_shift_definition(&s.branch.id, "NIGHT", true)
            .await
            .unwrap();
        let default = registry
            .default_shift_definition(&s.branch.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(default.id, night.id);
        assert_eq!(registry.list_shift_definitions(&s.branch.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_nozzle_reference_rules() {
        let s = station(0).await;
        let registry = s.db.registry();

        let hsd = registry
            .create_fuel_type(&s.business.id, "HSD", "High Speed Diesel", Money::from_cents(28_500), LossRate::from_bps(20))
            .await
            .unwrap();

        // tank holds PMG, nozzle claims HSD
        let err = registry
            .create_nozzle(&s.pump.id, "1", &s.tank.id, &hsd.id, Volume::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Reference { .. })));

        // tank in another branch
        let other = registry.create_branch(&s.business.id, "KHI-02", "DHA", 300).await.unwrap();
        let far_tank = registry
            .create_tank(&other.id, &s.pmg.id, "T1", Volume::from_litres(5_000))
            .await
            .unwrap();
        let err = registry
            .create_nozzle(&s.pump.id, "1", &far_tank.id, &s.pmg.id, Volume::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Reference { .. })));

        // inactive tank
        registry.deactivate(TopologyEntity::StorageTank, &s.tank.id).await.unwrap();
        let err = registry
            .create_nozzle(&s.pump.id, "1", &s.tank.id, &s.pmg.id, Volume::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Reference { .. })));

        // unknown pump
        let err = registry
            .create_nozzle("missing", "1", &far_tank.id, &s.pmg.id, Volume::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Reference { .. })));
    }

    #[tokio::test]
    async fn test_deactivated_rows_stay_readable() {
        let s = station(2).await;
        let registry = s.db.registry();

        registry
            .deactivate(TopologyEntity::Nozzle, &s.nozzles[1].id)
            .await
            .unwrap();

        let active = registry.list_active_nozzles(&s.branch.id).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, s.nozzles[0].id);

        let historical = registry.get_nozzle(&s.nozzles[1].id).await.unwrap().unwrap();
        assert!(!historical.is_active);

        let err = registry
            .deactivate(TopologyEntity::Pump, "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_tank_capacity_cannot_drop_below_stock() {
        let s = station(0).await;
        let registry = s.db.registry();

        sqlx::query("UPDATE storage_tanks SET current_stock = ?2 WHERE id = ?1")
            .bind(&s.tank.id)
            .bind(Volume::from_litres(6_000))
            .execute(s.db.pool())
            .await
            .unwrap();

        let err = registry
            .update_tank(&s.tank.id, Volume::from_litres(5_000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::ExceedsCapacity { .. }))
        ));

        let tank = registry
            .update_tank(&s.tank.id, Volume::from_litres(12_000))
            .await
            .unwrap();
        assert_eq!(tank.capacity, Volume::from_litres(12_000));
    }

    #[tokio::test]
    async fn test_update_fuel_price() {
        let s = station(0).await;
        let registry = s.db.registry();

        let updated = registry
            .update_fuel_price(&s.pmg.id, Money::from_cents(28_150))
            .await
            .unwrap();
        assert_eq!(updated.price, Money::from_cents(28_150));

        assert!(registry.update_fuel_price(&s.pmg.id, Money::zero()).await.is_err());
        assert!(matches!(
            registry.update_fuel_price("missing", Money::from_cents(1)).await,
            Err(DbError::Core(CoreError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let s = station(0).await;
        let err = s
            .db
            .registry()
            .create_tank(&s.branch.id, &s.pmg.id, "  ", Volume::from_litres(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }
}

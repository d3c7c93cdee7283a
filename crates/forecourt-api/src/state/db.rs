//! # Database State
//!
//! Wraps the `Database` connection for use in commands.
//!
//! The `Database` struct from `forecourt-db` contains a `SqlitePool`, so
//! commands can run concurrently without explicit locking. Serialization
//! of conflicting writes happens inside the repositories.
//!
//! ## Usage in Commands
//! ```rust,ignore
//! pub async fn get_cylinder_stock(
//!     db: &DbState,
//!     branch_id: String,
//! ) -> Result<Vec<CylinderStockDto>, ApiError> {
//!     let stock = db.inner().cylinders().list_stock(&branch_id).await?;
//!     Ok(stock.into_iter().map(CylinderStockDto::from).collect())
//! }
//! ```

use forecourt_db::{Database, DbResult};
use tracing::info;

use super::AppConfig;

/// Shared database handle for commands.
#[derive(Debug, Clone)]
pub struct DbState {
    db: Database,
}

impl DbState {
    /// Creates a new DbState wrapping the database connection.
    pub fn new(db: Database) -> Self {
        DbState { db }
    }

    /// Opens the configured database and applies pending migrations.
    pub async fn connect(config: &AppConfig) -> DbResult<Self> {
        let db = Database::new(config.db_config()).await?;
        info!(path = ?config.database_path, "Database connected and migrations applied");
        Ok(DbState::new(db))
    }

    /// Returns a reference to the inner Database.
    pub fn inner(&self) -> &Database {
        &self.db
    }
}

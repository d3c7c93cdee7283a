//! # forecourt-api: Command Layer
//!
//! Collaborator-facing commands over the station ledger. A UI shell or an
//! HTTP server owns the state and calls these functions with deserialized
//! request DTOs.
//!
//! ## Module Organization
//! ```text
//! forecourt_api/
//! ├── lib.rs                  ◄─── You are here (bootstrap)
//! ├── state/
//! │   ├── mod.rs              ◄─── State type exports
//! │   ├── db.rs               ◄─── Database state wrapper
//! │   └── config.rs           ◄─── Environment configuration
//! ├── commands/
//! │   ├── daily_operations.rs ◄─── Meter readings and shift close
//! │   ├── dip_readings.rs     ◄─── Tank dips and reconciliation
//! │   ├── cylinder.rs         ◄─── Cylinder stock
//! │   └── registry.rs         ◄─── Prices and deactivation
//! └── error.rs                ◄─── API error type for commands
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. init_tracing()            EnvFilter, RUST_LOG override              │
//! │  2. AppConfig::from_env()     FORECOURT_* variables, platform data dir  │
//! │  3. DbState::connect(&cfg)    WAL pool, pending migrations applied      │
//! │  4. Host routes requests to commands::*                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod error;
pub mod state;

use tracing::info;
use tracing_subscriber::EnvFilter;

pub use error::{ApiError, ErrorCode};
pub use state::{AppConfig, ConfigError, DbState};

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,forecourt=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=forecourt_db=trace` - Show trace for the database layer only
/// - Default: [`DEFAULT_LOG_FILTER`]
///
/// Calling it twice is harmless; the second subscriber is not installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Runs steps 1 to 3 of the startup sequence.
pub async fn bootstrap() -> Result<(AppConfig, DbState), ApiError> {
    init_tracing();

    let config = AppConfig::from_env()?;
    info!(db_path = ?config.database_path, "Starting forecourt ledger");

    let db = DbState::connect(&config).await?;
    Ok((config, db))
}

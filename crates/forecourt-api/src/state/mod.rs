//! # State Module
//!
//! State handed to every command by the host process.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      Host (UI shell / HTTP server)              │   │
//! │  │  let config = AppConfig::from_env()?;                           │   │
//! │  │  let db = DbState::connect(&config).await?;                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                              │                                          │
//! │                ┌─────────────┴─────────────┐                           │
//! │                ▼                           ▼                            │
//! │  ┌──────────────────────┐       ┌──────────────────────┐               │
//! │  │       DbState        │       │      AppConfig       │               │
//! │  │                      │       │                      │               │
//! │  │  Database            │       │  database_path       │               │
//! │  │  (SQLite pool)       │       │  pool / busy timeout │               │
//! │  │                      │       │  currency_symbol     │               │
//! │  └──────────────────────┘       └──────────────────────┘               │
//! │                                                                         │
//! │  • DbState: Database has an internal connection pool (thread-safe)     │
//! │  • AppConfig: Read-only after initialization                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;

pub use config::{default_database_path, AppConfig, ConfigError};
pub use db::DbState;

//! # Configuration State
//!
//! Stores application configuration loaded at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`FORECOURT_*`)
//! 2. Defaults (this file), with the database under the platform data dir
//!
//! Configuration is read-only after initialization.

use directories::ProjectDirs;
use forecourt_core::Money;
use forecourt_db::DbConfig;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding the database file location.
pub const ENV_DB_PATH: &str = "FORECOURT_DB_PATH";
pub const ENV_MAX_CONNECTIONS: &str = "FORECOURT_MAX_CONNECTIONS";
pub const ENV_BUSY_TIMEOUT_MS: &str = "FORECOURT_BUSY_TIMEOUT_MS";
pub const ENV_CURRENCY_SYMBOL: &str = "FORECOURT_CURRENCY_SYMBOL";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("{name} has invalid value '{value}': {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    /// No platform data directory and no explicit path.
    #[error("Could not determine app data directory; set FORECOURT_DB_PATH")]
    NoDataDir,

    #[error("Could not create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Application configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// Pool size.
    /// Default: 5
    pub max_connections: u32,

    /// How long a writer waits for the database lock.
    /// Default: 5 seconds
    #[serde(serialize_with = "serialize_millis")]
    pub busy_timeout: Duration,

    /// Currency symbol (for display)
    pub currency_symbol: String,
}

impl AppConfig {
    /// Defaults for everything but the database path.
    pub fn with_path(database_path: impl Into<PathBuf>) -> Self {
        AppConfig {
            database_path: database_path.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            currency_symbol: "Rs ".to_string(),
        }
    }

    /// Loads configuration from the process environment.
    ///
    /// ## Environment Variables
    /// - `FORECOURT_DB_PATH`: database file (default: platform data dir)
    /// - `FORECOURT_MAX_CONNECTIONS`: pool size, at least 1
    /// - `FORECOURT_BUSY_TIMEOUT_MS`: lock wait in milliseconds
    /// - `FORECOURT_CURRENCY_SYMBOL`: display prefix for money
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = match lookup(ENV_DB_PATH) {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => default_database_path()?,
        };

        let mut config = AppConfig::with_path(database_path);

        if let Some(raw) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => return Err(invalid(ENV_MAX_CONNECTIONS, &raw, "expected an integer >= 1")),
            };
        }

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid(ENV_BUSY_TIMEOUT_MS, &raw, "expected milliseconds"))?;
            config.busy_timeout = Duration::from_millis(millis);
        }

        if let Some(symbol) = lookup(ENV_CURRENCY_SYMBOL) {
            config.currency_symbol = symbol;
        }

        Ok(config)
    }

    /// Pool settings for [`forecourt_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .busy_timeout(self.busy_timeout)
    }

    /// Formats an amount as a currency string.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let config = AppConfig::with_path("forecourt.db");
    /// assert_eq!(config.format_money(Money::from_cents(27_990)), "Rs 279.90");
    /// ```
    pub fn format_money(&self, amount: Money) -> String {
        let cents = amount.cents();
        let whole = cents / 100;
        let frac = (cents % 100).abs();

        format!(
            "{}{}{}.{:02}",
            if cents < 0 { "-" } else { "" },
            self.currency_symbol,
            whole.abs(),
            frac
        )
    }
}

/// Platform data directory, created if missing.
///
/// - **macOS**: `~/Library/Application Support/com.forecourt.ledger/forecourt.db`
/// - **Windows**: `%APPDATA%\forecourt\ledger\data\forecourt.db`
/// - **Linux**: `~/.local/share/ledger/forecourt.db`
pub fn default_database_path() -> Result<PathBuf, ConfigError> {
    let proj_dirs = ProjectDirs::from("com", "forecourt", "ledger").ok_or(ConfigError::NoDataDir)?;
    let data_dir = proj_dirs.data_dir();

    std::fs::create_dir_all(data_dir).map_err(|source| ConfigError::DataDir {
        path: data_dir.to_path_buf(),
        source,
    })?;

    Ok(data_dir.join("forecourt.db"))
}

fn invalid(name: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/tmp/station.db"),
            (ENV_MAX_CONNECTIONS, "8"),
            (ENV_BUSY_TIMEOUT_MS, "250"),
            (ENV_CURRENCY_SYMBOL, "PKR "),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/station.db"));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.currency_symbol, "PKR ");

        let db = config.db_config();
        assert_eq!(db.max_connections, 8);
        assert_eq!(db.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/tmp/station.db"),
            (ENV_MAX_CONNECTIONS, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref name, .. } if name == ENV_MAX_CONNECTIONS));

        let err = AppConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/tmp/station.db"),
            (ENV_BUSY_TIMEOUT_MS, "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_format_money() {
        let config = AppConfig::with_path("forecourt.db");
        assert_eq!(config.format_money(Money::from_cents(27_990)), "Rs 279.90");
        assert_eq!(config.format_money(Money::from_cents(5)), "Rs 0.05");
        assert_eq!(config.format_money(Money::from_cents(-1_234)), "-Rs 12.34");
        assert_eq!(config.format_money(Money::zero()), "Rs 0.00");
    }
}

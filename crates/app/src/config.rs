//! Application configuration loaded from environment variables.

use bus::BusConfig;
use command_store::StoreConfig;

/// Process configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs on in-memory stores
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `PERSISTENCE_TIMEOUT_MS`: see [`StoreConfig`]
/// - `SAGA_RETENTION_SECS`: see [`BusConfig`]
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub log_level: String,
    pub store: StoreConfig,
    pub bus: BusConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            store: StoreConfig::from_env(),
            bus: BusConfig::from_env(),
        }
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Name of the persistence backend this configuration selects.
    pub fn backend(&self) -> &'static str {
        if self.database_url.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            log_level: "info".to_string(),
            store: StoreConfig::default(),
            bus: BusConfig::default(),
        }
    }
}

//! Store configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PGCACHE_*)
//! 2. TOML config file (if PGCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;
pub(crate) use validation::is_plain_identifier;

/// Store configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PGCACHE_*)
/// 2. TOML config file (if PGCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection URI of the backing database.
    ///
    /// Set via PGCACHE_DATABASE_URL environment variable.
    /// Only required by callers that do not pass a URI explicitly.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Name of the backing table.
    ///
    /// Set via PGCACHE_TABLE environment variable.
    #[serde(default = "default_table")]
    pub table: String,

    /// Upper bound on pooled Postgres connections.
    ///
    /// Set via PGCACHE_MAX_CONNECTIONS environment variable.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long to wait for a pooled connection, in milliseconds.
    ///
    /// Set via PGCACHE_ACQUIRE_TIMEOUT_MS environment variable.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Deadline for a single store operation, in milliseconds.
    ///
    /// Set via PGCACHE_OPERATION_TIMEOUT_MS environment variable.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// zstd level used when writing values.
    ///
    /// Set via PGCACHE_COMPRESSION_LEVEL environment variable.
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

fn default_table() -> String {
    "postgresqlcache".into()
}

fn default_max_connections() -> u32 {
    4
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_operation_timeout_ms() -> u64 {
    30_000
}

fn default_compression_level() -> i32 {
    crate::cache::codec::DEFAULT_LEVEL
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            table: default_table(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            compression_level: default_compression_level(),
        }
    }
}

impl StoreConfig {
    /// Pool acquire timeout as Duration.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Per-operation deadline as Duration.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PGCACHE_`
    /// 2. TOML file from `PGCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PGCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PGCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Database URI, for callers that rely on configuration to supply it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the URI is not set.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "database_url".into(),
            hint: "Set PGCACHE_DATABASE_URL environment variable".into(),
        })
    }
}

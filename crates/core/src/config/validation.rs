//! Configuration validation rules.
//!
//! This module provides validation logic for `StoreConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::StoreConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl StoreConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `table` is not a plain lowercase SQL identifier
    /// - `max_connections` is 0
    /// - `operation_timeout_ms` is less than 10ms or exceeds 10 minutes
    /// - `compression_level` is outside zstd's 1..=22
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_plain_identifier(&self.table) {
            return Err(ConfigError::Invalid {
                field: "table".into(),
                reason: "must match [a-z_][a-z0-9_]* and be at most 63 bytes".into(),
            });
        }

        if self.max_connections == 0 {
            return Err(ConfigError::Invalid { field: "max_connections".into(), reason: "must be greater than 0".into() });
        }

        if self.operation_timeout_ms < 10 {
            return Err(ConfigError::Invalid {
                field: "operation_timeout_ms".into(),
                reason: "must be at least 10ms".into(),
            });
        }
        if self.operation_timeout_ms > 600_000 {
            return Err(ConfigError::Invalid {
                field: "operation_timeout_ms".into(),
                reason: "must not exceed 10 minutes (600000ms)".into(),
            });
        }

        if !(1..=22).contains(&self.compression_level) {
            return Err(ConfigError::Invalid { field: "compression_level".into(), reason: "must be within 1..=22".into() });
        }

        if self.acquire_timeout_ms > self.operation_timeout_ms {
            tracing::warn!(
                acquire_timeout_ms = self.acquire_timeout_ms,
                operation_timeout_ms = self.operation_timeout_ms,
                "acquire_timeout_ms exceeds operation_timeout_ms; \
                 operations will hit their deadline before the pool gives up"
            );
        }

        Ok(())
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub(crate) fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= 63
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_table_injection() {
        let config = StoreConfig { table: "cache; DROP TABLE users".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "table"));
    }

    #[test]
    fn test_validate_table_empty() {
        let config = StoreConfig { table: String::new(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_table_leading_digit() {
        let config = StoreConfig { table: "1cache".into(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_table_too_long() {
        let config = StoreConfig { table: "t".repeat(64), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_max_connections_zero() {
        let config = StoreConfig { max_connections: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_connections"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = StoreConfig { operation_timeout_ms: 5, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "operation_timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = StoreConfig { operation_timeout_ms: 600_001, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_compression_level() {
        let config = StoreConfig { compression_level: 0, ..Default::default() };
        assert!(config.validate().is_err());
        let config = StoreConfig { compression_level: 23, ..Default::default() };
        assert!(config.validate().is_err());
        let config = StoreConfig { compression_level: 22, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = StoreConfig { max_connections: 1, operation_timeout_ms: 10, acquire_timeout_ms: 10, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}

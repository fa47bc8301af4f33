//! Postgres backend over a bounded sqlx pool.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use super::Backend;
use crate::Error;
use crate::cache::params::{ConnParams, SslMode};
use crate::cache::schema::{Dialect, Statements};
use crate::config::StoreConfig;

/// Backend-type identifier of the Postgres store.
pub const POSTGRES_STORE_TYPE: &str = "postgresql";

/// Pooled Postgres access to the cache table.
///
/// The pool keeps one connection open for the life of the store and grows up
/// to `max_connections` under concurrent use.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
    sql: Statements,
}

impl PgBackend {
    /// Open the long-lived pool from the URI form of the connection string.
    pub async fn connect(conn_str: &str, config: &StoreConfig) -> Result<Self, Error> {
        let options = PgConnectOptions::from_str(conn_str)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await?;

        Ok(Self { pool, sql: Statements::new(Dialect::Postgres, &config.table) })
    }
}

#[async_trait]
impl Backend for PgBackend {
    fn store_type(&self) -> &'static str {
        POSTGRES_STORE_TYPE
    }

    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let value = sqlx::query_scalar::<_, Vec<u8>>(&self.sql.select)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn upsert(&self, key: &str, value: &[u8]) -> Result<(), Error> {
        sqlx::query(&self.sql.upsert)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64, Error> {
        let result = sqlx::query(&self.sql.delete).bind(key).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn clear(&self) -> Result<(), Error> {
        sqlx::query(&self.sql.clear).execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.pool.close().await;
        Ok(())
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Allow => PgSslMode::Allow,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

/// Connection options built from discrete parameters.
///
/// Empty password and database are left to the driver's defaults.
pub(crate) fn connect_options(params: &ConnParams) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(&params.host)
        .port(params.port)
        .username(&params.user)
        .ssl_mode(params.ssl_mode.into());

    if !params.password.is_empty() {
        options = options.password(&params.password);
    }
    if !params.database.is_empty() {
        options = options.database(&params.database);
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_from_params() {
        let params = ConnParams::parse("postgres://cacher:pw@db.internal/cache?sslmode=require").unwrap();
        let options = connect_options(&params);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 443);
        assert_eq!(options.get_username(), "cacher");
        assert_eq!(options.get_database(), Some("cache"));
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Require));
    }

    #[test]
    fn test_ssl_mode_mapping() {
        assert!(matches!(PgSslMode::from(SslMode::Disable), PgSslMode::Disable));
        assert!(matches!(PgSslMode::from(SslMode::VerifyFull), PgSslMode::VerifyFull));
    }
}

//! Backing table creation and the SQL each dialect runs against it.
//!
//! The table is created on a short-lived bootstrap connection that is closed
//! whether or not creation succeeds. The long-lived connection is opened only
//! after the table is known to exist.

use std::path::Path;

use sqlx::{Connection, PgConnection};
use tokio_rusqlite::Connection as SqliteConnection;

use super::backend::postgres::connect_options;
use super::params::ConnParams;
use crate::Error;
use crate::config::is_plain_identifier;

/// SQL flavor of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

/// Statements for one table in one dialect.
///
/// The table name is interpolated; the bootstrap functions reject anything
/// that is not a plain identifier before a backend is built.
#[derive(Debug, Clone)]
pub struct Statements {
    pub create: String,
    pub select: String,
    pub upsert: String,
    pub delete: String,
    pub clear: String,
}

impl Statements {
    pub fn new(dialect: Dialect, table: &str) -> Self {
        match dialect {
            Dialect::Postgres => Self {
                create: format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        key text NOT NULL UNIQUE,
                        value bytea NOT NULL
                    )"
                ),
                select: format!("SELECT value FROM {table} WHERE key = $1"),
                upsert: format!(
                    "INSERT INTO {table} (key, value) VALUES ($1, $2)
                    ON CONFLICT (key) DO UPDATE SET value = excluded.value"
                ),
                delete: format!("DELETE FROM {table} WHERE key = $1"),
                clear: format!("TRUNCATE TABLE {table}"),
            },
            Dialect::Sqlite => Self {
                create: format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        key TEXT NOT NULL UNIQUE,
                        value BLOB NOT NULL
                    )"
                ),
                select: format!("SELECT value FROM {table} WHERE key = ?1"),
                upsert: format!(
                    "INSERT INTO {table} (key, value) VALUES (?1, ?2)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value"
                ),
                delete: format!("DELETE FROM {table} WHERE key = ?1"),
                clear: format!("DELETE FROM {table}"),
            },
        }
    }
}

/// Ensure the Postgres table exists using a dedicated bootstrap connection.
///
/// The connection string is re-parsed into discrete parameters and the
/// bootstrap connection is built from those, not from the URI.
///
/// # Errors
///
/// Returns the parser's `Malformed*` errors unchanged, and `SchemaInitFailed`
/// if the connection, ping, or `CREATE TABLE` fails.
pub async fn bootstrap_postgres(conn_str: &str, table: &str) -> Result<ConnParams, Error> {
    let params = ConnParams::parse(conn_str)?;
    check_table(table)?;
    let ddl = Statements::new(Dialect::Postgres, table).create;

    let mut conn = PgConnection::connect_with(&connect_options(&params)).await.map_err(|e| {
        Error::SchemaInitFailed(format!("bootstrap connection to {}:{} failed: {e}", params.host, params.port))
    })?;

    let result = async {
        conn.ping().await?;
        sqlx::query(&ddl).execute(&mut conn).await?;
        Ok::<_, sqlx::Error>(())
    }
    .await;

    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close bootstrap connection");
    }

    result.map_err(|e| Error::SchemaInitFailed(format!("creating table {table}: {e}")))?;
    tracing::debug!(host = %params.host, port = params.port, table, "cache table verified");

    Ok(params)
}

/// Ensure the SQLite table exists in the database file at `path`, using a
/// connection that is closed before returning.
pub async fn bootstrap_sqlite(path: &Path, table: &str) -> Result<(), Error> {
    check_table(table)?;
    let conn = SqliteConnection::open(path)
        .await
        .map_err(|e| Error::SchemaInitFailed(format!("bootstrap open of {}: {e}", path.display())))?;

    let result = create_sqlite_table(&conn, table).await;

    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close bootstrap connection");
    }

    result
}

/// Create the SQLite table on an existing connection.
///
/// Used directly for in-memory databases, where a second connection would
/// see a different, empty database.
pub async fn create_sqlite_table(conn: &SqliteConnection, table: &str) -> Result<(), Error> {
    check_table(table)?;
    let ddl = Statements::new(Dialect::Sqlite, table).create;
    conn.call(move |conn| conn.execute_batch(&ddl))
        .await
        .map_err(|e| Error::SchemaInitFailed(format!("creating table: {e}")))
}

fn check_table(table: &str) -> Result<(), Error> {
    if is_plain_identifier(table) {
        Ok(())
    } else {
        Err(Error::SchemaInitFailed(format!("invalid table name {table:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_statements() {
        let sql = Statements::new(Dialect::Postgres, "postgresqlcache");
        assert!(sql.create.starts_with("CREATE TABLE IF NOT EXISTS postgresqlcache"));
        assert!(sql.create.contains("key text NOT NULL UNIQUE"));
        assert!(sql.create.contains("value bytea NOT NULL"));
        assert!(sql.upsert.contains("ON CONFLICT (key) DO UPDATE"));
        assert_eq!(sql.clear, "TRUNCATE TABLE postgresqlcache");
    }

    #[test]
    fn test_sqlite_statements() {
        let sql = Statements::new(Dialect::Sqlite, "edge");
        assert!(sql.select.contains("?1"));
        assert_eq!(sql.clear, "DELETE FROM edge");
    }

    #[tokio::test]
    async fn test_create_sqlite_table_idempotent() {
        let conn = SqliteConnection::open_in_memory().await.unwrap();
        create_sqlite_table(&conn, "cache").await.unwrap();
        create_sqlite_table(&conn, "cache").await.unwrap();

        let has_table: bool = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='cache')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();

        assert!(has_table);
    }

    #[tokio::test]
    async fn test_create_sqlite_table_rejects_bad_name() {
        let conn = SqliteConnection::open_in_memory().await.unwrap();
        let result = create_sqlite_table(&conn, "cache; DROP TABLE x").await;
        assert!(matches!(result, Err(Error::SchemaInitFailed(_))));
    }

    #[tokio::test]
    async fn test_bootstrap_sqlite_unwritable_path() {
        let result = bootstrap_sqlite(Path::new("/nonexistent-dir/cache.sqlite"), "cache").await;
        assert!(matches!(result, Err(Error::SchemaInitFailed(_))));
    }

    #[tokio::test]
    async fn test_bootstrap_postgres_malformed_uri() {
        let result = bootstrap_postgres("nonsense", "cache").await;
        assert!(matches!(result, Err(Error::MalformedUri(_))));
    }

    #[tokio::test]
    async fn test_bootstrap_postgres_unreachable() {
        let result = bootstrap_postgres("postgres://u:p@127.0.0.1:1/db?sslmode=disable", "cache").await;
        assert!(matches!(result, Err(Error::SchemaInitFailed(_))));
    }
}

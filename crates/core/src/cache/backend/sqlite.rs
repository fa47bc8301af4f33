//! Embedded SQLite backend.
//!
//! tokio-rusqlite runs every statement on a single background thread that
//! owns the connection, so calls from many tasks are serialized without a
//! lock in this crate.

use std::path::Path;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, params, rusqlite};

use super::Backend;
use crate::Error;
use crate::cache::schema::{self, Dialect, Statements};

/// Backend-type identifier of the SQLite store.
pub const SQLITE_STORE_TYPE: &str = "sqlite";

/// SQLite access to the cache table.
#[derive(Clone, Debug)]
pub struct SqliteBackend {
    conn: Connection,
    sql: Statements,
}

impl SqliteBackend {
    /// Open a database file, creating the table on a bootstrap connection first.
    pub async fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, Error> {
        let path = path.as_ref();
        schema::bootstrap_sqlite(path, table).await?;

        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        apply_pragmas(&conn).await?;

        Ok(Self { conn, sql: Statements::new(Dialect::Sqlite, table) })
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory(table: &str) -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        apply_pragmas(&conn).await?;
        schema::create_sqlite_table(&conn, table).await?;

        Ok(Self { conn, sql: Statements::new(Dialect::Sqlite, table) })
    }
}

async fn apply_pragmas(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;",
        )?;
        Ok(())
    })
    .await
    .map_err(Error::Database)
}

#[async_trait]
impl Backend for SqliteBackend {
    fn store_type(&self) -> &'static str {
        SQLITE_STORE_TYPE
    }

    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let key = key.to_string();
        let sql = self.sql.select.clone();
        self.conn
            .call(move |conn| -> Result<Option<Vec<u8>>, Error> {
                let mut stmt = conn.prepare(&sql)?;

                match stmt.query_row(params![key], |row| row.get(0)) {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn upsert(&self, key: &str, value: &[u8]) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_vec();
        let sql = self.sql.upsert.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(&sql, params![key, value])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, key: &str) -> Result<u64, Error> {
        let key = key.to_string();
        let sql = self.sql.delete.clone();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(&sql, params![key])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn clear(&self) -> Result<(), Error> {
        let sql = self.sql.clear.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(&sql, [])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn close(&self) -> Result<(), Error> {
        self.conn.clone().close().await.map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let backend = SqliteBackend::open_in_memory("cache").await.unwrap();
        let version = backend
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
        assert_eq!(backend.store_type(), "sqlite");
    }

    #[tokio::test]
    async fn test_row_roundtrip() {
        let backend = SqliteBackend::open_in_memory("cache").await.unwrap();
        assert!(backend.fetch("k").await.unwrap().is_none());

        backend.upsert("k", b"v1").await.unwrap();
        backend.upsert("k", b"v2").await.unwrap();
        assert_eq!(backend.fetch("k").await.unwrap().unwrap(), b"v2");

        assert_eq!(backend.delete("k").await.unwrap(), 1);
        assert_eq!(backend.delete("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_length_value_is_stored() {
        let backend = SqliteBackend::open_in_memory("cache").await.unwrap();
        backend.upsert("empty", b"").await.unwrap();
        assert_eq!(backend.fetch("empty").await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_file_database_persists_table() {
        let path = std::env::temp_dir().join(format!("pgcache-sqlite-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let backend = SqliteBackend::open(&path, "cache").await.unwrap();
        backend.upsert("k", b"v").await.unwrap();
        backend.close().await.unwrap();

        let reopened = SqliteBackend::open(&path, "cache").await.unwrap();
        assert_eq!(reopened.fetch("k").await.unwrap().unwrap(), b"v");
        reopened.close().await.unwrap();

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_fetch_after_close_fails() {
        let backend = SqliteBackend::open_in_memory("cache").await.unwrap();
        backend.close().await.unwrap();
        assert!(matches!(backend.fetch("k").await, Err(Error::Database(_))));
    }
}

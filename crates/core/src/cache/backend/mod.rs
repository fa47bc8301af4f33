//! Relational engines the store can sit on.
//!
//! A backend only moves already-compressed bytes in and out of the cache
//! table. Compression, key coercion, tags, deadlines and cancellation live in
//! [`SqlStore`](super::store::SqlStore).

use async_trait::async_trait;

use crate::Error;

pub mod postgres;
pub mod sqlite;

pub use postgres::PgBackend;
pub use sqlite::SqliteBackend;

/// Row-level access to the cache table.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend-type identifier reported by the store.
    fn store_type(&self) -> &'static str;

    /// Stored bytes for `key`, or `None` if there is no row.
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Insert the row, or replace its value if the key exists.
    async fn upsert(&self, key: &str, value: &[u8]) -> Result<(), Error>;

    /// Remove the row for `key`. Returns the number of rows removed.
    async fn delete(&self, key: &str) -> Result<u64, Error>;

    /// Remove every row.
    async fn clear(&self) -> Result<(), Error>;

    /// Release the underlying connection(s).
    async fn close(&self) -> Result<(), Error>;
}

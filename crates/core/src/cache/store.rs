//! Store handle and the key/value and tag operations.
//!
//! [`SqlStore`] owns a [`Backend`] for its whole lifetime. Values are
//! compressed on the way in and decompressed on the way out; keys are coerced
//! with `Display`. Every backend call runs under the configured operation
//! deadline and is aborted with `Error::Cancelled` if the store is closed while
//! it is in flight.

use std::fmt::Display;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};

use super::backend::{Backend, PgBackend, SqliteBackend};
use super::contract::{CacheStore, InvalidateOptions, SetOptions};
use super::{codec, schema, tags};
use crate::Error;
use crate::config::StoreConfig;

/// Lifetime reported by `get_with_ttl` for every entry.
///
/// Entries never expire on their own; this is a reporting convention and says
/// nothing about when the entry was written.
pub const REPORTED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A cache store over one relational backend.
#[derive(Debug)]
pub struct SqlStore<B> {
    backend: B,
    compression_level: i32,
    operation_timeout: Duration,
    closed: watch::Sender<bool>,
    /// Held across the read and rewrite of a tag record.
    tag_lock: Mutex<()>,
}

/// Store backed by Postgres.
pub type PostgresStore = SqlStore<PgBackend>;

/// Store backed by embedded SQLite.
pub type SqliteStore = SqlStore<SqliteBackend>;

impl SqlStore<PgBackend> {
    /// Connect to Postgres.
    ///
    /// Parses the connection string, creates the table on a bootstrap
    /// connection, then opens the long-lived pool.
    ///
    /// # Errors
    ///
    /// `MalformedUri`, `MalformedAddress`, `MalformedQuery`, `SchemaInitFailed`,
    /// or `Connection` if the pool cannot be opened.
    pub async fn connect(conn_str: &str, config: &StoreConfig) -> Result<Self, Error> {
        let params = schema::bootstrap_postgres(conn_str, &config.table).await?;
        let backend = PgBackend::connect(conn_str, config).await?;

        tracing::info!(
            host = %params.host,
            port = params.port,
            database = %params.database,
            table = %config.table,
            "postgres cache store ready"
        );

        Ok(Self::with_backend(backend, config))
    }
}

impl SqlStore<SqliteBackend> {
    /// Open a SQLite database file.
    pub async fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self, Error> {
        let backend = SqliteBackend::open(path, &config.table).await?;
        Ok(Self::with_backend(backend, config))
    }

    /// Open a private in-memory SQLite database with default configuration.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let config = StoreConfig::default();
        let backend = SqliteBackend::open_in_memory(&config.table).await?;
        Ok(Self::with_backend(backend, &config))
    }
}

impl<B: Backend> SqlStore<B> {
    /// Wrap an already-open backend.
    pub fn with_backend(backend: B, config: &StoreConfig) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            backend,
            compression_level: config.compression_level,
            operation_timeout: config.operation_timeout(),
            closed,
            tag_lock: Mutex::new(()),
        }
    }

    /// Run one backend call under the deadline and the close signal.
    ///
    /// On timeout or close only the caller's future is dropped. A statement
    /// already handed to the SQLite worker thread or sent to the Postgres
    /// server still runs to completion, so a write that reports
    /// `DeadlineExceeded` or `Cancelled` may have been applied.
    async fn guarded<T, F>(&self, op: &'static str, call: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(Error::Closed);
        }

        tokio::select! {
            result = tokio::time::timeout(self.operation_timeout, call) => {
                result.map_err(|_| Error::DeadlineExceeded { op, timeout: self.operation_timeout })?
            }
            Ok(()) = closed.changed() => Err(Error::Cancelled),
        }
    }

    /// Value stored under `key`.
    ///
    /// A missing row and a zero-length value are both `NotFound`.
    pub async fn get<K: Display + Sync + ?Sized>(&self, key: &K) -> Result<Vec<u8>, Error> {
        let key = key.to_string();
        let stored = self.guarded("get", self.backend.fetch(&key)).await?;

        match stored {
            Some(bytes) if !bytes.is_empty() => codec::decompress(&bytes),
            _ => {
                tracing::debug!(key = %key, "cache miss");
                Err(Error::NotFound(key))
            }
        }
    }

    /// Value stored under `key` paired with [`REPORTED_TTL`].
    pub async fn get_with_ttl<K: Display + Sync + ?Sized>(&self, key: &K) -> Result<(Vec<u8>, Duration), Error> {
        let value = self.get(key).await?;
        Ok((value, REPORTED_TTL))
    }

    /// Compress and upsert `value` under `key`.
    ///
    /// With tags in `options`, the key is then appended to each tag record.
    pub async fn set<K: Display + Sync + ?Sized>(
        &self, key: &K, value: &[u8], options: SetOptions,
    ) -> Result<(), Error> {
        let key = key.to_string();
        if !options.tags.is_empty() {
            tags::check_taggable(&key)?;
        }

        let compressed = codec::compress(value, self.compression_level)?;
        self.guarded("set", self.backend.upsert(&key, &compressed)).await?;
        tracing::debug!(key = %key, raw_len = value.len(), stored_len = compressed.len(), "cache set");

        for tag in &options.tags {
            self.register_tag(tag, &key).await?;
        }

        Ok(())
    }

    /// Append `key` to the record stored under `tag`.
    ///
    /// Registrations made through this handle are serialized. Writers in other
    /// processes sharing the table are not.
    async fn register_tag(&self, tag: &str, key: &str) -> Result<(), Error> {
        let _guard = self.tag_lock.lock().await;
        let existing = match self.get(tag).await {
            Ok(record) => Some(record),
            Err(Error::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let record = tags::append_key(existing.as_deref(), key);
        let compressed = codec::compress(&record, self.compression_level)?;
        self.guarded("set", self.backend.upsert(tag, &compressed)).await
    }

    /// Remove `key` if present.
    pub async fn delete<K: Display + Sync + ?Sized>(&self, key: &K) -> Result<(), Error> {
        let key = key.to_string();
        let removed = self.guarded("delete", self.backend.delete(&key)).await?;
        tracing::debug!(key = %key, removed, "cache delete");
        Ok(())
    }

    /// Delete every key listed in each tag record, tag by tag.
    ///
    /// Tags that cannot be read are skipped (see
    /// [`best_effort_tag_lookup`](Self::best_effort_tag_lookup)); the first
    /// failed delete stops the whole invalidation and is returned. Tag records
    /// themselves are left in place.
    pub async fn invalidate(&self, options: InvalidateOptions) -> Result<(), Error> {
        for tag in &options.tags {
            let Some(record) = self.best_effort_tag_lookup(tag).await else {
                continue;
            };

            let keys = tags::decode_keys(&record);
            tracing::debug!(tag = %tag, keys = keys.len(), "invalidating tag");

            for key in &keys {
                self.delete(key.as_str()).await?;
            }
        }

        Ok(())
    }

    /// Read a tag record, treating any failure as "no record".
    ///
    /// Lookup errors are logged and swallowed so that an unreadable tag never
    /// fails an invalidation; delete errors are not treated this way.
    async fn best_effort_tag_lookup(&self, tag: &str) -> Option<Vec<u8>> {
        match self.get(tag).await {
            Ok(record) => Some(record),
            Err(Error::NotFound(_)) => None,
            Err(e) => {
                tracing::warn!(tag = %tag, error = %e, "tag lookup failed, skipping tag");
                None
            }
        }
    }

    /// Remove every entry.
    pub async fn clear(&self) -> Result<(), Error> {
        self.guarded("clear", self.backend.clear()).await?;
        tracing::info!(store = self.backend.store_type(), "cache cleared");
        Ok(())
    }

    pub fn store_type(&self) -> &'static str {
        self.backend.store_type()
    }

    /// Cancel in-flight operations and release the connection.
    ///
    /// Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), Error> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        tracing::info!(store = self.backend.store_type(), "closing cache store");
        self.backend.close().await
    }
}

#[async_trait]
impl<B: Backend> CacheStore for SqlStore<B> {
    async fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
        SqlStore::get(self, key).await
    }

    async fn get_with_ttl(&self, key: &str) -> Result<(Vec<u8>, Duration), Error> {
        SqlStore::get_with_ttl(self, key).await
    }

    async fn set(&self, key: &str, value: &[u8], options: SetOptions) -> Result<(), Error> {
        SqlStore::set(self, key, value, options).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        SqlStore::delete(self, key).await
    }

    async fn invalidate(&self, options: InvalidateOptions) -> Result<(), Error> {
        SqlStore::invalidate(self, options).await
    }

    async fn clear(&self) -> Result<(), Error> {
        SqlStore::clear(self).await
    }

    fn store_type(&self) -> &'static str {
        SqlStore::store_type(self)
    }

    async fn close(&self) -> Result<(), Error> {
        SqlStore::close(self).await
    }
}

//! Unified error types for pgcache.
//!
//! Construction-time errors (`Malformed*`, `SchemaInitFailed`) mean no store
//! handle was produced. `NotFound` is an ordinary cache miss. Driver errors are
//! carried verbatim; nothing here retries.

use std::time::Duration;

use tokio_rusqlite::rusqlite;

/// Unified error type for the cache store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection string is not a URI.
    #[error("MALFORMED_URI: {0}")]
    MalformedUri(String),

    /// The authority segment does not split into a host and a port.
    #[error("MALFORMED_ADDRESS: {0}")]
    MalformedAddress(String),

    /// The query component cannot be parsed or names an unknown SSL mode.
    #[error("MALFORMED_QUERY: {0}")]
    MalformedQuery(String),

    /// The backing table could not be verified or created.
    #[error("SCHEMA_INIT_FAILED: {0}")]
    SchemaInitFailed(String),

    /// No entry (or an empty entry) is stored under the key.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// A stored value is not a valid compressed frame.
    #[error("CORRUPT_PAYLOAD: {0}")]
    CorruptPayload(std::io::Error),

    /// The encoder failed while compressing a value.
    #[error("COMPRESS_FAILED: {0}")]
    Compress(std::io::Error),

    /// The key contains the tag delimiter and cannot be listed in a tag record.
    #[error("UNTAGGABLE_KEY: {0:?} contains ','")]
    UntaggableKey(String),

    /// Postgres driver or pool failure.
    #[error("CONNECTION_ERROR: {0}")]
    Connection(#[from] sqlx::Error),

    /// Embedded SQLite engine failure.
    #[error("DATABASE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// The store was closed while the operation was in flight.
    #[error("CANCELLED")]
    Cancelled,

    /// The operation did not complete within the configured deadline.
    #[error("DEADLINE_EXCEEDED: {op} after {timeout:?}")]
    DeadlineExceeded { op: &'static str, timeout: Duration },

    /// The store handle has been closed.
    #[error("CLOSED")]
    Closed,
}

impl Error {
    /// True for an ordinary cache miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

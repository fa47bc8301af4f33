//! Relational cache store with compressed values and tag invalidation.
//!
//! This module provides a cache-store adapter over a SQL table of
//! `(key, value)` rows. It supports:
//!
//! - Connection-string parsing with port and SSL-mode defaults
//! - Streaming zstd compression of every stored value
//! - Table bootstrap on a short-lived connection
//! - Tag records listing dependent keys, for bulk invalidation
//! - Postgres (pooled) and embedded SQLite backends

pub mod backend;
pub mod codec;
pub mod contract;
pub mod params;
pub mod schema;
pub mod store;
pub mod tags;

pub use crate::Error;

pub use backend::{Backend, PgBackend, SqliteBackend};
pub use contract::{CacheStore, InvalidateOptions, SetOptions};
pub use params::{ConnParams, SslMode};
pub use store::{PostgresStore, REPORTED_TTL, SqlStore, SqliteStore};

//! Relational cache store for pgcache.
//!
//! This crate provides:
//! - A Postgres-backed store implementing the cache-store contract
//! - An embedded SQLite store with the same behavior
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheStore, InvalidateOptions, PostgresStore, SetOptions, SqlStore, SqliteStore};
pub use config::StoreConfig;
pub use error::Error;

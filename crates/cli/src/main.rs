//! pgcache command-line entry point.
//!
//! Runs one cache operation against a store and exits. Values are written to
//! stdout; logging goes to stderr so output can be piped.

use std::io::Write;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pgcache_core::{CacheStore, InvalidateOptions, PostgresStore, SetOptions, SqliteStore, StoreConfig};
use tracing_subscriber::EnvFilter;

/// Inspect and maintain a pgcache store.
#[derive(Debug, Parser)]
#[command(name = "pgcache", version)]
struct Cli {
    /// Postgres connection URI; falls back to PGCACHE_DATABASE_URL.
    #[arg(long, global = true)]
    url: Option<String>,

    /// Use a SQLite database file instead of Postgres.
    #[arg(long, global = true, conflicts_with = "url")]
    sqlite: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the value stored under a key.
    Get { key: String },
    /// Print the value and its reported TTL in seconds.
    Ttl { key: String },
    /// Store a value, optionally registering the key under tags.
    Set {
        key: String,
        value: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Remove a key.
    Delete { key: String },
    /// Delete every key listed under the given tags.
    Invalidate {
        #[arg(long = "tag", required = true)]
        tags: Vec<String>,
    },
    /// Remove every entry.
    Clear,
    /// Create the backing table and exit.
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = StoreConfig::load()?;

    let store: Box<dyn CacheStore> = match &cli.sqlite {
        Some(path) => Box::new(SqliteStore::open(path, &config).await?),
        None => {
            let url = match cli.url.as_deref() {
                Some(url) => url,
                None => config.require_database_url()?,
            };
            Box::new(PostgresStore::connect(url, &config).await?)
        }
    };

    tracing::debug!(store = store.store_type(), "store opened");

    let outcome = run(store.as_ref(), cli.command).await;
    store.close().await.context("closing store")?;
    outcome
}

async fn run(store: &dyn CacheStore, command: Command) -> Result<()> {
    let mut stdout = std::io::stdout().lock();

    match command {
        Command::Get { key } => {
            let value = store.get(&key).await.with_context(|| format!("get {key}"))?;
            stdout.write_all(&value)?;
            writeln!(stdout)?;
        }
        Command::Ttl { key } => {
            let (_, ttl) = store.get_with_ttl(&key).await.with_context(|| format!("ttl {key}"))?;
            writeln!(stdout, "{}", ttl.as_secs())?;
        }
        Command::Set { key, value, tags } => {
            let options = SetOptions::default().with_tags(tags);
            store.set(&key, value.as_bytes(), options).await.with_context(|| format!("set {key}"))?;
        }
        Command::Delete { key } => {
            store.delete(&key).await.with_context(|| format!("delete {key}"))?;
        }
        Command::Invalidate { tags } => {
            store.invalidate(InvalidateOptions::tags(tags)).await.context("invalidate")?;
        }
        Command::Clear => {
            store.clear().await.context("clear")?;
        }
        Command::Init => {
            tracing::info!(store = store.store_type(), "table ready");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set_with_tags() {
        let cli = Cli::parse_from(["pgcache", "set", "k", "v", "--tag", "a", "--tag", "b"]);
        match cli.command {
            Command::Set { key, value, tags } => {
                assert_eq!(key, "k");
                assert_eq!(value, "v");
                assert_eq!(tags, vec!["a", "b"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_invalidate_requires_tag() {
        assert!(Cli::try_parse_from(["pgcache", "invalidate"]).is_err());
    }

    #[test]
    fn test_url_and_sqlite_conflict() {
        let result = Cli::try_parse_from(["pgcache", "--url", "postgres://h:1/db", "--sqlite", "x.db", "clear"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_against_sqlite() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        run(&store, Command::Set { key: "k".into(), value: "v".into(), tags: vec!["t".into()] })
            .await
            .unwrap();
        run(&store, Command::Invalidate { tags: vec!["t".into()] }).await.unwrap();
        assert!(run(&store, Command::Get { key: "k".into() }).await.is_err());
    }
}

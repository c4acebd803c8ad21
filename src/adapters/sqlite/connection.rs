//! SQLite connection pool setup for the checkpoint database.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to create connection pool: {0}")]
    PoolCreationFailed(#[source] sqlx::Error),

    #[error("Invalid database URL '{url}': {source}")]
    InvalidDatabaseUrl { url: String, #[source] source: sqlx::Error },

    #[error("Failed to create database directory '{path}': {source}")]
    DirectoryCreationFailed { path: String, #[source] source: std::io::Error },

    #[error("Database connection check failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),
}

/// Pool sizing knobs. Checkpoint commits are small writes, so the pool
/// stays modest even with many refinement workers.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(3),
        }
    }
}

/// Open a pool against `database_url`, creating the file and its parent
/// directory if needed.
///
/// WAL journaling keeps concurrent unit workers from blocking each other
/// on commits; the busy timeout covers the rare write-lock collision.
pub async fn create_pool(
    database_url: &str,
    config: Option<PoolConfig>,
) -> Result<SqlitePool, ConnectionError> {
    let config = config.unwrap_or_default();

    ensure_database_directory(database_url)?;

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| ConnectionError::InvalidDatabaseUrl {
            url: database_url.to_string(),
            source: e,
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(30));

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(ConnectionError::PoolCreationFailed)
}

/// In-memory pool for tests. A single shared-cache connection keeps every
/// query on the same database instance.
pub async fn create_test_pool() -> Result<SqlitePool, ConnectionError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| ConnectionError::InvalidDatabaseUrl {
            url: "sqlite::memory:".to_string(),
            source: e,
        })?
        .shared_cache(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(ConnectionError::PoolCreationFailed)
}

fn ensure_database_directory(database_url: &str) -> Result<(), ConnectionError> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);

    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConnectionError::DirectoryCreationFailed {
                    path: parent.display().to_string(),
                    source: e,
                }
            })?;
        }
    }

    Ok(())
}

/// Round-trip a trivial query to confirm the pool is usable.
pub async fn verify_connection(pool: &SqlitePool) -> Result<(), ConnectionError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(ConnectionError::ConnectionFailed)?;
    Ok(())
}

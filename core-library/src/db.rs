//! SQLite pool for the tracking store.
//!
//! [`create_pool`] opens (or creates) the database, applies the embedded
//! migrations and hands back a pool ready for the repositories. Tests use
//! [`create_test_pool`], which does the same against a private in-memory
//! database.

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

const IN_MEMORY_URL: &str = "sqlite::memory:";

/// Where the tracking store lives and how many connections may reach it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub database_url: String,
    /// Pool size
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// File-backed store at `database_path`, created on first open.
    pub fn new(database_path: impl AsRef<Path>) -> Self {
        Self {
            database_url: format!("sqlite:{}", database_path.as_ref().display()),
            max_connections: 5,
        }
    }

    /// Private in-memory store.
    ///
    /// Each connection to `:memory:` sees its own empty database, so the pool
    /// is pinned to a single connection.
    pub fn in_memory() -> Self {
        Self {
            database_url: IN_MEMORY_URL.to_string(),
            max_connections: 1,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_url == IN_MEMORY_URL
    }
}

/// Open the tracking store described by `config` and run pending migrations.
///
/// # Errors
///
/// Returns [`LibraryError::Database`] if the database cannot be opened and
/// [`LibraryError::Migration`] if the schema cannot be brought up to date.
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .create_if_missing(true);

    let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
    if config.is_in_memory() {
        // Dropping the last connection would drop the database with it
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to open tracking database");
            LibraryError::Database(e)
        })?;

    debug!(max_connections = config.max_connections, "Tracking database opened");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Migration failed");
            LibraryError::Migration(e.to_string())
        })?;

    info!("Tracking database schema is up to date");
    Ok(pool)
}

/// Migrated in-memory pool for tests.
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_pool(DatabaseConfig::in_memory()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config() {
        let config = DatabaseConfig::new("/var/lib/bookshelf/tracking.db").max_connections(8);

        assert_eq!(config.database_url, "sqlite:/var/lib/bookshelf/tracking.db");
        assert_eq!(config.max_connections, 8);
        assert!(!config.is_in_memory());
        assert!(DatabaseConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let pool = create_test_pool().await.unwrap();

        for table in ["books", "reading_sessions"] {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();

            assert_eq!(count, 1, "{} table should exist", table);
        }
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = create_test_pool().await.unwrap();

        let orphan_session = sqlx::query(
            "INSERT INTO reading_sessions (book_id, session_number, created_at, updated_at) \
             VALUES (404, 1, 0, 0)",
        )
        .execute(&pool)
        .await;

        assert!(orphan_session.is_err(), "Session without a book must be rejected");
    }

    #[tokio::test]
    async fn test_external_id_is_unique() {
        let pool = create_test_pool().await.unwrap();

        let insert = "INSERT INTO books (external_id, title, path, added_at, created_at, updated_at) \
                      VALUES (1, 'Dune', 'Frank Herbert/Dune (1)', 0, 0, 0)";
        sqlx::query(insert).execute(&pool).await.unwrap();
        let duplicate = sqlx::query(insert).execute(&pool).await;

        assert!(duplicate.is_err(), "Second row with the same external id must be rejected");
    }

    #[tokio::test]
    async fn test_file_store_uses_wal_and_survives_reopen() {
        let path = std::env::temp_dir().join(format!("core-library-db-{}.db", std::process::id()));

        let pool = create_pool(DatabaseConfig::new(&path)).await.unwrap();
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        pool.close().await;

        // Reopening an already-migrated store is a no-op for migrations
        let reopened = create_pool(DatabaseConfig::new(&path)).await.unwrap();
        reopened.close().await;

        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}

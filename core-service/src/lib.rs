//! Core service façade and bootstrap helpers.
//!
//! This crate wires the tracking database, repositories, event bus and the
//! library sync orchestrator together from a single [`CoreConfig`]. Hosts
//! provide the catalog through a [`CatalogSource`] implementation for each
//! sync and subscribe to [`CoreEvent`]s for progress.
//!
//! Logging is left to the host: call
//! [`core_runtime::logging::init_logging`] once before bootstrapping.
//!
//! ```rust,ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::{CoreService, SyncOptions};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/var/lib/bookshelf/tracking.db")
//!     .build()?;
//! let core = CoreService::bootstrap(config).await?;
//!
//! let result = core.sync(&catalog, SyncOptions::default()).await;
//! println!("{} new, {} updated", result.synced_count, result.updated_count);
//! ```

pub mod error;

pub use error::{CoreError, Result};
pub use core_sync::{SyncOptions, SyncResult};

use std::sync::Arc;

use bridge_traits::catalog::CatalogSource;
use chrono::{DateTime, Utc};
use core_library::{
    db::{create_pool, DatabaseConfig},
    repositories::{
        BookRepository, Page, PageRequest, ReadingSessionRepository, SqliteBookRepository,
        SqliteReadingSessionRepository,
    },
    BookSummary,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_sync::{LibrarySync, SyncConfig};
use sqlx::SqlitePool;
use tracing::info;

struct CoreInner {
    config: CoreConfig,
    books: Arc<dyn BookRepository>,
    sessions: Arc<dyn ReadingSessionRepository>,
    event_bus: EventBus,
    library_sync: LibrarySync,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<CoreInner>,
}

impl CoreService {
    /// Open the tracking database described by `config` and build the core.
    ///
    /// Migrations run as part of opening the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the database
    /// cannot be opened or migrated.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let db_config =
            DatabaseConfig::new(&config.database_path).max_connections(config.max_connections);
        let pool = create_pool(db_config).await.map_err(|e| {
            CoreError::InitializationFailed(format!(
                "Failed to open tracking database at {}: {}",
                config.database_path.display(),
                e
            ))
        })?;

        info!(
            database = %core_runtime::logging::strip_path(&config.database_path.to_string_lossy()),
            "Tracking database ready"
        );

        Self::with_pool(config, pool)
    }

    /// Build the core on an already-migrated connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_pool(config: CoreConfig, pool: SqlitePool) -> Result<Self> {
        config.validate()?;

        let books: Arc<dyn BookRepository> = Arc::new(SqliteBookRepository::new(pool.clone()));
        let sessions: Arc<dyn ReadingSessionRepository> =
            Arc::new(SqliteReadingSessionRepository::new(pool));
        let event_bus = EventBus::new(config.event_buffer_size);

        let library_sync = LibrarySync::new(
            SyncConfig::from(&config.sync),
            Arc::clone(&books),
            event_bus.clone(),
            Arc::clone(&config.clock),
        );

        Ok(Self {
            inner: Arc::new(CoreInner {
                config,
                books,
                sessions,
                event_bus,
                library_sync,
            }),
        })
    }

    /// Configuration the core was built with.
    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    /// Run one library sync pass with explicit options.
    pub async fn sync(&self, source: &dyn CatalogSource, options: SyncOptions) -> SyncResult {
        self.inner.library_sync.sync(source, options).await
    }

    /// Run one library sync pass with the configured defaults.
    pub async fn sync_with_defaults(&self, source: &dyn CatalogSource) -> SyncResult {
        let options = self.inner.library_sync.config().default_options();
        self.sync(source, options).await
    }

    /// Whether a sync pass is currently running.
    pub fn is_sync_in_progress(&self) -> bool {
        self.inner.library_sync.is_sync_in_progress()
    }

    /// Completion time of the last successful sync pass.
    pub async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.inner.library_sync.last_sync_time().await
    }

    /// Subscribe to sync and library events.
    pub fn events(&self) -> Receiver<CoreEvent> {
        self.inner.event_bus.subscribe()
    }

    /// Book repository backing the core.
    pub fn books(&self) -> Arc<dyn BookRepository> {
        Arc::clone(&self.inner.books)
    }

    /// Reading session repository backing the core.
    pub fn sessions(&self) -> Arc<dyn ReadingSessionRepository> {
        Arc::clone(&self.inner.sessions)
    }

    /// Orphaned books for host review, most recently orphaned first.
    pub async fn orphaned_books(&self, page_request: PageRequest) -> Result<Page<BookSummary>> {
        let page = self.inner.books.query_orphaned(page_request).await?;
        Ok(page.map(|book| BookSummary::from(&book)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::catalog::{ExternalRecord, InMemoryCatalog};
    use core_library::db::create_test_pool;
    use core_runtime::config::SyncSettings;
    use core_runtime::events::SyncEvent;

    fn catalog(ids: std::ops::RangeInclusive<i64>) -> InMemoryCatalog {
        InMemoryCatalog::new(
            ids.map(|id| {
                ExternalRecord::new(id, format!("Book {}", id), format!("Author/Book {}", id))
                    .with_authors("Author")
            })
            .collect(),
        )
    }

    async fn service(settings: SyncSettings) -> CoreService {
        let config = CoreConfig::builder()
            .database_path("unused.db")
            .sync_settings(settings)
            .build()
            .unwrap();
        let pool = create_test_pool().await.unwrap();
        CoreService::with_pool(config, pool).unwrap()
    }

    #[tokio::test]
    async fn test_sync_through_service() {
        let core = service(SyncSettings::default()).await;
        let mut events = core.events();

        let result = core.sync(&catalog(1..=4), SyncOptions::default()).await;

        assert!(result.success);
        assert_eq!(result.synced_count, 4);
        assert!(!core.is_sync_in_progress());
        assert!(core.last_sync_time().await.is_some());
        assert_eq!(core.books().count_tracked().await.unwrap(), 4);
        assert_eq!(core.sessions().count().await.unwrap(), 4);

        let first = events.try_recv().unwrap();
        assert!(matches!(first, CoreEvent::Sync(SyncEvent::Started { .. })));
    }

    #[tokio::test]
    async fn test_sync_with_defaults_uses_configured_settings() {
        let core = service(SyncSettings::default().with_detect_orphans(false)).await;
        core.sync_with_defaults(&catalog(1..=10)).await;

        let result = core.sync_with_defaults(&catalog(1..=5)).await;

        assert!(result.success);
        assert_eq!(result.removed_count, 0);
        assert_eq!(result.orphaned_books, None);
    }

    #[tokio::test]
    async fn test_configured_threshold_applies() {
        let core = service(SyncSettings::default().with_orphan_threshold(0.5)).await;
        core.sync(&catalog(1..=10), SyncOptions::default()).await;

        // 30% removal passes a 50% threshold
        let result = core.sync(&catalog(4..=10), SyncOptions::default()).await;
        assert!(result.success);
        assert_eq!(result.removed_count, 3);

        let orphans = core.orphaned_books(PageRequest::new(0, 10)).await.unwrap();
        assert_eq!(orphans.total, 3);
        assert_eq!(orphans.items[0].authors, vec!["Author".to_string()]);
    }

    #[tokio::test]
    async fn test_bootstrap_opens_database_file() {
        let path = std::env::temp_dir().join(format!(
            "bookshelf-core-bootstrap-{}.db",
            std::process::id()
        ));
        let config = CoreConfig::builder()
            .database_path(&path)
            .build()
            .unwrap();

        let core = CoreService::bootstrap(config).await.unwrap();
        let result = core.sync(&catalog(1..=2), SyncOptions::default()).await;
        assert!(result.success);

        drop(core);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}

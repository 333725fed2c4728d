//! # Configuration
//!
//! [`CoreConfig`] gathers what the service needs before it opens anything:
//! where the tracking store lives, how syncs behave by default and which
//! [`Clock`] stamps sync and orphan times.
//!
//! Building validates eagerly. A zero chunk size or an orphan threshold
//! outside `0.0..=1.0` is rejected here, not halfway through a sync.
//!
//! ```
//! use core_runtime::config::{CoreConfig, SyncSettings};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/var/lib/bookshelf/tracking.db")
//!     .sync_settings(SyncSettings::default().with_chunk_size(250))
//!     .build()?;
//!
//! assert_eq!(config.sync.chunk_size, 250);
//! assert!(config.sync.detect_orphans);
//! # Ok::<(), core_runtime::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, SystemClock};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Catalog records fetched and persisted per chunk unless overridden.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Share of tracked books one sync may orphan unless overridden.
pub const DEFAULT_ORPHAN_THRESHOLD: f64 = 0.10;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone)]
pub struct CoreConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub sync: SyncSettings,
    pub event_buffer_size: usize,
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("max_connections", &self.max_connections)
            .field("sync", &self.sync)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("clock", &"Clock { ... }")
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Reject settings the service cannot run with.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(config_error("Database path cannot be empty"));
        }
        if self.max_connections == 0 {
            return Err(config_error("Database pool needs at least one connection"));
        }
        if self.event_buffer_size == 0 {
            return Err(config_error("Event buffer size must be greater than 0"));
        }

        self.sync.validate()
    }
}

/// Defaults for library syncs; a single run may override them through its
/// sync options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    pub chunk_size: usize,
    pub detect_orphans: bool,
    /// Largest share of tracked books (0.0-1.0) one sync may mark orphaned.
    /// Beyond it the catalog is assumed truncated and the orphan phase is
    /// refused.
    pub orphan_threshold: f64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            detect_orphans: true,
            orphan_threshold: DEFAULT_ORPHAN_THRESHOLD,
        }
    }
}

impl SyncSettings {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_detect_orphans(mut self, detect: bool) -> Self {
        self.detect_orphans = detect;
        self
    }

    pub fn with_orphan_threshold(mut self, threshold: f64) -> Self {
        self.orphan_threshold = threshold;
        self
    }

    /// # Errors
    ///
    /// [`Error::Config`] if the chunk size is zero or the threshold is not a
    /// finite value in `0.0..=1.0`.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(config_error("Sync chunk size must be greater than 0"));
        }

        let threshold = self.orphan_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "Orphan threshold must be between 0.0 and 1.0, got {}",
                threshold
            )));
        }

        Ok(())
    }
}

fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Builder for [`CoreConfig`]; only the database path is required.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    max_connections: Option<u32>,
    sync: Option<SyncSettings>,
    event_buffer_size: Option<usize>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    /// SQLite file holding the tracking store; created on first open.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Pool size, 5 by default.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = Some(settings);
        self
    }

    /// Per-subscriber event buffer, [`DEFAULT_EVENT_BUFFER_SIZE`] by default.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Time source; [`SystemClock`] when not set.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # Errors
    ///
    /// [`Error::Config`] if no database path was given or
    /// [`CoreConfig::validate`] fails.
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            config_error(
                "Database path is required. Call .database_path() with the location \
                 of the tracking database.",
            )
        })?;

        let config = CoreConfig {
            database_path,
            max_connections: self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
            sync: self.sync.unwrap_or_default(),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };
        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        }
    }

    fn builder() -> CoreConfigBuilder {
        CoreConfig::builder().database_path("tracking.db")
    }

    #[test]
    fn test_database_path_is_required() {
        let err = CoreConfig::builder().build().unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("Database path is required"));
    }

    #[test]
    fn test_defaults() {
        let config = CoreConfig::builder()
            .database_path("/data/tracking.db")
            .build()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/data/tracking.db"));
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.sync, SyncSettings::default());
        assert_eq!(config.sync.orphan_threshold, DEFAULT_ORPHAN_THRESHOLD);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
    }

    #[test]
    fn test_sync_settings_override() {
        let settings = SyncSettings::default()
            .with_chunk_size(100)
            .with_detect_orphans(false)
            .with_orphan_threshold(0.25);

        let config = builder().sync_settings(settings).build().unwrap();

        assert_eq!(config.sync.chunk_size, 100);
        assert!(!config.sync.detect_orphans);
        assert_eq!(config.sync.orphan_threshold, 0.25);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let err = builder()
            .sync_settings(SyncSettings::default().with_chunk_size(0))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("chunk size"));
    }

    #[test]
    fn test_orphan_threshold_bounds() {
        for threshold in [-0.1, 1.5, f64::NAN, f64::INFINITY] {
            let settings = SyncSettings::default().with_orphan_threshold(threshold);
            assert!(settings.validate().is_err(), "{} accepted", threshold);
        }

        for threshold in [0.0, 1.0] {
            let settings = SyncSettings::default().with_orphan_threshold(threshold);
            assert!(settings.validate().is_ok(), "{} rejected", threshold);
        }
    }

    #[test]
    fn test_empty_path_and_zero_sizes_are_rejected() {
        assert!(CoreConfig::builder().database_path("").build().is_err());
        assert!(builder().max_connections(0).build().is_err());
        assert!(builder().event_buffer_size(0).build().is_err());
    }

    #[test]
    fn test_injected_clock() {
        let config = builder().clock(Arc::new(FixedClock)).build().unwrap();

        assert_eq!(config.clock.unix_timestamp(), 1_704_067_200);
        assert!(format!("{:?}", config).contains("Clock { ... }"));
    }
}

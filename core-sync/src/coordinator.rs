//! # Library Sync
//!
//! Reconciles an external book catalog into the local tracking store.
//!
//! ## Overview
//!
//! `LibrarySync` is the single entry point for catalog synchronization. One
//! pass:
//! 1. Rejects the call if another pass on the same instance is running
//! 2. Fetches the catalog chunk by chunk (paginated when the source reports a
//!    count, otherwise one fetch processed in slices)
//! 3. Fetches tags for exactly the records of each chunk
//! 4. Normalizes records and splits them into new and already-tracked books
//! 5. Inserts new books together with their bootstrap reading session and
//!    updates tracked books in place, so the identity sequence only advances
//!    for new rows
//! 6. Aborts before any write if the catalog turned out to be empty
//! 7. Marks tracked books missing from the catalog as orphaned, unless the
//!    orphan safety guard considers the share too large
//!
//! Every outcome, including failures, is reported as a [`SyncResult`];
//! `sync` itself never fails. Progress is broadcast on the [`EventBus`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{LibrarySync, SyncConfig, SyncOptions};
//!
//! let library_sync = LibrarySync::new(
//!     SyncConfig::default(),
//!     books,
//!     event_bus,
//!     clock,
//! );
//!
//! let result = library_sync.sync(&catalog, SyncOptions::default()).await;
//! if !result.success {
//!     eprintln!("sync failed: {:?}", result.error);
//! }
//! ```

use crate::{
    normalizer::normalize_record,
    orphan_guard::{OrphanDecision, OrphanGuard},
    result::{SyncOptions, SyncResult},
    Result, SyncError,
};
use bridge_traits::{
    catalog::{CatalogSource, ExternalRecord, PageWindow},
    time::Clock,
};
use chrono::{DateTime, Utc};
use core_library::{
    repositories::BookRepository,
    BookSummary, NewBook, TrackedBook,
};
use core_runtime::config::{SyncSettings, DEFAULT_CHUNK_SIZE, DEFAULT_ORPHAN_THRESHOLD};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, SyncEvent};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

/// Library sync configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Largest share (0.0-1.0) of tracked books one pass may orphan
    pub orphan_threshold: f64,

    /// Chunk size used by [`SyncConfig::default_options`]
    pub default_chunk_size: usize,

    /// Orphan detection used by [`SyncConfig::default_options`]
    pub detect_orphans: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            orphan_threshold: DEFAULT_ORPHAN_THRESHOLD,
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            detect_orphans: true,
        }
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            orphan_threshold: settings.orphan_threshold,
            default_chunk_size: settings.chunk_size,
            detect_orphans: settings.detect_orphans,
        }
    }
}

impl SyncConfig {
    /// Options for a pass that follows the configured defaults.
    pub fn default_options(&self) -> SyncOptions {
        SyncOptions {
            detect_orphans: self.detect_orphans,
            chunk_size: self.default_chunk_size,
        }
    }
}

/// Clears the in-progress flag when dropped, on every exit path.
struct InProgressGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InProgressGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Counters accumulated while chunks are persisted.
#[derive(Debug, Default)]
struct IngestTally {
    observed: HashSet<i64>,
    records_processed: u64,
    created: u64,
    updated: u64,
    skipped: u64,
}

/// How the catalog is walked for one pass.
enum FetchPlan {
    /// Source reports a count; fetch `limit/offset` windows.
    Paginated { total: u64 },
    /// Source can only return everything at once.
    Unpaginated,
}

/// Orchestrates catalog-to-tracking-store synchronization
pub struct LibrarySync {
    /// Configuration
    config: SyncConfig,

    /// Safety policy for the orphan phase
    guard: OrphanGuard,

    /// Book persistence
    books: Arc<dyn BookRepository>,

    /// Event bus for progress and library events
    event_bus: EventBus,

    /// Time source for sync and orphan timestamps
    clock: Arc<dyn Clock>,

    /// Set while a pass is running on this instance
    in_progress: AtomicBool,

    /// Completion time of the last successful pass
    last_sync: RwLock<Option<DateTime<Utc>>>,
}

impl LibrarySync {
    /// Create a new library sync orchestrator
    ///
    /// # Arguments
    ///
    /// * `config` - Sync configuration
    /// * `books` - Book repository
    /// * `event_bus` - Event bus for emitting sync progress events
    /// * `clock` - Time source
    pub fn new(
        config: SyncConfig,
        books: Arc<dyn BookRepository>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            guard: OrphanGuard::new(config.orphan_threshold),
            config,
            books,
            event_bus,
            clock,
            in_progress: AtomicBool::new(false),
            last_sync: RwLock::new(None),
        }
    }

    /// Configuration this orchestrator was built with
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether a pass is currently running on this instance
    pub fn is_sync_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Completion time of the last successful pass
    pub async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read().await
    }

    /// Run one sync pass against `source`.
    ///
    /// A call made while another pass is running on this instance returns
    /// immediately with `success == false` and does no work.
    #[instrument(
        name = "library_sync",
        skip(self, source, options),
        fields(
            run_id = tracing::field::Empty,
            chunk_size = options.chunk_size,
            detect_orphans = options.detect_orphans
        )
    )]
    pub async fn sync(&self, source: &dyn CatalogSource, options: SyncOptions) -> SyncResult {
        let started = Instant::now();

        let Some(_in_progress) = InProgressGuard::acquire(&self.in_progress) else {
            warn!("Library sync requested while another sync is running");
            return SyncResult::failure(SyncError::SyncInProgress.to_string(), 0);
        };

        let run_id = Uuid::new_v4().to_string();
        Span::current().record("run_id", run_id.as_str());

        let options = Self::effective_options(options);

        info!("Starting library sync");
        self.event_bus.emit(CoreEvent::Sync(SyncEvent::Started {
            run_id: run_id.clone(),
            detect_orphans: options.detect_orphans,
            chunk_size: options.chunk_size,
        }));

        // Denominator for the orphan guard, before this pass adds anything
        let tracked_before = if options.detect_orphans {
            match self.books.count_tracked().await {
                Ok(count) => Some(count),
                Err(e) => return self.fail(&run_id, e.into(), started),
            }
        } else {
            None
        };

        // Phases 1-3: fetch, classify and persist
        let tally = match self.ingest(source, &options, &run_id).await {
            Ok(tally) => tally,
            Err(e) => return self.fail(&run_id, e, started),
        };

        let mut result = SyncResult {
            success: true,
            synced_count: tally.created,
            updated_count: tally.updated,
            skipped_count: tally.skipped,
            total_books: tally.observed.len() as u64,
            ..Default::default()
        };

        // Phase 4: orphan detection
        if let Some(tracked_before) = tracked_before {
            info!("Phase 4: Detecting orphaned books");
            match self.detect_orphans(&tally.observed, tracked_before).await {
                Ok(orphaned) => {
                    result.removed_count = orphaned.len() as u64;
                    result.orphaned_books = Some(orphaned);
                }
                Err(e @ SyncError::OrphanThresholdExceeded { .. }) => {
                    warn!(error = %e, "Orphan phase rejected by safety guard");
                    result.success = false;
                    result.error = Some(e.to_string());
                    result.duration_ms = elapsed_ms(started);
                    self.event_bus.emit(CoreEvent::Sync(SyncEvent::Failed {
                        run_id,
                        message: e.to_string(),
                        recoverable: e.is_recoverable(),
                    }));
                    return result;
                }
                Err(e) => return self.fail(&run_id, e, started),
            }
        } else {
            debug!("Orphan detection disabled for this sync");
        }

        result.duration_ms = elapsed_ms(started);
        *self.last_sync.write().await = Some(self.clock.now());

        info!(
            created = result.synced_count,
            updated = result.updated_count,
            orphaned = result.removed_count,
            skipped = result.skipped_count,
            total = result.total_books,
            duration_ms = result.duration_ms,
            "Library sync completed"
        );

        self.event_bus.emit(CoreEvent::Sync(SyncEvent::Completed {
            run_id,
            created: result.synced_count,
            updated: result.updated_count,
            orphaned: result.removed_count,
            total_records: result.total_books,
            duration_ms: result.duration_ms,
        }));

        result
    }

    fn effective_options(options: SyncOptions) -> SyncOptions {
        if options.chunk_size == 0 {
            warn!("Chunk size 0 requested, using 1");
            return options.with_chunk_size(1);
        }
        options
    }

    fn fail(&self, run_id: &str, e: SyncError, started: Instant) -> SyncResult {
        error!(error = %e, "Library sync failed");

        self.event_bus.emit(CoreEvent::Sync(SyncEvent::Failed {
            run_id: run_id.to_string(),
            message: e.to_string(),
            recoverable: e.is_recoverable(),
        }));

        SyncResult::failure(e.to_string(), elapsed_ms(started))
    }

    /// Fetch the catalog chunk by chunk and persist each chunk as it arrives.
    async fn ingest(
        &self,
        source: &dyn CatalogSource,
        options: &SyncOptions,
        run_id: &str,
    ) -> Result<IngestTally> {
        let capabilities = source.capabilities();
        let chunk_size = options.chunk_size;
        let mut tally = IngestTally::default();

        info!("Phase 1: Fetching catalog");
        let plan = if capabilities.count {
            let total = source.get_books_count().await?;
            debug!(total, "Catalog reports book count");
            FetchPlan::Paginated { total }
        } else {
            FetchPlan::Unpaginated
        };

        info!("Phase 2: Classifying and persisting chunks");
        match plan {
            FetchPlan::Paginated { total } => {
                if total == 0 {
                    return Err(SyncError::EmptySource);
                }

                let mut offset = 0usize;
                let mut chunk_index = 0u64;
                while (offset as u64) < total {
                    let records = source
                        .get_all_books(Some(PageWindow::new(chunk_size, offset)))
                        .await?;
                    if records.is_empty() {
                        break;
                    }

                    offset += chunk_size;
                    self.process_chunk(source, records, capabilities.batch_tags, &mut tally)
                        .await?;
                    self.emit_progress(run_id, chunk_index, &tally, Some(total));
                    chunk_index += 1;
                }
            }
            FetchPlan::Unpaginated => {
                let records = source.get_all_books(None).await?;
                debug!(total = records.len(), "Fetched unpaginated catalog");

                let total = records.len() as u64;
                for (chunk_index, chunk) in records.chunks(chunk_size).enumerate() {
                    self.process_chunk(source, chunk.to_vec(), capabilities.batch_tags, &mut tally)
                        .await?;
                    self.emit_progress(run_id, chunk_index as u64, &tally, Some(total));
                }
            }
        }

        // Nothing was written yet if the very first fetch came back empty
        if tally.observed.is_empty() {
            return Err(SyncError::EmptySource);
        }

        info!(
            observed = tally.observed.len(),
            created = tally.created,
            updated = tally.updated,
            skipped = tally.skipped,
            "Catalog ingested"
        );

        Ok(tally)
    }

    /// Classify and persist one chunk of catalog records.
    async fn process_chunk(
        &self,
        source: &dyn CatalogSource,
        records: Vec<ExternalRecord>,
        batch_tags: bool,
        tally: &mut IngestTally,
    ) -> Result<()> {
        tally.records_processed += records.len() as u64;

        let records = dedupe_records(records);
        let external_ids: Vec<i64> = records.iter().map(|record| record.id).collect();
        tally.observed.extend(external_ids.iter().copied());

        let mut tags = self.fetch_tags(source, &external_ids, batch_tags).await?;

        let mut books = Vec::with_capacity(records.len());
        for record in &records {
            let record_tags = tags.remove(&record.id).unwrap_or_default();
            match normalize_record(record, record_tags) {
                Ok(book) => books.push(book),
                Err(e) => {
                    warn!(error = %e, "Skipping catalog record");
                    tally.skipped += 1;
                }
            }
        }

        if books.is_empty() {
            return Ok(());
        }

        let lookup_ids: Vec<i64> = books.iter().map(|book| book.external_id).collect();
        let existing: HashMap<i64, TrackedBook> = self
            .books
            .find_by_external_ids(&lookup_ids)
            .await?
            .into_iter()
            .filter_map(|book| book.external_id.map(|external_id| (external_id, book)))
            .collect();

        let (to_update, to_insert): (Vec<NewBook>, Vec<NewBook>) = books
            .into_iter()
            .partition(|book| existing.contains_key(&book.external_id));

        let restored: Vec<i64> = to_update
            .iter()
            .filter_map(|book| existing.get(&book.external_id))
            .filter(|tracked| tracked.is_orphaned)
            .map(|tracked| tracked.id)
            .collect();

        let now = self.clock.unix_timestamp();

        if !to_insert.is_empty() {
            let inserted = self.books.bulk_insert(&to_insert, now).await?;
            let book_ids: Vec<i64> = inserted.iter().map(|book| book.id).collect();

            tally.created += inserted.len() as u64;
            self.event_bus.emit(CoreEvent::Library(LibraryEvent::BooksAdded { book_ids }));
        }

        if !to_update.is_empty() {
            tally.updated += self.books.bulk_update(&to_update, now).await?;
        }

        if !restored.is_empty() {
            info!(count = restored.len(), "Restored previously orphaned books");
            self.event_bus.emit(CoreEvent::Library(LibraryEvent::BooksRestored {
                book_ids: restored,
            }));
        }

        debug!(
            records = records.len(),
            inserted = to_insert.len(),
            updated = to_update.len(),
            "Chunk persisted"
        );

        Ok(())
    }

    /// Tags for exactly `external_ids`, batched when the source allows it.
    async fn fetch_tags(
        &self,
        source: &dyn CatalogSource,
        external_ids: &[i64],
        batch_tags: bool,
    ) -> Result<HashMap<i64, Vec<String>>> {
        if batch_tags {
            return Ok(source.get_all_book_tags(external_ids).await?);
        }

        let mut tags = HashMap::with_capacity(external_ids.len());
        for external_id in external_ids {
            tags.insert(*external_id, source.get_book_tags(*external_id).await?);
        }
        Ok(tags)
    }

    /// Mark tracked books missing from `observed` as orphaned, if the guard allows.
    ///
    /// The guard weighs the candidates against `tracked_before`, the tracked
    /// count taken before this pass inserted or restored anything, so books
    /// added by the same pass cannot dilute a mass removal.
    async fn detect_orphans(
        &self,
        observed: &HashSet<i64>,
        tracked_before: u64,
    ) -> Result<Vec<BookSummary>> {
        let candidates = self.books.find_not_in_external_id_set(observed).await?;
        if candidates.is_empty() {
            debug!("No orphan candidates");
            return Ok(Vec::new());
        }

        let total = tracked_before;
        let candidate_count = candidates.len() as u64;

        if let OrphanDecision::Reject { percentage } = self.guard.decide(candidate_count, total) {
            return Err(SyncError::OrphanThresholdExceeded {
                candidates: candidate_count,
                total,
                percentage,
            });
        }

        let ids: Vec<i64> = candidates.iter().map(|book| book.id).collect();
        let marked = self
            .books
            .mark_orphaned(&ids, self.clock.unix_timestamp())
            .await?;

        info!(candidates = candidate_count, marked, total, "Marked books as orphaned");

        self.event_bus.emit(CoreEvent::Library(LibraryEvent::BooksOrphaned {
            book_ids: ids,
        }));

        Ok(candidates.iter().map(BookSummary::from).collect())
    }

    fn emit_progress(&self, run_id: &str, chunk_index: u64, tally: &IngestTally, total: Option<u64>) {
        let percent = match total {
            Some(total) if total > 0 => {
                (tally.records_processed.saturating_mul(100) / total).min(100) as u8
            }
            _ => 0,
        };

        debug!(
            chunk_index,
            records_processed = tally.records_processed,
            percent,
            "Sync progress"
        );

        self.event_bus.emit(CoreEvent::Sync(SyncEvent::Progress {
            run_id: run_id.to_string(),
            chunk_index,
            records_processed: tally.records_processed,
            total_records: total,
            percent,
        }));
    }
}

/// Collapse repeated external ids within one chunk; the last occurrence wins
/// and keeps the position of the first.
fn dedupe_records(records: Vec<ExternalRecord>) -> Vec<ExternalRecord> {
    let mut positions: HashMap<i64, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<ExternalRecord> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(&record.id) {
            Some(&position) => {
                warn!(external_id = record.id, "Duplicate external id in catalog chunk");
                unique[position] = record;
            }
            None => {
                positions.insert(record.id, unique.len());
                unique.push(record);
            }
        }
    }

    unique
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_keeps_last_occurrence() {
        let records = vec![
            ExternalRecord::new(1, "First draft", "a"),
            ExternalRecord::new(2, "Other", "b"),
            ExternalRecord::new(1, "Final", "c"),
        ];

        let unique = dedupe_records(records);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].id, 1);
        assert_eq!(unique[0].title, "Final");
        assert_eq!(unique[1].id, 2);
    }

    #[test]
    fn test_in_progress_guard_is_exclusive() {
        let flag = AtomicBool::new(false);

        let guard = InProgressGuard::acquire(&flag);
        assert!(guard.is_some());
        assert!(InProgressGuard::acquire(&flag).is_none());

        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(InProgressGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_sync_config_from_settings() {
        let settings = SyncSettings::default()
            .with_chunk_size(50)
            .with_detect_orphans(false)
            .with_orphan_threshold(0.2);

        let config = SyncConfig::from(&settings);

        assert_eq!(config.orphan_threshold, 0.2);
        assert_eq!(
            config.default_options(),
            SyncOptions {
                detect_orphans: false,
                chunk_size: 50
            }
        );
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let options = LibrarySync::effective_options(SyncOptions::default().with_chunk_size(0));
        assert_eq!(options.chunk_size, 1);
    }
}

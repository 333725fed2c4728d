//! Sync options and results

use core_library::BookSummary;
use core_runtime::config::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};

/// Per-call sync options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    /// Run the orphan phase after all chunks are persisted
    pub detect_orphans: bool,
    /// Catalog records fetched and persisted per chunk
    pub chunk_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            detect_orphans: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SyncOptions {
    pub fn with_detect_orphans(mut self, detect: bool) -> Self {
        self.detect_orphans = detect;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Outcome of one sync pass, returned to the caller and never persisted.
///
/// `success == false` means no destructive change was made. Inserts and
/// updates applied before an orphan-phase rejection are kept and still
/// counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    /// Books created
    pub synced_count: u64,
    /// Books updated in place
    pub updated_count: u64,
    /// Books marked orphaned
    pub removed_count: u64,
    /// Catalog records rejected by normalization
    pub skipped_count: u64,
    /// Distinct catalog records observed
    pub total_books: u64,
    /// Books orphaned by this pass, when the orphan phase ran and was applied
    pub orphaned_books: Option<Vec<BookSummary>>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl SyncResult {
    /// A failed pass with every count at zero.
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            duration_ms,
            ..Default::default()
        }
    }
}

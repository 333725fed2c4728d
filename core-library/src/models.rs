//! Domain models for the tracking store
//!
//! Rows mirrored from the external catalog, the values the sync engine writes
//! into them, and the reading sessions users own.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

// =============================================================================
// Books
// =============================================================================

/// A book tracked locally.
///
/// `id` is assigned from the store's identity sequence on first insert and
/// never changes. `external_id` links the row to the catalog record it
/// mirrors and is unique when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TrackedBook {
    /// Internal identifier
    pub id: i64,
    /// Catalog identifier (`None` for books created locally)
    pub external_id: Option<i64>,

    // Mirrored metadata
    pub title: String,
    #[sqlx(json)]
    pub authors: Vec<String>,
    /// Location of the book inside the catalog's library
    pub path: String,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub series: Option<String>,
    pub series_index: Option<f64>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub pubdate: Option<NaiveDate>,
    pub has_cover: bool,
    #[sqlx(json)]
    pub tags: Vec<String>,
    /// Last modification time reported by the catalog
    pub external_modified_at: Option<i64>,

    // Sync bookkeeping
    /// Set when the catalog no longer contains `external_id`
    pub is_orphaned: bool,
    pub orphaned_at: Option<i64>,
    pub last_synced_at: Option<i64>,

    // Timestamps
    /// When the book entered the tracking store
    pub added_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Catalog-owned fields for one book, as produced by record normalization.
///
/// The same value feeds inserts and in-place updates; nothing in here touches
/// user-owned columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewBook {
    pub external_id: i64,
    pub title: String,
    pub authors: Vec<String>,
    pub path: String,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub series: Option<String>,
    pub series_index: Option<f64>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub pubdate: Option<NaiveDate>,
    pub has_cover: bool,
    pub tags: Vec<String>,
    pub external_modified_at: Option<i64>,
}

impl NewBook {
    /// Validate book data
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err(format!(
                "Book title cannot be empty (external id {})",
                self.external_id
            ));
        }

        if let Some(rating) = self.rating {
            if !rating.is_finite() {
                return Err(format!(
                    "Book rating must be finite (external id {})",
                    self.external_id
                ));
            }
        }

        Ok(())
    }
}

/// Compact view of a book, returned to hosts after a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: i64,
    pub external_id: Option<i64>,
    pub title: String,
    pub authors: Vec<String>,
}

impl From<&TrackedBook> for BookSummary {
    fn from(book: &TrackedBook) -> Self {
        Self {
            id: book.id,
            external_id: book.external_id,
            title: book.title.clone(),
            authors: book.authors.clone(),
        }
    }
}

// =============================================================================
// Reading sessions
// =============================================================================

/// Progress state of a reading session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReadingStatus {
    Unread,
    Reading,
    Finished,
    Abandoned,
}

impl Default for ReadingStatus {
    fn default() -> Self {
        Self::Unread
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Unread => "unread",
            Self::Reading => "reading",
            Self::Finished => "finished",
            Self::Abandoned => "abandoned",
        };
        f.write_str(status)
    }
}

/// One reading attempt of a tracked book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ReadingSession {
    pub id: i64,
    pub book_id: i64,
    /// 1-based attempt counter, unique per book
    pub session_number: i64,
    pub status: ReadingStatus,
    pub is_active: bool,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ReadingSession {
    /// Session number of the session created when a book is first tracked.
    pub const BOOTSTRAP_SESSION_NUMBER: i64 = 1;
}

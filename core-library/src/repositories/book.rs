//! Book repository trait and implementation
//!
//! Persistence for catalog-mirrored books. Writes are batched per sync chunk
//! and keep the identity sequence stable: inserts are only issued for
//! external ids that have no row yet, and existing rows are changed with a
//! plain `UPDATE` (never `INSERT OR REPLACE`, which would delete and re-insert
//! the row under a fresh id).

use crate::error::{LibraryError, Result};
use crate::models::{NewBook, TrackedBook};
use crate::repositories::reading_session::insert_bootstrap_sessions;
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{query_as, QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashSet;
use tracing::debug;

/// Upper bound on bound parameters per `IN (...)` lookup.
const MAX_LOOKUP_BATCH: usize = 900;

/// Book repository interface for data access operations
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Find a book by its internal ID
    async fn find_by_id(&self, id: i64) -> Result<Option<TrackedBook>>;

    /// Find a book by its catalog identifier
    ///
    /// # Returns
    /// - `Ok(Some(book))` if tracked
    /// - `Ok(None)` if the external id has never been seen
    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<TrackedBook>>;

    /// Find every tracked book whose catalog identifier is in `external_ids`
    ///
    /// Ids without a row are simply absent from the result; order is
    /// unspecified.
    async fn find_by_external_ids(&self, external_ids: &[i64]) -> Result<Vec<TrackedBook>>;

    /// Insert brand-new books in one transaction
    ///
    /// Each book gets its bootstrap reading session in the same transaction,
    /// so either both rows exist or neither does. The identity sequence
    /// advances by exactly `books.len()`.
    ///
    /// # Errors
    /// Returns error if:
    /// - Any book fails validation (nothing is written)
    /// - An external id is already tracked
    /// - Database error occurs
    async fn bulk_insert(&self, books: &[NewBook], now: i64) -> Result<Vec<TrackedBook>>;

    /// Update existing books in place, matched by external id, in one transaction
    ///
    /// Catalog-owned columns are overwritten, `last_synced_at` is set to
    /// `now` and any orphan flag is cleared. `id`, `added_at` and reading
    /// sessions are left alone.
    ///
    /// # Returns
    /// Number of rows updated. Books without a row are skipped, not inserted.
    async fn bulk_update(&self, books: &[NewBook], now: i64) -> Result<u64>;

    /// Non-orphaned books with an external id outside `observed`
    ///
    /// An empty `observed` set always yields an empty result so that an empty
    /// catalog can never mark the whole library as removed.
    async fn find_not_in_external_id_set(
        &self,
        observed: &HashSet<i64>,
    ) -> Result<Vec<TrackedBook>>;

    /// Flag books as orphaned, stamping `orphaned_at` with `now`
    ///
    /// Books are never deleted. Already-orphaned books keep their original
    /// timestamp.
    ///
    /// # Returns
    /// Number of books newly orphaned
    async fn mark_orphaned(&self, ids: &[i64], now: i64) -> Result<u64>;

    /// Count non-orphaned books linked to the catalog
    async fn count_tracked(&self) -> Result<u64>;

    /// Current value of the identity sequence (0 before the first insert)
    async fn identity_sequence(&self) -> Result<i64>;

    /// Query orphaned books with pagination, most recently orphaned first
    async fn query_orphaned(&self, page_request: PageRequest) -> Result<Page<TrackedBook>>;
}

/// SQLite implementation of BookRepository
pub struct SqliteBookRepository {
    pool: SqlitePool,
}

impl SqliteBookRepository {
    /// Create a new SQLite book repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepository for SqliteBookRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<TrackedBook>> {
        let book = query_as::<_, TrackedBook>("SELECT * FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(book)
    }

    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<TrackedBook>> {
        let book = query_as::<_, TrackedBook>("SELECT * FROM books WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(book)
    }

    async fn find_by_external_ids(&self, external_ids: &[i64]) -> Result<Vec<TrackedBook>> {
        let mut books = Vec::with_capacity(external_ids.len());

        for batch in external_ids.chunks(MAX_LOOKUP_BATCH) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT * FROM books WHERE external_id IN (");
            let mut separated = builder.separated(", ");
            for external_id in batch {
                separated.push_bind(*external_id);
            }
            separated.push_unseparated(")");

            let rows = builder
                .build_query_as::<TrackedBook>()
                .fetch_all(&self.pool)
                .await?;
            books.extend(rows);
        }

        Ok(books)
    }

    async fn bulk_insert(&self, books: &[NewBook], now: i64) -> Result<Vec<TrackedBook>> {
        if books.is_empty() {
            return Ok(Vec::new());
        }

        for book in books {
            book.validate().map_err(|msg| LibraryError::InvalidInput {
                field: "book".to_string(),
                message: msg,
            })?;
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(books.len());

        for book in books {
            let row = query_as::<_, TrackedBook>(
                r#"
                INSERT INTO books (
                    external_id, title, authors, path,
                    isbn, publisher, series, series_index,
                    description, rating, pubdate, has_cover,
                    tags, external_modified_at,
                    is_orphaned, orphaned_at, last_synced_at,
                    added_at, created_at, updated_at
                ) VALUES (
                    ?, ?, ?, ?,
                    ?, ?, ?, ?,
                    ?, ?, ?, ?,
                    ?, ?,
                    0, NULL, ?,
                    ?, ?, ?
                )
                RETURNING *
                "#,
            )
            .bind(book.external_id)
            .bind(&book.title)
            .bind(Json(&book.authors))
            .bind(&book.path)
            .bind(&book.isbn)
            .bind(&book.publisher)
            .bind(&book.series)
            .bind(book.series_index)
            .bind(&book.description)
            .bind(book.rating)
            .bind(book.pubdate)
            .bind(book.has_cover)
            .bind(Json(&book.tags))
            .bind(book.external_modified_at)
            .bind(now)
            .bind(now)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

            inserted.push(row);
        }

        let book_ids: Vec<i64> = inserted.iter().map(|book| book.id).collect();
        insert_bootstrap_sessions(&mut tx, &book_ids, now).await?;

        tx.commit().await?;

        debug!(count = inserted.len(), "Inserted books with bootstrap sessions");
        Ok(inserted)
    }

    async fn bulk_update(&self, books: &[NewBook], now: i64) -> Result<u64> {
        if books.is_empty() {
            return Ok(0);
        }

        for book in books {
            book.validate().map_err(|msg| LibraryError::InvalidInput {
                field: "book".to_string(),
                message: msg,
            })?;
        }

        let mut tx = self.pool.begin().await?;
        let mut updated = 0u64;

        for book in books {
            let result = sqlx::query(
                r#"
                UPDATE books SET
                    title = ?,
                    authors = ?,
                    path = ?,
                    isbn = ?,
                    publisher = ?,
                    series = ?,
                    series_index = ?,
                    description = ?,
                    rating = ?,
                    pubdate = ?,
                    has_cover = ?,
                    tags = ?,
                    external_modified_at = ?,
                    is_orphaned = 0,
                    orphaned_at = NULL,
                    last_synced_at = ?,
                    updated_at = ?
                WHERE external_id = ?
                "#,
            )
            .bind(&book.title)
            .bind(Json(&book.authors))
            .bind(&book.path)
            .bind(&book.isbn)
            .bind(&book.publisher)
            .bind(&book.series)
            .bind(book.series_index)
            .bind(&book.description)
            .bind(book.rating)
            .bind(book.pubdate)
            .bind(book.has_cover)
            .bind(Json(&book.tags))
            .bind(book.external_modified_at)
            .bind(now)
            .bind(now)
            .bind(book.external_id)
            .execute(&mut *tx)
            .await?;

            updated += result.rows_affected();
        }

        tx.commit().await?;

        debug!(count = updated, "Updated books");
        Ok(updated)
    }

    async fn find_not_in_external_id_set(
        &self,
        observed: &HashSet<i64>,
    ) -> Result<Vec<TrackedBook>> {
        if observed.is_empty() {
            return Ok(Vec::new());
        }

        // The observed set can hold the whole catalog, far beyond SQLite's
        // bound-parameter limit, so the difference is taken here.
        let candidates = query_as::<_, TrackedBook>(
            "SELECT * FROM books WHERE external_id IS NOT NULL AND is_orphaned = 0 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates
            .into_iter()
            .filter(|book| {
                book.external_id
                    .map(|external_id| !observed.contains(&external_id))
                    .unwrap_or(false)
            })
            .collect())
    }

    async fn mark_orphaned(&self, ids: &[i64], now: i64) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut orphaned = 0u64;

        for id in ids {
            let result = sqlx::query(
                "UPDATE books SET is_orphaned = 1, orphaned_at = ?, updated_at = ? \
                 WHERE id = ? AND is_orphaned = 0",
            )
            .bind(now)
            .bind(now)
            .bind(*id)
            .execute(&mut *tx)
            .await?;

            orphaned += result.rows_affected();
        }

        tx.commit().await?;

        Ok(orphaned)
    }

    async fn count_tracked(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM books WHERE external_id IS NOT NULL AND is_orphaned = 0",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn identity_sequence(&self) -> Result<i64> {
        let seq: Option<i64> =
            sqlx::query_scalar("SELECT seq FROM sqlite_sequence WHERE name = 'books'")
                .fetch_optional(&self.pool)
                .await?;

        Ok(seq.unwrap_or(0))
    }

    async fn query_orphaned(&self, page_request: PageRequest) -> Result<Page<TrackedBook>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE is_orphaned = 1")
            .fetch_one(&self.pool)
            .await?;

        let books = query_as::<_, TrackedBook>(
            "SELECT * FROM books WHERE is_orphaned = 1 \
             ORDER BY orphaned_at DESC, id ASC LIMIT ? OFFSET ?",
        )
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(books, total as u64, page_request))
    }
}

//! Reading session repository trait and implementation

use crate::error::Result;
use crate::models::{ReadingSession, ReadingStatus};
use async_trait::async_trait;
use sqlx::{query_as, SqliteConnection, SqlitePool};

/// Reading session repository interface
#[async_trait]
pub trait ReadingSessionRepository: Send + Sync {
    /// Create the bootstrap session (session 1, unread, active) for each book
    ///
    /// Books that already have a session 1 are left untouched, so calling
    /// this again for the same books is a no-op. New books get their
    /// bootstrap session from `BookRepository::bulk_insert`; this repairs
    /// books created outside a sync.
    ///
    /// # Returns
    /// Number of sessions created
    async fn bootstrap(&self, book_ids: &[i64], now: i64) -> Result<u64>;

    /// All sessions of a book, oldest first
    async fn find_by_book(&self, book_id: i64) -> Result<Vec<ReadingSession>>;

    /// Count sessions across all books
    async fn count(&self) -> Result<u64>;
}

/// SQLite implementation of ReadingSessionRepository
pub struct SqliteReadingSessionRepository {
    pool: SqlitePool,
}

impl SqliteReadingSessionRepository {
    /// Create a new SQLite reading session repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingSessionRepository for SqliteReadingSessionRepository {
    async fn bootstrap(&self, book_ids: &[i64], now: i64) -> Result<u64> {
        if book_ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let created = insert_bootstrap_sessions(&mut tx, book_ids, now).await?;
        tx.commit().await?;

        Ok(created)
    }

    async fn find_by_book(&self, book_id: i64) -> Result<Vec<ReadingSession>> {
        let sessions = query_as::<_, ReadingSession>(
            "SELECT * FROM reading_sessions WHERE book_id = ? ORDER BY session_number",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reading_sessions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}

/// Insert session 1 for each book on `conn`, skipping books that have one.
///
/// Runs inside the caller's transaction so a book row is never committed
/// without its bootstrap session.
pub(crate) async fn insert_bootstrap_sessions(
    conn: &mut SqliteConnection,
    book_ids: &[i64],
    now: i64,
) -> Result<u64> {
    let mut created = 0u64;

    for book_id in book_ids {
        let result = sqlx::query(
            r#"
            INSERT INTO reading_sessions (
                book_id, session_number, status, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, 1, ?, ?)
            ON CONFLICT(book_id, session_number) DO NOTHING
            "#,
        )
        .bind(*book_id)
        .bind(ReadingSession::BOOTSTRAP_SESSION_NUMBER)
        .bind(ReadingStatus::Unread)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        created += result.rows_affected();
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    const NOW: i64 = 1_704_067_200;

    async fn insert_book(pool: &SqlitePool, external_id: i64) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO books (external_id, title, path, added_at, created_at, updated_at) \
             VALUES (?, 'Book', 'Author/Book', 0, 0, 0) RETURNING id",
        )
        .bind(external_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_creates_unread_session() {
        let pool = create_test_pool().await.unwrap();
        let book_id = insert_book(&pool, 1).await;
        let repo = SqliteReadingSessionRepository::new(pool);

        assert_eq!(repo.bootstrap(&[book_id], NOW).await.unwrap(), 1);

        let sessions = repo.find_by_book(book_id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_number, 1);
        assert_eq!(sessions[0].status, ReadingStatus::Unread);
        assert!(sessions[0].is_active);
        assert_eq!(sessions[0].created_at, NOW);
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let pool = create_test_pool().await.unwrap();
        let book_id = insert_book(&pool, 1).await;
        let repo = SqliteReadingSessionRepository::new(pool.clone());

        repo.bootstrap(&[book_id], NOW).await.unwrap();

        // A user moves the book along; a later bootstrap must not reset it
        sqlx::query("UPDATE reading_sessions SET status = 'reading' WHERE book_id = ?")
            .bind(book_id)
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(repo.bootstrap(&[book_id], NOW + 1).await.unwrap(), 0);

        let sessions = repo.find_by_book(book_id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].status, ReadingStatus::Reading);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_requires_existing_book() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteReadingSessionRepository::new(pool);

        assert!(repo.bootstrap(&[404], NOW).await.is_err());
    }
}

//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations for the tracking store.
//!
//! ## Architecture
//!
//! - Traits define the interface the sync engine programs against
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling
//! - Batch writes run inside a single transaction per call
//!
//! ## Available Repositories
//!
//! - `BookRepository` - Catalog-mirrored books, orphan bookkeeping
//! - `ReadingSessionRepository` - Per-book reading sessions

pub mod book;
pub mod pagination;
pub mod reading_session;

pub use book::{BookRepository, SqliteBookRepository};
pub use pagination::{Page, PageRequest};
pub use reading_session::{ReadingSessionRepository, SqliteReadingSessionRepository};

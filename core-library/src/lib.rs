//! # Library Tracking Store
//!
//! Owns the local SQLite database that mirrors an external book catalog and
//! provides the repositories the sync engine writes through.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite schema and embedded migrations
//! - Connection pooling ([`db`])
//! - Book and reading-session repositories ([`repositories`])
//! - Domain models ([`models`])

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{BookSummary, NewBook, ReadingSession, ReadingStatus, TrackedBook};

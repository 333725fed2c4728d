//! # Host Bridge Traits
//!
//! Abstraction traits that host applications implement to plug external
//! systems into the core.
//!
//! ## Overview
//!
//! This crate defines the contract between the synchronization core and the
//! outside world. The core never talks to a third-party library manager or to
//! the host's logging pipeline directly; it goes through these traits.
//!
//! ## Traits
//!
//! ### Catalog
//! - [`CatalogSource`](catalog::CatalogSource) - Read-only access to an external book catalog
//!   (records, tags, optional pagination and batched tag lookup)
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Optional
//! capabilities that an implementation does not support must return
//! [`BridgeError::NotAvailable`] and must not be advertised in
//! [`CatalogCapabilities`](catalog::CatalogCapabilities).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so implementations can be
//! shared across async tasks.

pub mod catalog;
pub mod error;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use catalog::{CatalogCapabilities, CatalogSource, ExternalRecord, InMemoryCatalog, PageWindow};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};

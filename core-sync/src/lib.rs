//! # Library Sync Module
//!
//! Keeps the local tracking store in step with an external book catalog.
//!
//! ## Overview
//!
//! The catalog (for example a Calibre library) is owned by another program
//! and evolves independently. Each sync pass must:
//! - Create tracked books for records seen for the first time
//! - Update already-tracked books in place without consuming new identifiers
//! - Flag books that vanished from the catalog as orphaned, never deleting them
//! - Refuse to orphan a suspiciously large share of the library
//!
//! ## Components
//!
//! - **Record Normalizer** (`normalizer`): Pure conversion of catalog records into storable books
//! - **Orphan Safety Guard** (`orphan_guard`): Threshold policy for the orphan phase
//! - **Library Sync** (`coordinator`): Single-flight orchestrator producing a `SyncResult`

pub mod coordinator;
pub mod error;
pub mod normalizer;
pub mod orphan_guard;
pub mod result;

pub use coordinator::{LibrarySync, SyncConfig};
pub use error::{Result, SyncError};
pub use orphan_guard::{OrphanDecision, OrphanGuard};
pub use result::{SyncOptions, SyncResult};

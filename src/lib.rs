//! Workspace placeholder crate.
//!
//! This crate exists so host applications can depend on a single
//! `bookshelf-workspace` package and pull in the library synchronization
//! service through the `service` feature, without wiring each workspace crate
//! (`core-library`, `core-sync`, `core-runtime`) individually.

#[cfg(feature = "service")]
pub use core_service::{CoreService, SyncOptions, SyncResult};

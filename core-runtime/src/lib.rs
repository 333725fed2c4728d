//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the library sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other crates depend on. It
//! establishes the logging conventions, the validated configuration shared by
//! the storage and sync layers, and the broadcast channel hosts subscribe to
//! for sync progress.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};

use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Sync already in progress")]
    SyncInProgress,

    #[error("No books found in the source catalog; aborting before any changes")]
    EmptySource,

    #[error(
        "Refusing to orphan {candidates} of {total} tracked books ({percentage:.1}%); \
         the source catalog may be incomplete"
    )]
    OrphanThresholdExceeded {
        candidates: u64,
        total: u64,
        percentage: f64,
    },

    #[error("Catalog source error: {0}")]
    Source(#[from] BridgeError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Invalid catalog record {external_id}: {reason}")]
    InvalidRecord { external_id: i64, reason: String },
}

impl SyncError {
    /// Whether retrying the same sync later may succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SyncError::InvalidRecord { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

//! # Core events
//!
//! Sync progress and library changes are broadcast on an [`EventBus`] backed
//! by `tokio::sync::broadcast`. Publishers never wait on subscribers and do
//! not care whether anyone is listening; a subscriber that falls more than
//! the buffer size behind gets `RecvError::Lagged` and keeps receiving newer
//! events.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut events = bus.subscribe();
//!
//! bus.emit(CoreEvent::Library(LibraryEvent::BooksOrphaned { book_ids: vec![7] }));
//!
//! assert!(matches!(
//!     events.recv().await,
//!     Ok(CoreEvent::Library(LibraryEvent::BooksOrphaned { .. }))
//! ));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::RecvError;
pub use tokio::sync::broadcast::Receiver;

/// Default per-subscriber buffer.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Serialized as `{"type": "Sync", "payload": {"event": "Started", ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Sync(SyncEvent),
    Library(LibraryEvent),
}

/// Lifecycle of one library sync pass, keyed by its `run_id`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    Started {
        run_id: String,
        detect_orphans: bool,
        chunk_size: usize,
    },
    /// Emitted after each chunk is persisted.
    Progress {
        run_id: String,
        chunk_index: u64,
        records_processed: u64,
        /// `None` when the catalog cannot report its size
        total_records: Option<u64>,
        /// 0-100, or 0 when the total is unknown
        percent: u8,
    },
    Completed {
        run_id: String,
        created: u64,
        updated: u64,
        orphaned: u64,
        total_records: u64,
        duration_ms: u64,
    },
    /// The pass was refused or stopped. Inserts and updates made before an
    /// orphan-guard refusal are kept.
    Failed {
        run_id: String,
        message: String,
        /// Retrying later may succeed without operator action
        recoverable: bool,
    },
}

/// Changes to the tracking store, by internal book id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    BooksAdded { book_ids: Vec<i64> },
    BooksOrphaned { book_ids: Vec<i64> },
    /// Orphaned books that reappeared in the catalog
    BooksRestored { book_ids: Vec<i64> },
}

/// Broadcast channel shared by publishers and subscribers; clones share it.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// # Panics
    ///
    /// Panics if `capacity` is 0. `CoreConfig` rejects a zero buffer size
    /// before a bus is built from it.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `event`, returning how many subscribers will see it.
    pub fn emit(&self, event: CoreEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Receive events published from now on.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(chunk_index: u64) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::Progress {
            run_id: "run-1".to_string(),
            chunk_index,
            records_processed: (chunk_index + 1) * 500,
            total_records: Some(2000),
            percent: ((chunk_index + 1) * 25) as u8,
        })
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.emit(progress(0)), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let bus = EventBus::new(8);
        let mut ui = bus.subscribe();
        let mut scheduler = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let added = CoreEvent::Library(LibraryEvent::BooksAdded { book_ids: vec![1, 2] });
        assert_eq!(bus.emit(added.clone()), 2);

        assert_eq!(ui.recv().await.unwrap(), added);
        assert_eq!(scheduler.recv().await.unwrap(), added);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_then_catches_up() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe();

        for chunk_index in 0..4 {
            bus.emit(progress(chunk_index));
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(2))));
        assert_eq!(slow.recv().await.unwrap(), progress(2));
    }

    #[test]
    fn test_wire_format() {
        let event = CoreEvent::Library(LibraryEvent::BooksRestored { book_ids: vec![9] });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Library");
        assert_eq!(json["payload"]["event"], "BooksRestored");
        assert_eq!(json["payload"]["book_ids"][0], 9);

        let round_trip: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(round_trip, event);
    }
}

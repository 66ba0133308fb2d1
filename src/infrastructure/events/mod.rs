//! Event bus for decoupled communication
//!
//! Advisory only: embedding UIs subscribe to observe transitions, nothing in
//! the protocol depends on a receiver being present.

use crate::domain::DownloadStatus;
use tokio::sync::broadcast;

/// Sync-related events
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The host accepted a download request
    DownloadRequested { item_id: String },

    /// An item's stored status changed
    StatusChanged {
        item_id: String,
        status: DownloadStatus,
    },

    /// The companion finished materializing an item
    DownloadCompleted { item_id: String },

    /// A download cycle ended in a terminal failure
    DownloadFailed { item_id: String, reason: String },

    /// Playback progress was recorded locally on the companion
    ProgressRecorded { item_id: String, position_ms: i64 },

    /// A scheduler run finished flushing progress to the host
    ProgressFlushed { synced: usize, failed: usize },

    /// The host received a progress update from the companion
    ProgressReceived { item_id: String },

    /// An item and its local files were deleted on the companion
    ItemDeleted { item_id: String },
}

/// Event bus for broadcasting events
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event
    pub fn emit(&self, event: SyncEvent) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

//! Host-side handling of inbound playback progress
//!
//! The companion delivers the latest known position as a full replacement,
//! at-least-once, so duplicates and reordering are harmless: whatever arrives
//! last is forwarded as-is. Failures are logged only; the companion keeps
//! the item flagged and re-sends on its next scheduler run.

use crate::host::library::ProgressReporter;
use crate::infrastructure::events::{EventBus, SyncEvent};
use crate::transport::wire::ProgressUpdate;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ProgressHandler {
    reporter: Arc<dyn ProgressReporter>,
    events: Arc<EventBus>,
}

impl ProgressHandler {
    pub fn new(reporter: Arc<dyn ProgressReporter>, events: Arc<EventBus>) -> Self {
        Self { reporter, events }
    }

    /// Forward a companion progress update to the server-side progress API.
    pub async fn handle(&self, update: ProgressUpdate) {
        info!(
            "Progress from companion for {}: {}ms, fully played: {}",
            update.item_id, update.position_ms, update.is_fully_played
        );

        if let Err(e) = self.reporter.report(&update).await {
            warn!("Failed to report progress for {}: {e}", update.item_id);
            return;
        }

        self.events.emit(SyncEvent::ProgressReceived {
            item_id: update.item_id,
        });
    }
}

//! Playback-side mutations of companion sync state
//!
//! The playback engine itself is external; it calls in here to persist
//! positions. Every mutation flags the item for the progress sync scheduler,
//! and the flag is only cleared once a send to the host is confirmed.

use crate::infrastructure::events::{EventBus, SyncEvent};
use crate::store::{ItemStore, Result, StoreError};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct PlaybackTracker {
    store: ItemStore,
    events: Arc<EventBus>,
}

impl PlaybackTracker {
    pub fn new(store: ItemStore, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }

    /// Persist a playback position for `item_id`, normalized against the
    /// known duration (a position at or past the end becomes "fully played,
    /// position 0").
    pub async fn record_position(&self, item_id: &str, position_ms: i64) -> Result<()> {
        let mut item = self
            .store
            .get_by_id(item_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(item_id.to_string()))?;

        item.apply_position(position_ms);
        self.store.update(&item).await?;

        debug!(
            "Recorded position {}ms for {item_id} (fully played: {})",
            item.last_played_position_ms, item.is_fully_played
        );
        self.events.emit(SyncEvent::ProgressRecorded {
            item_id: item_id.to_string(),
            position_ms: item.last_played_position_ms,
        });
        Ok(())
    }

    /// Mark `item_id` finished regardless of position.
    pub async fn mark_fully_played(&self, item_id: &str) -> Result<()> {
        let mut item = self
            .store
            .get_by_id(item_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(item_id.to_string()))?;

        item.mark_fully_played();
        self.store.update(&item).await?;

        self.events.emit(SyncEvent::ProgressRecorded {
            item_id: item_id.to_string(),
            position_ms: 0,
        });
        Ok(())
    }
}

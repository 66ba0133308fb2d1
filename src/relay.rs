//! Status relay: reconciles inbound status/ack reports into the store
//!
//! Used on both sides: the companion applies host status updates, the host
//! applies companion acks. Reconciliation is last-write-wins among the
//! non-terminal states; a terminal status is sticky, so a stale `QUEUED`
//! arriving after completion can never downgrade the row. Out-of-sequence
//! messages between non-terminal states are an accepted cosmetic regression.

use crate::domain::{DownloadStatus, SyncItem};
use crate::infrastructure::events::{EventBus, SyncEvent};
use crate::store::{ItemStore, Result};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct StatusRelay {
    store: ItemStore,
    events: Arc<EventBus>,
}

impl StatusRelay {
    pub fn new(store: ItemStore, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }

    /// Apply a reported status for `item_id`.
    ///
    /// A missing row gets a placeholder (real metadata arrives with the
    /// transfer record); an existing row is only updated while its status is
    /// not terminal.
    pub async fn apply(
        &self,
        item_id: &str,
        status: DownloadStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        match self.store.get_by_id(item_id).await? {
            None => {
                info!("Status {status} for unknown item {item_id}, creating placeholder");
                self.store
                    .upsert(&SyncItem::placeholder(item_id, status))
                    .await?;
            }
            Some(mut item) => {
                if item.status.is_terminal() {
                    debug!(
                        "Ignoring status {status} for {item_id}: already terminal ({})",
                        item.status
                    );
                    return Ok(());
                }
                item.status = status;
                self.store.update(&item).await?;
            }
        }

        if let Some(reason) = reason {
            info!("Status {status} for {item_id}: {reason}");
        }
        self.events.emit(SyncEvent::StatusChanged {
            item_id: item_id.to_string(),
            status,
        });
        Ok(())
    }
}

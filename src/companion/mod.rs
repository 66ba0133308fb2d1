//! Companion side: caches a subset of the host's library for offline
//! playback and pushes progress back

pub mod playback;
pub mod receiver;
pub mod scheduler;

pub use playback::PlaybackTracker;
pub use receiver::AssetReceiver;
pub use scheduler::{ProgressSyncScheduler, SyncRunOutcome};

use crate::infrastructure::events::{EventBus, SyncEvent};
use crate::relay::StatusRelay;
use crate::store::{ItemStore, Result};
use crate::transport::wire::{self, WireMessage};
use crate::transport::{Transport, TransportEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Companion node: decodes inbound transport events once at the boundary and
/// dispatches them to the asset receiver and the status relay. Blob
/// materialization runs on spawned tasks so the event loop stays responsive.
pub struct CompanionNode {
    receiver: Arc<AssetReceiver>,
    relay: StatusRelay,
    scheduler: Arc<ProgressSyncScheduler>,
    playback: PlaybackTracker,
    store: ItemStore,
    events: Arc<EventBus>,
}

impl CompanionNode {
    pub fn new(
        store: ItemStore,
        transport: Arc<dyn Transport>,
        data_dir: PathBuf,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            receiver: Arc::new(AssetReceiver::new(
                store.clone(),
                transport.clone(),
                data_dir,
                events.clone(),
            )),
            relay: StatusRelay::new(store.clone(), events.clone()),
            scheduler: Arc::new(ProgressSyncScheduler::new(
                store.clone(),
                transport,
                events.clone(),
            )),
            playback: PlaybackTracker::new(store.clone(), events.clone()),
            store,
            events,
        }
    }

    /// Playback-side mutation entry used by the player.
    pub fn playback(&self) -> &PlaybackTracker {
        &self.playback
    }

    /// The progress sync scheduler, for the embedding shell to `spawn`.
    pub fn scheduler(&self) -> Arc<ProgressSyncScheduler> {
        self.scheduler.clone()
    }

    /// Kick off an immediate sync run (e.g. when playback pauses). A run
    /// already in flight makes this a no-op.
    pub fn trigger_sync(&self) {
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move {
            if let Err(e) = scheduler.run_once().await {
                error!("Triggered progress sync aborted: {e}");
            }
        });
    }

    /// User-initiated deletion: removes the row and the materialized files.
    pub async fn delete_item(&self, item_id: &str) -> Result<()> {
        self.store.delete(item_id).await?;
        let dir = self.receiver.item_dir(item_id);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove files for {item_id} at {dir:?}: {e}");
            }
        }
        self.events.emit(SyncEvent::ItemDeleted {
            item_id: item_id.to_string(),
        });
        Ok(())
    }

    /// Consume inbound transport events until the channel closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("Companion transport event channel closed");
    }

    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::RecordChanged(record) => {
                if wire::item_id_from_record_name(&record.name).is_some() {
                    let receiver = self.receiver.clone();
                    tokio::spawn(async move {
                        receiver.handle_record(record).await;
                    });
                } else {
                    debug!("Ignoring unrelated record {}", record.name);
                }
            }
            TransportEvent::RecordDeleted { name } => {
                self.receiver.observe_deleted(&name);
            }
            TransportEvent::Message { from, path, payload } => {
                let message = match WireMessage::decode(&path, &payload) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Dropping undecodable message on {path} from {from}: {e}");
                        return;
                    }
                };
                self.dispatch(message).await;
            }
        }
    }

    async fn dispatch(&self, message: WireMessage) {
        match message {
            WireMessage::Status {
                item_id,
                status,
                reason,
            } => {
                if let Err(e) = self.relay.apply(&item_id, status, reason.as_deref()).await {
                    error!("Failed to apply status for {item_id}: {e}");
                }
            }
            // Host-bound messages have no business arriving here
            WireMessage::DownloadRequest { item_id } => {
                debug!("Unexpected download request on companion for {item_id}");
            }
            WireMessage::Ack { item_id, .. } => {
                debug!("Unexpected ack on companion for {item_id}");
            }
            WireMessage::ProgressSync(update) => {
                debug!("Unexpected progress sync on companion for {}", update.item_id);
            }
        }
    }
}

//! Download orchestrator: drives an item from "requested" through asset
//! preparation to transfer
//!
//! Every step emits an advisory status message to all reachable companion
//! peers; the authoritative signal is the transfer record itself eventually
//! replicating. Nothing here waits on an acknowledgment; receipt is
//! confirmed later by an independent ack message relayed into the store.

use crate::domain::{DownloadStatus, SyncItem};
use crate::host::library::{CoverFetcher, LibraryItem, LocalLibrary};
use crate::infrastructure::events::{EventBus, SyncEvent};
use crate::store::{ItemStore, Result};
use crate::transport::wire::{self, KEY_AUDIO_FILE, KEY_AUTHOR, KEY_COVER_IMAGE, KEY_DURATION, KEY_MEDIA_ITEM_ID, KEY_TIMESTAMP, KEY_TITLE};
use crate::transport::{BlobRef, Record, Transport};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct DownloadOrchestrator {
    store: ItemStore,
    transport: Arc<dyn Transport>,
    library: Arc<dyn LocalLibrary>,
    covers: Arc<dyn CoverFetcher>,
    events: Arc<EventBus>,
}

impl DownloadOrchestrator {
    pub fn new(
        store: ItemStore,
        transport: Arc<dyn Transport>,
        library: Arc<dyn LocalLibrary>,
        covers: Arc<dyn CoverFetcher>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            transport,
            library,
            covers,
            events,
        }
    }

    /// Start a download cycle for `item_id`.
    ///
    /// Explicitly restarts the cycle even when the stored status is terminal;
    /// this is the only path allowed to overwrite a terminal status. All
    /// failures degrade to a stored `FAILED` status; only store errors
    /// propagate.
    pub async fn request_download(&self, item_id: &str) -> Result<()> {
        info!("Download requested for {item_id}");
        self.begin_cycle(item_id).await?;
        self.events.emit(SyncEvent::DownloadRequested {
            item_id: item_id.to_string(),
        });
        self.emit_status(item_id, DownloadStatus::Queued, None).await;

        let library_item = match self.library.item_by_id(item_id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                return self.fail(item_id, "Item not downloaded on host").await;
            }
            Err(e) => {
                warn!("Library lookup failed for {item_id}: {e}");
                return self.fail(item_id, "Item not downloaded on host").await;
            }
        };

        let audio_path = match &library_item.audio_path {
            Some(path) => path.clone(),
            None => return self.fail(item_id, "Audio file path not found").await,
        };
        if !audio_path.exists() {
            return self.fail(item_id, "Audio file missing on host").await;
        }

        self.set_status(item_id, DownloadStatus::PreparingAsset).await?;
        self.emit_status(item_id, DownloadStatus::PreparingAsset, None)
            .await;

        let mut record = Record::new(wire::asset_record_name(item_id));
        record.put_str(KEY_MEDIA_ITEM_ID, item_id);
        record.put_str(
            KEY_TITLE,
            library_item.title.clone().unwrap_or_else(|| "Unknown Title".to_string()),
        );
        record.put_str(
            KEY_AUTHOR,
            library_item
                .author
                .clone()
                .unwrap_or_else(|| "Unknown Author".to_string()),
        );
        if let Some(duration) = library_item.duration_ms {
            record.put_i64(KEY_DURATION, duration);
        }
        // Re-sending the same item must look like a new record to the
        // last-write-wins replication layer even if nothing else changed
        record.put_i64(KEY_TIMESTAMP, Utc::now().timestamp_millis());
        record.put_blob(KEY_AUDIO_FILE, BlobRef::File(audio_path));
        if let Some(cover) = self.resolve_cover(&library_item).await {
            record.put_blob(KEY_COVER_IMAGE, cover);
        }

        match self.transport.put_record(record, true).await {
            Ok(()) => {
                info!("Transfer record for {item_id} queued for replication");
                self.set_status(item_id, DownloadStatus::UploadingToWatch).await?;
                self.emit_status(item_id, DownloadStatus::UploadingToWatch, None)
                    .await;
                Ok(())
            }
            Err(e) => {
                warn!("Record publish failed for {item_id}: {e}");
                self.fail(item_id, "Failed to send data to companion").await
            }
        }
    }

    /// Cover resolution: prefer the local file, fall back to fetching the
    /// remote URL, or omit the cover entirely. Never a failure.
    async fn resolve_cover(&self, library_item: &LibraryItem) -> Option<BlobRef> {
        if let Some(path) = &library_item.cover_path {
            if path.exists() {
                return Some(BlobRef::File(path.clone()));
            }
        }
        if let Some(url) = &library_item.cover_url {
            match self.covers.fetch(url).await {
                Ok(bytes) => return Some(BlobRef::Bytes(bytes)),
                Err(e) => warn!("Cover fetch from {url} failed: {e}"),
            }
        }
        None
    }

    /// Reset or create the host-side row for a new cycle.
    async fn begin_cycle(&self, item_id: &str) -> Result<()> {
        match self.store.get_by_id(item_id).await? {
            Some(mut item) => {
                item.status = DownloadStatus::Queued;
                item.downloaded_at = None;
                self.store.update(&item).await
            }
            None => {
                self.store
                    .upsert(&SyncItem::new(item_id, DownloadStatus::Queued))
                    .await
            }
        }
    }

    async fn set_status(&self, item_id: &str, status: DownloadStatus) -> Result<()> {
        if let Some(mut item) = self.store.get_by_id(item_id).await? {
            item.status = status;
            self.store.update(&item).await?;
        }
        self.events.emit(SyncEvent::StatusChanged {
            item_id: item_id.to_string(),
            status,
        });
        Ok(())
    }

    /// Terminate the cycle with a stored `FAILED` status and an advisory
    /// status message carrying the reason.
    async fn fail(&self, item_id: &str, reason: &str) -> Result<()> {
        warn!("Download of {item_id} failed: {reason}");
        if let Some(mut item) = self.store.get_by_id(item_id).await? {
            item.status = DownloadStatus::Failed;
            item.downloaded_at = Some(Utc::now());
            self.store.update(&item).await?;
        }
        self.emit_status(item_id, DownloadStatus::Failed, Some(reason))
            .await;
        self.events.emit(SyncEvent::DownloadFailed {
            item_id: item_id.to_string(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Advisory status broadcast to every reachable companion peer. Send
    /// failures and an empty peer set are logged, never escalated.
    async fn emit_status(&self, item_id: &str, status: DownloadStatus, reason: Option<&str>) {
        let peers = self.transport.reachable_peers().await;
        if peers.is_empty() {
            warn!("No reachable companion peers for status {status} of {item_id}");
            return;
        }
        let path = wire::status_path(item_id);
        let body = wire::encode_status_body(status, reason);
        for peer in peers {
            if let Err(e) = self.transport.send_message(&peer, &path, &body).await {
                warn!("Failed to send status {status} for {item_id} to {peer}: {e}");
            }
        }
    }
}

//! Asset receiver: reacts to replicated transfer records on the companion
//!
//! Persists the row first (status `DOWNLOADING`, immediate UI feedback), then
//! materializes blobs to local files, then acknowledges the outcome to the
//! host. Any I/O failure aborts only the affected item.

use crate::domain::{DownloadStatus, SyncItem};
use crate::infrastructure::events::{EventBus, SyncEvent};
use crate::store::ItemStore;
use crate::transport::wire::{
    self, KEY_AUDIO_FILE, KEY_AUTHOR, KEY_COVER_IMAGE, KEY_DURATION, KEY_TITLE,
};
use crate::transport::{BlobRef, Record, Transport, TransportError};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct AssetReceiver {
    store: ItemStore,
    transport: Arc<dyn Transport>,
    downloads_dir: PathBuf,
    events: Arc<EventBus>,
}

impl AssetReceiver {
    pub fn new(
        store: ItemStore,
        transport: Arc<dyn Transport>,
        data_dir: PathBuf,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            transport,
            downloads_dir: data_dir.join("downloads"),
            events,
        }
    }

    /// Per-item directory holding the materialized audio and cover files.
    pub fn item_dir(&self, item_id: &str) -> PathBuf {
        self.downloads_dir.join(item_id)
    }

    /// Process one replicated transfer record.
    pub async fn handle_record(&self, record: Record) {
        let item_id = match wire::item_id_from_record_name(&record.name) {
            Some(id) => id.to_string(),
            None => {
                warn!("Could not extract item id from record name: {}", record.name);
                return;
            }
        };
        info!("Processing transfer record for {item_id}");

        let title = record.str_field(KEY_TITLE).unwrap_or("Unknown Title").to_string();
        let author = record
            .str_field(KEY_AUTHOR)
            .unwrap_or("Unknown Author")
            .to_string();
        let duration_ms = record.i64_field(KEY_DURATION).unwrap_or(0);

        let mut item = SyncItem::new(&item_id, DownloadStatus::Downloading);
        item.title = title;
        item.author = author;
        item.duration_ms = Some(duration_ms);

        let audio_blob = match record.blob(KEY_AUDIO_FILE) {
            Some(blob) => blob.clone(),
            None => {
                // Fatal record: no audio means nothing to materialize
                error!("Audio blob missing in record for {item_id}");
                item.status = DownloadStatus::FailedNoAudioAsset;
                item.downloaded_at = Some(Utc::now());
                if let Err(e) = self.store.upsert(&item).await {
                    error!("Failed to persist {item_id}: {e}");
                }
                self.ack(&item_id, DownloadStatus::Failed, Some("Audio asset missing"))
                    .await;
                self.events.emit(SyncEvent::DownloadFailed {
                    item_id,
                    reason: "Audio asset missing".to_string(),
                });
                return;
            }
        };

        if let Err(e) = self.store.upsert(&item).await {
            error!("Failed to persist {item_id}: {e}");
            return;
        }

        let audio_path = match self.save_blob(&item_id, &audio_blob, "audio.dat").await {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Failed to save audio for {item_id}: {e}");
                None
            }
        };

        // Cover failure is non-fatal: the item plays fine without artwork
        let cover_path = match record.blob(KEY_COVER_IMAGE) {
            Some(blob) => match self.save_blob(&item_id, blob, "cover.jpg").await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Failed to save cover for {item_id}: {e}");
                    None
                }
            },
            None => None,
        };

        item.local_audio_path = audio_path.clone();
        item.local_cover_path = cover_path;
        item.downloaded_at = Some(Utc::now());

        if audio_path.is_some() {
            item.status = DownloadStatus::Completed;
            if let Err(e) = self.store.update(&item).await {
                error!("Failed to persist completion of {item_id}: {e}");
                return;
            }
            info!("Download of {item_id} completed");
            self.ack(&item_id, DownloadStatus::Completed, None).await;
            self.events.emit(SyncEvent::DownloadCompleted {
                item_id: item_id.clone(),
            });
        } else {
            item.status = DownloadStatus::FailedSaveAsset;
            if let Err(e) = self.store.update(&item).await {
                error!("Failed to persist failure of {item_id}: {e}");
                return;
            }
            self.ack(
                &item_id,
                DownloadStatus::Failed,
                Some("Could not save assets on companion"),
            )
            .await;
            self.events.emit(SyncEvent::DownloadFailed {
                item_id: item_id.clone(),
                reason: "Could not save assets on companion".to_string(),
            });
        }
    }

    /// A deleted record is observed and logged only; an in-flight download
    /// finishes or fails independently.
    pub fn observe_deleted(&self, name: &str) {
        info!("Transfer record deleted by publisher: {name}");
    }

    /// Copy a blob stream into the per-item directory.
    async fn save_blob(
        &self,
        item_id: &str,
        blob: &BlobRef,
        file_name: &str,
    ) -> Result<PathBuf, TransportError> {
        let dir = self.item_dir(item_id);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(file_name);

        let mut reader = self.transport.open_blob(blob).await?;
        let mut file = tokio::fs::File::create(&path).await?;
        tokio::io::copy(&mut reader, &mut file).await?;

        info!("Saved {} for {item_id} to {:?}", file_name, path);
        Ok(path)
    }

    /// Acknowledge the receipt outcome to the first reachable peer.
    async fn ack(&self, item_id: &str, status: DownloadStatus, reason: Option<&str>) {
        let peers = self.transport.reachable_peers().await;
        let Some(peer) = peers.first() else {
            warn!("No reachable host peer to ack {status} for {item_id}");
            return;
        };

        let path = wire::ack_path(item_id);
        let body = wire::encode_status_body(status, reason);
        match self.transport.send_message(peer, &path, &body).await {
            Ok(()) => info!("Sent ack {status} for {item_id} to {peer}"),
            Err(e) => warn!("Failed to send ack {status} for {item_id} to {peer}: {e}"),
        }
    }
}

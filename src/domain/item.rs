//! The unit of synchronization: one audiobook item per row, replicated
//! independently on each device and reconciled by message arrival.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};

/// Download pipeline status for a sync item.
///
/// `Queued`, `PreparingAsset`, `UploadingToWatch` and `Failed` travel on the
/// wire as host status updates (`Completed`/`Failed` also appear in companion
/// acks); `Downloading`, `FailedNoAudioAsset` and `FailedSaveAsset` are only
/// ever stored locally on the companion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadStatus {
    /// Host accepted the download request
    Queued,
    /// Host is resolving local files and building the transfer record
    PreparingAsset,
    /// Record handed to the replication layer, receipt not yet confirmed
    UploadingToWatch,
    /// Companion observed the record and is materializing blobs
    Downloading,
    /// Audio materialized and persisted on the companion
    Completed,
    /// Host-side failure (item missing, file missing, publish rejected)
    Failed,
    /// Record arrived without an audio blob
    FailedNoAudioAsset,
    /// Blob materialization failed on the companion
    FailedSaveAsset,
}

impl DownloadStatus {
    /// Terminal statuses are sticky: out-of-order messages describing earlier
    /// pipeline stages must never downgrade them. Only an explicit new
    /// download cycle may overwrite a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::FailedNoAudioAsset | Self::FailedSaveAsset
        )
    }
}

/// Per-item synchronization state, one row per `item_id` on each device.
///
/// There is no cross-device transaction: each side's row is an independent
/// replica mutated by whatever message arrives next.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncItem {
    /// Stable cross-device identifier, assigned by the host's library
    pub item_id: String,
    pub title: String,
    pub author: String,
    /// Unknown until the transfer record carries it
    pub duration_ms: Option<i64>,
    /// Companion-local audio file, set on successful materialization
    pub local_audio_path: Option<PathBuf>,
    /// Companion-local cover image, stays `None` when no cover was delivered
    pub local_cover_path: Option<PathBuf>,
    pub status: DownloadStatus,
    /// Companion-authoritative once playback starts
    pub last_played_position_ms: i64,
    pub is_fully_played: bool,
    /// True while the companion holds progress not yet confirmed delivered
    pub needs_sync: bool,
    /// Set on terminal completion or failure
    pub downloaded_at: Option<DateTime<Utc>>,
    pub last_sync_attempt_at: Option<DateTime<Utc>>,
}

impl SyncItem {
    /// Fresh item entering the pipeline with no playback history.
    pub fn new(item_id: impl Into<String>, status: DownloadStatus) -> Self {
        Self {
            item_id: item_id.into(),
            title: String::new(),
            author: String::new(),
            duration_ms: None,
            local_audio_path: None,
            local_cover_path: None,
            status,
            last_played_position_ms: 0,
            is_fully_played: false,
            needs_sync: false,
            downloaded_at: None,
            last_sync_attempt_at: None,
        }
    }

    /// Placeholder row created when a status message arrives before the
    /// transfer record. Real metadata overwrites it when the record lands.
    pub fn placeholder(item_id: impl Into<String>, status: DownloadStatus) -> Self {
        let mut item = Self::new(item_id, status);
        item.title = "Loading…".to_string();
        item
    }

    /// Record a playback position, normalizing it against the known duration
    /// and flagging the item for progress sync.
    ///
    /// Positions are clamped below at 0. A position at or beyond a known
    /// duration collapses to the canonical "fully played, position reset to 0"
    /// pair so that both devices agree on what a finished book looks like.
    pub fn apply_position(&mut self, position_ms: i64) {
        let position_ms = position_ms.max(0);
        match self.duration_ms {
            Some(duration) if duration > 0 && position_ms >= duration => {
                self.is_fully_played = true;
                self.last_played_position_ms = 0;
            }
            _ => {
                self.last_played_position_ms = position_ms;
            }
        }
        self.needs_sync = true;
    }

    /// Mark the item finished regardless of position.
    pub fn mark_fully_played(&mut self) {
        self.is_fully_played = true;
        self.last_played_position_ms = 0;
        self.needs_sync = true;
    }
}

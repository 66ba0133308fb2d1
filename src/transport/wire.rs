//! Wire surface: message paths, record field keys, the `key=value` body
//! codec, and the tagged message type decoded once at the transport boundary.
//!
//! Every inbound message is decoded here into a [`WireMessage`] variant and
//! dispatched by pattern match; no path string comparisons leak into the
//! protocol components.

use crate::domain::DownloadStatus;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// UI → host: raw UTF-8 item id
pub const PATH_DOWNLOAD_REQUEST: &str = "download/request";
/// Host → companion status updates, item id appended
pub const PATH_STATUS_PREFIX: &str = "status/";
/// Companion → host acknowledgments, item id appended
pub const PATH_ACK_PREFIX: &str = "download/ack/";
/// Companion → host progress flush
pub const PATH_PROGRESS_SYNC: &str = "progress/sync";
/// Replicated transfer records, item id appended
pub const RECORD_ASSET_PREFIX: &str = "download/asset/";

/// Capability tag the host advertises so the companion can discover it
/// without a hardcoded address.
pub const HOST_CAPABILITY: &str = "audiobook_host";

// Record field keys
pub const KEY_MEDIA_ITEM_ID: &str = "mediaItemId";
pub const KEY_TITLE: &str = "title";
pub const KEY_AUTHOR: &str = "author";
pub const KEY_DURATION: &str = "duration";
pub const KEY_TIMESTAMP: &str = "timestamp";
pub const KEY_AUDIO_FILE: &str = "audioFile";
pub const KEY_COVER_IMAGE: &str = "coverImage";

#[derive(Debug, Error)]
pub enum WireError {
    #[error("Unknown message path: {0}")]
    UnknownPath(String),

    #[error("Message payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown status value: {0}")]
    InvalidStatus(String),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Latest-known playback position for one item. Always a full replacement,
/// never a delta, so duplicate or reordered delivery is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(rename = "mediaItemId")]
    pub item_id: String,
    #[serde(rename = "position")]
    pub position_ms: i64,
    #[serde(rename = "isFullyPlayed")]
    pub is_fully_played: bool,
    /// Send time on the companion, ms since epoch
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

impl ProgressUpdate {
    pub fn to_bytes(&self) -> Vec<u8> {
        // Serialization of a plain struct cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Inbound message, decoded once from `(path, payload)`.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// UI asked the host to push an item to the companion
    DownloadRequest { item_id: String },
    /// Host reporting a pipeline stage to the companion
    Status {
        item_id: String,
        status: DownloadStatus,
        reason: Option<String>,
    },
    /// Companion confirming receipt outcome to the host
    Ack {
        item_id: String,
        status: DownloadStatus,
        reason: Option<String>,
    },
    /// Companion flushing buffered playback progress
    ProgressSync(ProgressUpdate),
}

impl WireMessage {
    /// Decode an inbound message at the transport boundary.
    pub fn decode(path: &str, payload: &[u8]) -> Result<Self, WireError> {
        if path == PATH_DOWNLOAD_REQUEST {
            let item_id = std::str::from_utf8(payload)
                .map_err(|_| WireError::InvalidUtf8)?
                .trim()
                .to_string();
            if item_id.is_empty() {
                return Err(WireError::MissingField("itemId"));
            }
            return Ok(Self::DownloadRequest { item_id });
        }

        if path == PATH_PROGRESS_SYNC {
            let update: ProgressUpdate = serde_json::from_slice(payload)?;
            return Ok(Self::ProgressSync(update));
        }

        if let Some(item_id) = path.strip_prefix(PATH_STATUS_PREFIX) {
            if item_id.is_empty() {
                return Err(WireError::MissingField("itemId"));
            }
            let (status, reason) = decode_status_body(payload)?;
            return Ok(Self::Status {
                item_id: item_id.to_string(),
                status,
                reason,
            });
        }

        if let Some(item_id) = path.strip_prefix(PATH_ACK_PREFIX) {
            if item_id.is_empty() {
                return Err(WireError::MissingField("itemId"));
            }
            let (status, reason) = decode_status_body(payload)?;
            return Ok(Self::Ack {
                item_id: item_id.to_string(),
                status,
                reason,
            });
        }

        Err(WireError::UnknownPath(path.to_string()))
    }
}

/// Encode a `status=<S>[&reason=<pct-encoded>]` body.
pub fn encode_status_body(status: DownloadStatus, reason: Option<&str>) -> Vec<u8> {
    let mut body = format!("status={status}");
    if let Some(reason) = reason {
        body.push_str("&reason=");
        body.push_str(&utf8_percent_encode(reason, NON_ALPHANUMERIC).to_string());
    }
    body.into_bytes()
}

fn decode_status_body(payload: &[u8]) -> Result<(DownloadStatus, Option<String>), WireError> {
    let body = std::str::from_utf8(payload).map_err(|_| WireError::InvalidUtf8)?;
    let mut status = None;
    let mut reason = None;

    for pair in body.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = percent_decode_str(value)
            .decode_utf8()
            .map_err(|_| WireError::InvalidUtf8)?
            .into_owned();
        match key {
            "status" => status = Some(value),
            "reason" => reason = Some(value),
            _ => {}
        }
    }

    let status = status.ok_or(WireError::MissingField("status"))?;
    let status = status
        .parse::<DownloadStatus>()
        .map_err(|_| WireError::InvalidStatus(status))?;
    Ok((status, reason))
}

/// Message path for a status update on one item.
pub fn status_path(item_id: &str) -> String {
    format!("{PATH_STATUS_PREFIX}{item_id}")
}

/// Message path for a receipt acknowledgment on one item.
pub fn ack_path(item_id: &str) -> String {
    format!("{PATH_ACK_PREFIX}{item_id}")
}

/// Record name for one item's transfer record.
pub fn asset_record_name(item_id: &str) -> String {
    format!("{RECORD_ASSET_PREFIX}{item_id}")
}

/// Item id carried in an asset record name, `None` for other records.
pub fn item_id_from_record_name(name: &str) -> Option<&str> {
    name.strip_prefix(RECORD_ASSET_PREFIX)
        .filter(|id| !id.is_empty())
}

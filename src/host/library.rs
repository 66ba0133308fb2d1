//! Collaborator interfaces consumed by the host side
//!
//! The host's own library (populated by its download pipeline), the remote
//! cover source, and the server progress API are external; they appear here
//! only as opaque calls with success/failure outcomes.

use crate::transport::wire::ProgressUpdate;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Remote request failed: {0}")]
    Remote(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A library item as the host's library knows it.
#[derive(Debug, Clone, Default)]
pub struct LibraryItem {
    pub item_id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub duration_ms: Option<i64>,
    /// Host-local audio file, `None` when the item was never downloaded
    pub audio_path: Option<PathBuf>,
    /// Host-local cover image, preferred cover source
    pub cover_path: Option<PathBuf>,
    /// Remote fallback when no usable local cover exists
    pub cover_url: Option<String>,
}

/// Lookup into the host's local library.
#[async_trait]
pub trait LocalLibrary: Send + Sync {
    /// Fetch an item and its local file locations by id. `Ok(None)` means the
    /// id is unknown to this library.
    async fn item_by_id(&self, item_id: &str) -> Result<Option<LibraryItem>, LibraryError>;
}

/// Remote cover image source used when no local cover file is available.
#[async_trait]
pub trait CoverFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LibraryError>;
}

/// Server-side progress API: applies the companion's latest position as a
/// full replacement for that item's progress. Conflict policy against newer
/// server progress lives behind this boundary.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, update: &ProgressUpdate) -> Result<(), LibraryError>;
}

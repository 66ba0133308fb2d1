//! Local item store: the single synchronization point on each device
//!
//! Every inbound event (status message, ack, record arrival, playback tick)
//! resolves to a read-modify-write of one row here. Rows are independently
//! owned replicas; there are no multi-row transactions because each item is
//! owned by at most one in-flight operation.

use crate::domain::{DownloadStatus, SyncItem};
use crate::infrastructure::database::entities::sync_item::{self, Entity as SyncItemEntity};
use crate::infrastructure::database::Database;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Item store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Stored status is not a known value: {0}")]
    InvalidStatus(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable table of [`SyncItem`] rows keyed by item id.
#[derive(Clone)]
pub struct ItemStore {
    db: Arc<Database>,
}

impl ItemStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Open (or create) a store backed by the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let db = Database::open(path).await?;
        Ok(Self::new(Arc::new(db)))
    }

    /// Insert the item, replacing any existing row with the same id.
    pub async fn upsert(&self, item: &SyncItem) -> Result<()> {
        let active = to_active(item);
        SyncItemEntity::insert(active)
            .on_conflict(
                OnConflict::column(sync_item::Column::Id)
                    .update_columns([
                        sync_item::Column::Title,
                        sync_item::Column::Author,
                        sync_item::Column::DurationMs,
                        sync_item::Column::LocalAudioPath,
                        sync_item::Column::LocalCoverPath,
                        sync_item::Column::Status,
                        sync_item::Column::LastPlayedPositionMs,
                        sync_item::Column::IsFullyPlayed,
                        sync_item::Column::NeedsSync,
                        sync_item::Column::DownloadedAt,
                        sync_item::Column::LastSyncAttemptAt,
                    ])
                    .to_owned(),
            )
            .exec(self.db.conn())
            .await?;
        Ok(())
    }

    /// Update an existing row in place.
    pub async fn update(&self, item: &SyncItem) -> Result<()> {
        to_active(item).update(self.db.conn()).await?;
        Ok(())
    }

    /// Delete the row for `item_id`. Deleting a missing row is not an error.
    pub async fn delete(&self, item_id: &str) -> Result<()> {
        SyncItemEntity::delete_by_id(item_id)
            .exec(self.db.conn())
            .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, item_id: &str) -> Result<Option<SyncItem>> {
        SyncItemEntity::find_by_id(item_id)
            .one(self.db.conn())
            .await?
            .map(to_item)
            .transpose()
    }

    /// All items, most recently downloaded first.
    pub async fn get_all(&self) -> Result<Vec<SyncItem>> {
        SyncItemEntity::find()
            .order_by_desc(sync_item::Column::DownloadedAt)
            .all(self.db.conn())
            .await?
            .into_iter()
            .map(to_item)
            .collect()
    }

    /// Items holding progress not yet confirmed delivered to the host.
    pub async fn get_needing_sync(&self) -> Result<Vec<SyncItem>> {
        SyncItemEntity::find()
            .filter(sync_item::Column::NeedsSync.eq(true))
            .all(self.db.conn())
            .await?
            .into_iter()
            .map(to_item)
            .collect()
    }
}

fn to_item(model: sync_item::Model) -> Result<SyncItem> {
    let status = model
        .status
        .parse::<DownloadStatus>()
        .map_err(|_| StoreError::InvalidStatus(model.status.clone()))?;
    Ok(SyncItem {
        item_id: model.id,
        title: model.title,
        author: model.author,
        duration_ms: model.duration_ms,
        local_audio_path: model.local_audio_path.map(PathBuf::from),
        local_cover_path: model.local_cover_path.map(PathBuf::from),
        status,
        last_played_position_ms: model.last_played_position_ms,
        is_fully_played: model.is_fully_played,
        needs_sync: model.needs_sync,
        downloaded_at: model.downloaded_at,
        last_sync_attempt_at: model.last_sync_attempt_at,
    })
}

fn to_active(item: &SyncItem) -> sync_item::ActiveModel {
    sync_item::ActiveModel {
        id: Set(item.item_id.clone()),
        title: Set(item.title.clone()),
        author: Set(item.author.clone()),
        duration_ms: Set(item.duration_ms),
        local_audio_path: Set(item
            .local_audio_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())),
        local_cover_path: Set(item
            .local_cover_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())),
        status: Set(item.status.to_string()),
        last_played_position_ms: Set(item.last_played_position_ms),
        is_fully_played: Set(item.is_fully_played),
        needs_sync: Set(item.needs_sync),
        downloaded_at: Set(item.downloaded_at),
        last_sync_attempt_at: Set(item.last_sync_attempt_at),
    }
}

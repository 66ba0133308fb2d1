//! Sync item entity: one row per item, keyed by the cross-device item id

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_items")]
pub struct Model {
    /// Cross-device item identifier, assigned by the host's library
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    pub author: String,
    pub duration_ms: Option<i64>,
    pub local_audio_path: Option<String>,
    pub local_cover_path: Option<String>,
    /// Wire form of the download status
    pub status: String,
    pub last_played_position_ms: i64,
    pub is_fully_played: bool,
    pub needs_sync: bool,
    pub downloaded_at: Option<DateTimeUtc>,
    pub last_sync_attempt_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

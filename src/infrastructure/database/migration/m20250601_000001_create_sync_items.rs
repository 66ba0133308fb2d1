//! Create the sync_items table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SyncItems::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(SyncItems::Title).string().not_null())
                    .col(ColumnDef::new(SyncItems::Author).string().not_null())
                    .col(ColumnDef::new(SyncItems::DurationMs).big_integer())
                    .col(ColumnDef::new(SyncItems::LocalAudioPath).string())
                    .col(ColumnDef::new(SyncItems::LocalCoverPath).string())
                    .col(ColumnDef::new(SyncItems::Status).string().not_null())
                    .col(
                        ColumnDef::new(SyncItems::LastPlayedPositionMs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncItems::IsFullyPlayed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SyncItems::NeedsSync)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(SyncItems::DownloadedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(SyncItems::LastSyncAttemptAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Scheduler scans for flagged items every run
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_items_needs_sync")
                    .table(SyncItems::Table)
                    .col(SyncItems::NeedsSync)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncItems::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SyncItems {
    Table,
    Id,
    Title,
    Author,
    DurationMs,
    LocalAudioPath,
    LocalCoverPath,
    Status,
    LastPlayedPositionMs,
    IsFullyPlayed,
    NeedsSync,
    DownloadedAt,
    LastSyncAttemptAt,
}

//! Progress sync scheduler: flushes buffered playback progress to the host
//!
//! Runs once at start and then on an hours-scale interval. Each run sends the
//! latest known position per flagged item as a full replacement, never a
//! delta, so at-least-once delivery with duplicates and reordering is
//! harmless on the host. Per-item isolation: one failed send never blocks the
//! remaining items, and only still-flagged items are retried next run.

use crate::infrastructure::events::{EventBus, SyncEvent};
use crate::store::{ItemStore, Result};
use crate::transport::wire::{ProgressUpdate, HOST_CAPABILITY, PATH_PROGRESS_SYNC};
use crate::transport::Transport;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome of one scheduler run. `Retry` asks the platform scheduler to
/// re-invoke later (bounded backoff is its responsibility, not ours).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRunOutcome {
    Success,
    Retry,
}

pub struct ProgressSyncScheduler {
    store: ItemStore,
    transport: Arc<dyn Transport>,
    events: Arc<EventBus>,
    // De-duplicates overlapping invocations; a run that finds this held
    // simply no-ops
    run_guard: Mutex<()>,
}

impl ProgressSyncScheduler {
    pub fn new(store: ItemStore, transport: Arc<dyn Transport>, events: Arc<EventBus>) -> Self {
        Self {
            store,
            transport,
            events,
            run_guard: Mutex::new(()),
        }
    }

    /// One idempotent sync run.
    pub async fn run_once(&self) -> Result<SyncRunOutcome> {
        let _guard = match self.run_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Progress sync already running, skipping");
                return Ok(SyncRunOutcome::Success);
            }
        };

        let items = self.store.get_needing_sync().await?;
        if items.is_empty() {
            debug!("No items need progress sync");
            return Ok(SyncRunOutcome::Success);
        }
        info!("Syncing progress for {} item(s)", items.len());

        // No partial state is mutated when the host is unreachable
        let Some(host) = self.transport.find_peer_by_capability(HOST_CAPABILITY).await else {
            warn!("No reachable host peer, progress sync will retry later");
            return Ok(SyncRunOutcome::Retry);
        };

        let mut synced = 0usize;
        let mut failed = 0usize;

        for mut item in items {
            let now = Utc::now();
            let update = ProgressUpdate {
                item_id: item.item_id.clone(),
                position_ms: item.last_played_position_ms,
                is_fully_played: item.is_fully_played,
                timestamp_ms: now.timestamp_millis(),
            };

            item.last_sync_attempt_at = Some(now);
            match self
                .transport
                .send_message(&host, PATH_PROGRESS_SYNC, &update.to_bytes())
                .await
            {
                Ok(()) => {
                    item.needs_sync = false;
                    synced += 1;
                    debug!("Synced progress for {}", item.item_id);
                }
                Err(e) => {
                    // Flag stays set; the next run retries this item
                    failed += 1;
                    warn!("Failed to sync progress for {}: {e}", item.item_id);
                }
            }
            self.store.update(&item).await?;
        }

        info!("Progress sync finished: {synced} synced, {failed} failed");
        self.events.emit(SyncEvent::ProgressFlushed { synced, failed });

        if failed == 0 {
            Ok(SyncRunOutcome::Success)
        } else {
            Ok(SyncRunOutcome::Retry)
        }
    }

    #[cfg(test)]
    pub(crate) fn hold_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.run_guard.try_lock().unwrap()
    }

    /// Run once immediately, then on every `interval` tick until shutdown.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            // First tick fires immediately
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.run_once().await {
                            Ok(SyncRunOutcome::Success) => {}
                            Ok(SyncRunOutcome::Retry) => {
                                debug!("Progress sync run reported retryable failure");
                            }
                            Err(e) => error!("Progress sync run aborted: {e}"),
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            debug!("Progress sync scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}

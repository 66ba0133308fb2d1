//! Progress sync scheduler behavior: idempotence, per-item isolation and
//! host discovery.

mod helpers;

use companion_sync::companion::SyncRunOutcome;
use companion_sync::domain::{DownloadStatus, SyncItem};
use companion_sync::host::HostNode;
use companion_sync::transport::wire::{HOST_CAPABILITY, PATH_PROGRESS_SYNC};
use companion_sync::{CompanionNode, EventBus, ItemStore};
use helpers::{wait_for, FakeCovers, FakeLibrary, RecordingReporter, TestHub, TestTransport};
use std::sync::Arc;
use tempfile::TempDir;

struct SyncFixture {
    _host_dir: TempDir,
    _companion_dir: TempDir,
    companion_store: ItemStore,
    companion_transport: Arc<TestTransport>,
    companion: Arc<CompanionNode>,
    reporter: Arc<RecordingReporter>,
}

async fn setup(with_host: bool) -> SyncFixture {
    helpers::init_tracing();
    let hub = TestHub::new();
    let host_caps: &[&str] = &[HOST_CAPABILITY];

    let host_tmp = TempDir::new().unwrap();
    let companion_tmp = TempDir::new().unwrap();

    let reporter = RecordingReporter::new();
    if with_host {
        let (host_transport, host_events) = hub.register("host-node", host_caps);
        let host_store = ItemStore::open(&host_tmp.path().join("sync.db")).await.unwrap();
        let host = Arc::new(HostNode::new(
            host_store,
            host_transport,
            FakeLibrary::new(),
            FakeCovers::new(),
            reporter.clone(),
            Arc::new(EventBus::default()),
        ));
        tokio::spawn(host.run(host_events));
    }

    let (companion_transport, companion_events) = hub.register("companion-node", &[]);
    let companion_store = ItemStore::open(&companion_tmp.path().join("sync.db"))
        .await
        .unwrap();
    let companion = Arc::new(CompanionNode::new(
        companion_store.clone(),
        companion_transport.clone(),
        companion_tmp.path().to_path_buf(),
        Arc::new(EventBus::default()),
    ));
    tokio::spawn(companion.clone().run(companion_events));

    SyncFixture {
        _host_dir: host_tmp,
        _companion_dir: companion_tmp,
        companion_store,
        companion_transport,
        companion,
        reporter,
    }
}

async fn seed_item(store: &ItemStore, item_id: &str, duration_ms: i64) {
    let mut item = SyncItem::new(item_id, DownloadStatus::Completed);
    item.duration_ms = Some(duration_ms);
    store.upsert(&item).await.unwrap();
}

#[tokio::test]
async fn flush_clears_flags_and_reaches_host() {
    let fixture = setup(true).await;
    seed_item(&fixture.companion_store, "a", 60_000).await;
    seed_item(&fixture.companion_store, "b", 60_000).await;
    fixture.companion.playback().record_position("a", 10_000).await.unwrap();
    fixture.companion.playback().record_position("b", 20_000).await.unwrap();

    let outcome = fixture.companion.scheduler().run_once().await.unwrap();
    assert_eq!(outcome, SyncRunOutcome::Success);

    // Both updates arrive at the host-side reporter
    assert!(
        wait_for(|| {
            let reporter = fixture.reporter.clone();
            async move { reporter.received().len() == 2 }
        })
        .await
    );
    let positions: Vec<_> = fixture
        .reporter
        .received()
        .iter()
        .map(|u| (u.item_id.clone(), u.position_ms))
        .collect();
    assert!(positions.contains(&("a".to_string(), 10_000)));
    assert!(positions.contains(&("b".to_string(), 20_000)));

    for id in ["a", "b"] {
        let item = fixture.companion_store.get_by_id(id).await.unwrap().unwrap();
        assert!(!item.needs_sync);
        assert!(item.last_sync_attempt_at.is_some());
    }
}

#[tokio::test]
async fn second_run_with_no_new_progress_sends_nothing() {
    let fixture = setup(true).await;
    seed_item(&fixture.companion_store, "a", 60_000).await;
    fixture.companion.playback().record_position("a", 5_000).await.unwrap();

    assert_eq!(
        fixture.companion.scheduler().run_once().await.unwrap(),
        SyncRunOutcome::Success
    );
    let sent_after_first = fixture.companion_transport.sent_count(PATH_PROGRESS_SYNC);
    assert_eq!(sent_after_first, 1);

    assert_eq!(
        fixture.companion.scheduler().run_once().await.unwrap(),
        SyncRunOutcome::Success
    );
    assert_eq!(
        fixture.companion_transport.sent_count(PATH_PROGRESS_SYNC),
        sent_after_first
    );
}

#[tokio::test]
async fn one_failed_item_does_not_block_the_others() {
    let fixture = setup(true).await;
    for id in ["a", "b", "c"] {
        seed_item(&fixture.companion_store, id, 60_000).await;
        fixture.companion.playback().record_position(id, 1_000).await.unwrap();
    }
    fixture
        .companion_transport
        .fail_sends_containing("\"mediaItemId\":\"b\"");

    let outcome = fixture.companion.scheduler().run_once().await.unwrap();
    assert_eq!(outcome, SyncRunOutcome::Retry);

    for (id, expected) in [("a", false), ("b", true), ("c", false)] {
        let item = fixture.companion_store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(item.needs_sync, expected, "item {id}");
        assert!(item.last_sync_attempt_at.is_some(), "item {id}");
    }

    // The next run retries only the failed item
    fixture.companion_transport.clear_send_failures();
    let sent_before = fixture.companion_transport.sent_count(PATH_PROGRESS_SYNC);
    assert_eq!(
        fixture.companion.scheduler().run_once().await.unwrap(),
        SyncRunOutcome::Success
    );
    assert_eq!(
        fixture.companion_transport.sent_count(PATH_PROGRESS_SYNC),
        sent_before + 1
    );
    let item = fixture.companion_store.get_by_id("b").await.unwrap().unwrap();
    assert!(!item.needs_sync);
}

#[tokio::test]
async fn unreachable_host_retries_without_mutation() {
    let fixture = setup(false).await;
    seed_item(&fixture.companion_store, "a", 60_000).await;
    fixture.companion.playback().record_position("a", 1_000).await.unwrap();

    let outcome = fixture.companion.scheduler().run_once().await.unwrap();
    assert_eq!(outcome, SyncRunOutcome::Retry);

    assert_eq!(fixture.companion_transport.sent_count(PATH_PROGRESS_SYNC), 0);
    let item = fixture.companion_store.get_by_id("a").await.unwrap().unwrap();
    assert!(item.needs_sync);
    assert!(item.last_sync_attempt_at.is_none());
}

#[tokio::test]
async fn nothing_to_sync_succeeds_trivially() {
    let fixture = setup(true).await;
    seed_item(&fixture.companion_store, "a", 60_000).await;

    let outcome = fixture.companion.scheduler().run_once().await.unwrap();
    assert_eq!(outcome, SyncRunOutcome::Success);
    assert_eq!(fixture.companion_transport.sent_count(PATH_PROGRESS_SYNC), 0);
}

#[tokio::test]
async fn fully_played_position_is_normalized_on_the_wire() {
    let fixture = setup(true).await;
    seed_item(&fixture.companion_store, "a", 60_000).await;
    fixture.companion.playback().record_position("a", 65_000).await.unwrap();

    fixture.companion.scheduler().run_once().await.unwrap();

    assert!(
        wait_for(|| {
            let reporter = fixture.reporter.clone();
            async move { reporter.received().len() == 1 }
        })
        .await
    );
    let update = fixture.reporter.received().remove(0);
    assert!(update.is_fully_played);
    assert_eq!(update.position_ms, 0);
    assert!(update.timestamp_ms > 0);
}

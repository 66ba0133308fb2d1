//! Shared test harness: an in-process transport hub wiring two nodes
//! together, plus fake host-side collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use companion_sync::host::{CoverFetcher, LibraryError, LibraryItem, LocalLibrary, ProgressReporter};
use companion_sync::transport::wire::ProgressUpdate;
use companion_sync::transport::{
    BlobRef, PeerId, Record, Result as TransportResult, Transport, TransportError, TransportEvent,
};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

/// Install a log subscriber for test runs. Safe to call from every test;
/// only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// In-process stand-in for the platform messaging/replication layer.
/// Delivery is immediate; failure modes are injected per transport.
#[derive(Default)]
pub struct TestHub {
    inner: Mutex<HubInner>,
}

#[derive(Default)]
struct HubInner {
    peers: HashMap<PeerId, mpsc::UnboundedSender<TransportEvent>>,
    capabilities: HashMap<PeerId, HashSet<String>>,
}

impl TestHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a node and get its transport plus its inbound event channel.
    pub fn register(
        self: &Arc<Self>,
        node_id: &str,
        capabilities: &[&str],
    ) -> (Arc<TestTransport>, mpsc::UnboundedReceiver<TransportEvent>) {
        let peer = PeerId::from(node_id);
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut inner = self.inner.lock().unwrap();
            inner.peers.insert(peer.clone(), tx);
            inner.capabilities.insert(
                peer.clone(),
                capabilities.iter().map(|c| c.to_string()).collect(),
            );
        }
        let transport = Arc::new(TestTransport {
            hub: self.clone(),
            self_id: peer,
            sent: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            fail_publish: AtomicBool::new(false),
            fail_when_payload_contains: Mutex::new(None),
        });
        (transport, rx)
    }
}

pub struct TestTransport {
    hub: Arc<TestHub>,
    self_id: PeerId,
    /// (peer, path) of every successfully sent message
    pub sent: Mutex<Vec<(PeerId, String)>>,
    /// Names of every record accepted for replication
    pub published: Mutex<Vec<String>>,
    fail_publish: AtomicBool,
    fail_when_payload_contains: Mutex<Option<String>>,
}

impl TestTransport {
    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Fail any send whose payload contains `needle`.
    pub fn fail_sends_containing(&self, needle: &str) {
        *self.fail_when_payload_contains.lock().unwrap() = Some(needle.to_string());
    }

    pub fn clear_send_failures(&self) {
        *self.fail_when_payload_contains.lock().unwrap() = None;
    }

    pub fn sent_count(&self, path: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| p == path)
            .count()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for TestTransport {
    async fn send_message(&self, peer: &PeerId, path: &str, payload: &[u8]) -> TransportResult<()> {
        if let Some(needle) = self.fail_when_payload_contains.lock().unwrap().as_ref() {
            if String::from_utf8_lossy(payload).contains(needle.as_str()) {
                return Err(TransportError::SendFailed("injected failure".to_string()));
            }
        }
        let sender = {
            let inner = self.hub.inner.lock().unwrap();
            inner.peers.get(peer).cloned()
        };
        let Some(sender) = sender else {
            return Err(TransportError::PeerUnreachable(peer.clone()));
        };
        sender
            .send(TransportEvent::Message {
                from: self.self_id.clone(),
                path: path.to_string(),
                payload: payload.to_vec(),
            })
            .map_err(|_| TransportError::SendFailed("peer channel closed".to_string()))?;
        self.sent
            .lock()
            .unwrap()
            .push((peer.clone(), path.to_string()));
        Ok(())
    }

    async fn reachable_peers(&self) -> Vec<PeerId> {
        let inner = self.hub.inner.lock().unwrap();
        inner
            .peers
            .keys()
            .filter(|p| **p != self.self_id)
            .cloned()
            .collect()
    }

    async fn find_peer_by_capability(&self, capability: &str) -> Option<PeerId> {
        let inner = self.hub.inner.lock().unwrap();
        inner
            .capabilities
            .iter()
            .find(|(peer, caps)| **peer != self.self_id && caps.contains(capability))
            .map(|(peer, _)| peer.clone())
    }

    async fn put_record(&self, record: Record, _urgent: bool) -> TransportResult<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::PublishFailed("injected failure".to_string()));
        }
        self.published.lock().unwrap().push(record.name.clone());
        let senders: Vec<_> = {
            let inner = self.hub.inner.lock().unwrap();
            inner
                .peers
                .iter()
                .filter(|(peer, _)| **peer != self.self_id)
                .map(|(_, tx)| tx.clone())
                .collect()
        };
        for sender in senders {
            let _ = sender.send(TransportEvent::RecordChanged(record.clone()));
        }
        Ok(())
    }

    async fn open_blob(&self, blob: &BlobRef) -> TransportResult<Box<dyn AsyncRead + Send + Unpin>> {
        match blob {
            BlobRef::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::new(file))
            }
            BlobRef::Bytes(bytes) => Ok(Box::new(std::io::Cursor::new(bytes.clone()))),
            BlobRef::Handle(handle) => Err(TransportError::BlobUnavailable(handle.clone())),
        }
    }
}

/// Host library fake backed by a map.
#[derive(Default)]
pub struct FakeLibrary {
    items: Mutex<HashMap<String, LibraryItem>>,
}

impl FakeLibrary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, item: LibraryItem) {
        self.items
            .lock()
            .unwrap()
            .insert(item.item_id.clone(), item);
    }
}

#[async_trait]
impl LocalLibrary for FakeLibrary {
    async fn item_by_id(&self, item_id: &str) -> Result<Option<LibraryItem>, LibraryError> {
        Ok(self.items.lock().unwrap().get(item_id).cloned())
    }
}

/// Cover fetcher fake: serves fixed bytes, or fails when none are set.
#[derive(Default)]
pub struct FakeCovers {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl FakeCovers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, bytes: Vec<u8>) {
        *self.bytes.lock().unwrap() = Some(bytes);
    }
}

#[async_trait]
impl CoverFetcher for FakeCovers {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LibraryError> {
        self.bytes
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| LibraryError::Remote(format!("no cover at {url}")))
    }
}

/// Progress reporter fake recording every update it receives.
#[derive(Default)]
pub struct RecordingReporter {
    pub updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn received(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressReporter for RecordingReporter {
    async fn report(&self, update: &ProgressUpdate) -> Result<(), LibraryError> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

/// Poll `cond` until it holds or a few seconds pass.
pub async fn wait_for<F, Fut>(mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..250 {
        if cond().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

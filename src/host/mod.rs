//! Host side: owns the authoritative library and pushes content to the
//! companion

pub mod library;
pub mod orchestrator;
pub mod progress;

pub use library::{CoverFetcher, LibraryError, LibraryItem, LocalLibrary, ProgressReporter};
pub use orchestrator::DownloadOrchestrator;
pub use progress::ProgressHandler;

use crate::infrastructure::events::EventBus;
use crate::relay::StatusRelay;
use crate::store::ItemStore;
use crate::transport::wire::WireMessage;
use crate::transport::{Transport, TransportEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Host node: decodes inbound transport events once at the boundary and
/// dispatches them to the orchestrator, the ack relay and the progress
/// handler. The event loop never blocks on orchestration work.
pub struct HostNode {
    orchestrator: Arc<DownloadOrchestrator>,
    relay: StatusRelay,
    progress: Arc<ProgressHandler>,
}

impl HostNode {
    pub fn new(
        store: ItemStore,
        transport: Arc<dyn Transport>,
        library: Arc<dyn LocalLibrary>,
        covers: Arc<dyn CoverFetcher>,
        reporter: Arc<dyn ProgressReporter>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(DownloadOrchestrator::new(
                store.clone(),
                transport,
                library,
                covers,
                events.clone(),
            )),
            relay: StatusRelay::new(store, events.clone()),
            progress: Arc::new(ProgressHandler::new(reporter, events)),
        }
    }

    /// Entry point for UI-originated download requests on the host itself
    /// (the same path a `download/request` message takes).
    pub fn request_download(&self, item_id: &str) {
        let orchestrator = self.orchestrator.clone();
        let item_id = item_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = orchestrator.request_download(&item_id).await {
                error!("Download orchestration for {item_id} aborted: {e}");
            }
        });
    }

    /// Consume inbound transport events until the channel closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("Host transport event channel closed");
    }

    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Message { from, path, payload } => {
                let message = match WireMessage::decode(&path, &payload) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Dropping undecodable message on {path} from {from}: {e}");
                        return;
                    }
                };
                self.dispatch(message).await;
            }
            TransportEvent::RecordChanged(record) => {
                // The host publishes transfer records, it does not consume them
                debug!("Ignoring inbound record {}", record.name);
            }
            TransportEvent::RecordDeleted { name } => {
                debug!("Ignoring record deletion {name}");
            }
        }
    }

    async fn dispatch(&self, message: WireMessage) {
        match message {
            WireMessage::DownloadRequest { item_id } => {
                self.request_download(&item_id);
            }
            WireMessage::Ack {
                item_id,
                status,
                reason,
            } => {
                if let Err(e) = self.relay.apply(&item_id, status, reason.as_deref()).await {
                    error!("Failed to apply ack for {item_id}: {e}");
                }
            }
            WireMessage::ProgressSync(update) => {
                let progress = self.progress.clone();
                tokio::spawn(async move {
                    progress.handle(update).await;
                });
            }
            WireMessage::Status { item_id, .. } => {
                debug!("Unexpected status message on host for {item_id}");
            }
        }
    }
}

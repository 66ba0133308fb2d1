//! Abstraction over the platform messaging and replication layer
//!
//! Two primitives are wrapped here, both implemented by the embedding
//! platform: fire-and-forget messages to a specific reachable peer
//! (at-most-once, unordered across paths) and named record replication
//! (eventually consistent, last-write-wins per name). Neither guarantees
//! delivery to a peer that never becomes reachable.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::AsyncRead;

pub mod wire;

/// Transport layer errors, all observed locally. A successful send is never
/// a delivery receipt from the peer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Peer not reachable: {0}")]
    PeerUnreachable(PeerId),

    #[error("No reachable peers")]
    NoReachablePeers,

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Record publish rejected: {0}")]
    PublishFailed(String),

    #[error("Blob stream unavailable: {0}")]
    BlobUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Opaque identifier of a peer node, assigned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(pub String);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Reference to a large binary payload attached to a record. The bytes
/// themselves move through the replication layer; receivers open a stream
/// via [`Transport::open_blob`].
#[derive(Debug, Clone)]
pub enum BlobRef {
    /// Blob backed by a sender-local file
    File(PathBuf),
    /// Blob embedded directly as bytes (e.g. a fetched cover image)
    Bytes(Vec<u8>),
    /// Platform-assigned handle on the receiving side
    Handle(String),
}

/// A named, replicated key/value unit with zero or more blob attachments.
/// Publishing a record overwrites any prior record of the same name.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub name: String,
    pub fields: Map<String, Value>,
    pub blobs: HashMap<String, BlobRef>,
}

impl Record {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn put_str(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(key.to_string(), Value::String(value.into()));
    }

    pub fn put_i64(&mut self, key: &str, value: i64) {
        self.fields.insert(key.to_string(), Value::from(value));
    }

    pub fn put_blob(&mut self, key: &str, blob: BlobRef) {
        self.blobs.insert(key.to_string(), blob);
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn i64_field(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }

    pub fn blob(&self, key: &str) -> Option<&BlobRef> {
        self.blobs.get(key)
    }
}

/// Inbound transport events, delivered on a background context with no
/// ordering guarantee between different paths or record names.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A replicated record arrived or changed
    RecordChanged(Record),
    /// A replicated record was deleted by its publisher
    RecordDeleted { name: String },
    /// A path-addressed message arrived from a specific peer
    Message {
        from: PeerId,
        path: String,
        payload: Vec<u8>,
    },
}

/// Contract implemented by the platform transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Best-effort, at-most-once message to a specific reachable peer.
    async fn send_message(&self, peer: &PeerId, path: &str, payload: &[u8]) -> Result<()>;

    /// Best-effort current view of reachable peers.
    async fn reachable_peers(&self) -> Vec<PeerId>;

    /// Resolve a reachable peer advertising the named capability.
    async fn find_peer_by_capability(&self, capability: &str) -> Option<PeerId>;

    /// Publish a record for eventual replication, last-write-wins per name.
    /// Acceptance only means the record was queued, not that any peer
    /// received it.
    async fn put_record(&self, record: Record, urgent: bool) -> Result<()>;

    /// Open a byte stream for a blob attached to a received record.
    async fn open_blob(&self, blob: &BlobRef) -> Result<Box<dyn AsyncRead + Send + Unpin>>;
}

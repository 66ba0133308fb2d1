//! companion-sync
//!
//! Bidirectional synchronization of audiobook downloads and playback progress
//! between a host device (authoritative library) and a companion device
//! (offline cache). The two sides are loosely coupled: every exchange rides on
//! best-effort, eventually-delivered platform primitives, so the whole
//! protocol is a reactive, message-driven state machine with no synchronous
//! round-trips.
//!
//! Key components:
//! - `transport`: abstraction over the platform messaging/replication layer
//! - `store`: durable per-item sync state (SQLite via SeaORM)
//! - `host`: download orchestration and inbound progress handling
//! - `companion`: asset reception, playback tracking, progress sync scheduler
//! - `relay`: terminal-sticky status reconciliation shared by both sides

pub mod companion;
pub mod config;
pub mod domain;
pub mod host;
pub mod infrastructure;
pub mod relay;
pub mod store;
pub mod transport;

pub use companion::CompanionNode;
pub use config::SyncConfig;
pub use domain::{DownloadStatus, SyncItem};
pub use host::HostNode;
pub use infrastructure::events::{EventBus, SyncEvent};
pub use store::ItemStore;
pub use transport::{BlobRef, PeerId, Record, Transport, TransportEvent};

//! Domain types shared by both sides of the sync protocol

mod item;

pub use item::{DownloadStatus, SyncItem};

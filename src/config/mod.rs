//! Sync configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Configuration shared by both node roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Config schema version
    pub version: u32,

    /// Data directory (database, downloads)
    pub data_dir: PathBuf,

    /// Logging level for the embedding shell's subscriber
    pub log_level: String,

    /// Progress sync interval in seconds (hours-scale by default)
    pub sync_interval_secs: u64,
}

impl SyncConfig {
    const CURRENT_VERSION: u32 = 1;
    const FILE_NAME: &'static str = "companion-sync.json";

    /// Load configuration from `data_dir`, creating a default one if none
    /// exists yet.
    pub fn load_from(data_dir: &PathBuf) -> Result<Self> {
        let config_path = data_dir.join(Self::FILE_NAME);

        if config_path.exists() {
            info!("Loading config from {:?}", config_path);
            let json = fs::read_to_string(&config_path)?;
            let config: SyncConfig = serde_json::from_str(&json)?;
            if config.version > Self::CURRENT_VERSION {
                return Err(anyhow!("Unknown config version: {}", config.version));
            }
            Ok(config)
        } else {
            warn!("No config found, creating default at {:?}", config_path);
            let config = Self::default_with_dir(data_dir.clone());
            config.save()?;
            Ok(config)
        }
    }

    /// Create default configuration with specific data directory
    pub fn default_with_dir(data_dir: PathBuf) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            data_dir,
            log_level: "info".to_string(),
            // Every 6 hours, plus once at process start
            sync_interval_secs: 6 * 60 * 60,
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;

        let config_path = self.data_dir.join(Self::FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, json)?;
        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Path of the sync item database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("sync.db")
    }

    /// Directory where materialized downloads live.
    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

//! TOML settings for the catalog tools
//!
//! Selects the storage backend (snapshot file or PostgreSQL), the decoder,
//! and optionally overrides pipeline parameters:
//!
//! ```toml
//! [storage]
//! backend = "postgresql"
//!
//! [storage.postgresql]
//! host = "db.local"
//!
//! [decoder]
//! backend = "ffmpeg"
//!
//! [pipeline]
//! fanout = 8
//! ```

use crate::audio::{Decoder, FfmpegDecoder, NativeDecoder};
use crate::config::SoundmarkConfig;
use crate::error::{Result, SoundmarkError};
use crate::store::{FingerprintStore, MemoryStore, PostgresStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main settings structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SoundmarkSettings {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub decoder: DecoderSettings,
    #[serde(default)]
    pub pipeline: SoundmarkConfig,
}

/// Storage backend configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub snapshot: SnapshotSettings,
    #[serde(default)]
    pub postgresql: PostgresSettings,
}

/// Storage backend type
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Snapshot,
    Postgresql,
}

/// Snapshot file backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotSettings {
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./catalog.smcat")
}

/// PostgreSQL backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_database() -> String {
    "soundmark".to_string()
}
fn default_user() -> String {
    "soundmark_user".to_string()
}
fn default_password() -> String {
    "soundmark_pass".to_string()
}
fn default_max_connections() -> u32 {
    10
}

/// Decoder selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecoderSettings {
    #[serde(default)]
    pub backend: DecoderBackend,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            backend: DecoderBackend::default(),
            ffmpeg_path: default_ffmpeg_path(),
        }
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecoderBackend {
    #[default]
    Native,
    Ffmpeg,
}

impl SoundmarkSettings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SoundmarkError::InvalidConfig(format!(
                "failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: SoundmarkSettings = toml::from_str(content).map_err(|e| {
            SoundmarkError::InvalidConfig(format!("failed to parse TOML settings: {}", e))
        })?;
        settings.pipeline.validate()?;
        Ok(settings)
    }

    /// Get PostgreSQL connection string (password elided)
    pub fn connection_string(&self) -> Option<String> {
        match self.storage.backend {
            StorageBackend::Postgresql => {
                let pg = &self.storage.postgresql;
                Some(format!(
                    "postgresql://{}:***@{}:{}/{}",
                    pg.user, pg.host, pg.port, pg.database
                ))
            }
            StorageBackend::Snapshot => None,
        }
    }

    /// Open the configured catalog backend
    pub fn open_store(&self) -> Result<Box<dyn FingerprintStore>> {
        match self.storage.backend {
            StorageBackend::Snapshot => {
                let store = MemoryStore::open(&self.storage.snapshot.path)?;
                Ok(Box::new(store))
            }
            StorageBackend::Postgresql => {
                let store = PostgresStore::connect(&self.storage.postgresql)?;
                Ok(Box::new(store))
            }
        }
    }

    /// Build the configured decoder for the pipeline's sample rate
    pub fn build_decoder(&self) -> Box<dyn Decoder> {
        let rate = self.pipeline.sample_rate;
        match self.decoder.backend {
            DecoderBackend::Native => Box::new(NativeDecoder::new(rate)),
            DecoderBackend::Ffmpeg => {
                Box::new(FfmpegDecoder::with_binary(&self.decoder.ffmpeg_path, rate))
            }
        }
    }
}

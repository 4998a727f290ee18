//! Per-track export files
//!
//! A single catalog track with its landmarks, stored as JSON or BSON so tracks
//! can be moved between catalogs or inspected by hand.

use crate::format::SnapshotTrack;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Export file format version
pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackExport {
    pub version: String,
    pub exported_at: String,
    pub fingerprint_count: usize,
    pub track: SnapshotTrack,
}

impl TrackExport {
    pub fn new(track: SnapshotTrack) -> Self {
        Self {
            version: EXPORT_VERSION.to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            fingerprint_count: track.landmarks.len(),
            track,
        }
    }

    /// Save as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json_str = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json_str)
            .with_context(|| format!("Failed to write export: {}", path.display()))?;
        Ok(())
    }

    /// Save as a BSON document
    pub fn save_bson(&self, path: &Path) -> Result<()> {
        let doc = bson::to_document(self).context("Failed to encode export as BSON")?;
        let mut bytes = Vec::new();
        doc.to_writer(&mut bytes)?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write export: {}", path.display()))?;
        Ok(())
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read export: {}", path.display()))?;
        let export: TrackExport = serde_json::from_str(&json_str)
            .with_context(|| format!("Invalid JSON export: {}", path.display()))?;
        Ok(export)
    }

    /// Load from a BSON file
    pub fn load_bson(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read export: {}", path.display()))?;
        let doc = bson::Document::from_reader(&mut &bytes[..])
            .with_context(|| format!("Invalid BSON export: {}", path.display()))?;
        Ok(bson::from_document(doc)?)
    }

    /// Load by extension, falling back to JSON then BSON for unknown extensions
    pub fn load_auto(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::load(path),
            Some("bson") => Self::load_bson(path),
            _ => Self::load(path).or_else(|_| Self::load_bson(path)),
        }
    }

    /// Save by extension (`.bson` selects BSON, anything else JSON)
    pub fn save_auto(&self, path: &Path) -> Result<()> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bson") => self.save_bson(path),
            _ => self.save(path),
        }
    }
}

//! Catalog snapshot writer

use crate::format::{CatalogSnapshot, SnapshotHeader};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// CRC used for snapshot payload checksums
pub(crate) const CHECKSUM: crc::Crc<u64> = crc::Crc::<u64>::new(&crc::CRC_64_ECMA_182);

pub struct SnapshotWriter {
    compress: bool,
    level: i32,
}

impl SnapshotWriter {
    pub fn new() -> Self {
        Self {
            compress: true,
            level: 3,
        }
    }

    /// Writer that stores the payload without zstd compression
    pub fn uncompressed() -> Self {
        Self {
            compress: false,
            level: 0,
        }
    }

    /// Write a snapshot file.
    ///
    /// The file is written next to `path` first and renamed into place, so a
    /// crash mid-write never leaves a truncated catalog behind.
    pub fn write(&self, path: &Path, snapshot: &CatalogSnapshot) -> Result<()> {
        let payload = bincode::serialize(snapshot).context("Failed to encode catalog snapshot")?;

        let mut header = SnapshotHeader::new(
            payload.len() as u64,
            snapshot.tracks.len() as u32,
            snapshot.num_landmarks(),
        );

        let stored = if self.compress {
            let compressed = zstd::encode_all(&payload[..], self.level)
                .context("Failed to compress catalog snapshot")?;
            header.set_compressed(true);
            header.payload_size_compressed = compressed.len() as u64;
            compressed
        } else {
            payload
        };
        header.checksum = CHECKSUM.checksum(&stored);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create snapshot directory: {}", parent.display())
                })?;
            }
        }

        let tmp_path = path.with_extension("smcat.tmp");
        {
            let file = File::create(&tmp_path)
                .with_context(|| format!("Failed to create snapshot: {}", tmp_path.display()))?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&header.to_bytes())?;
            writer.write_all(&stored)?;
            writer.flush()?;
        }

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move snapshot into place: {}", path.display()))?;

        Ok(())
    }
}

impl Default for SnapshotWriter {
    fn default() -> Self {
        Self::new()
    }
}

//! Catalog snapshot reader

use crate::format::{CatalogSnapshot, FormatError, SnapshotHeader, HEADER_SIZE};
use crate::writer::CHECKSUM;
use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

pub struct SnapshotReader;

impl SnapshotReader {
    /// Read and validate a snapshot file
    pub fn read(path: &Path) -> Result<CatalogSnapshot> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open snapshot: {}", path.display()))?;

        // SAFETY: the mapping is read-only and dropped before this function returns;
        // snapshots are replaced by rename, never rewritten in place.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to map snapshot: {}", path.display()))?;

        let header = SnapshotHeader::from_bytes(&mmap)?;
        let stored_len = header.stored_payload_size() as usize;
        let end = HEADER_SIZE + stored_len;
        if mmap.len() < end {
            return Err(FormatError::Truncated(mmap.len()).into());
        }

        let stored = &mmap[HEADER_SIZE..end];
        let actual = CHECKSUM.checksum(stored);
        if actual != header.checksum {
            return Err(FormatError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            }
            .into());
        }

        let snapshot = if header.is_compressed() {
            let payload = zstd::decode_all(stored).context("Failed to decompress snapshot")?;
            bincode::deserialize::<CatalogSnapshot>(&payload)
        } else {
            bincode::deserialize::<CatalogSnapshot>(stored)
        };
        let snapshot = snapshot.context("Failed to decode catalog snapshot")?;

        Ok(snapshot)
    }

    /// Read only the header (track and landmark counts) without decoding the payload
    pub fn read_header(path: &Path) -> Result<SnapshotHeader> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open snapshot: {}", path.display()))?;
        // SAFETY: see `read`.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to map snapshot: {}", path.display()))?;
        Ok(SnapshotHeader::from_bytes(&mmap)?)
    }
}

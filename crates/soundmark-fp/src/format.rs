//! Catalog snapshot file structures

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Magic bytes for catalog snapshots: "SMCT"
pub const MAGIC: [u8; 4] = [0x53, 0x4D, 0x43, 0x54];

/// Current format version
pub const VERSION: u16 = 1;

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 64;

/// Header flag: payload is zstd-compressed
pub const FLAG_COMPRESSED: u16 = 0x1;

/// Header validation failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("file too short for a snapshot header ({0} bytes)")]
    Truncated(usize),
    #[error("invalid snapshot: magic bytes mismatch")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u16),
    #[error("snapshot checksum mismatch (header {expected:#018x}, payload {actual:#018x})")]
    ChecksumMismatch { expected: u64, actual: u64 },
}

/// File header (64 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Magic bytes: "SMCT"
    pub magic: [u8; 4],
    /// Format version
    pub version: u16,
    /// Flags (bit 0: compressed)
    pub flags: u16,
    /// Size of the bincode payload before compression
    pub payload_size: u64,
    /// Stored payload size (0 if uncompressed)
    pub payload_size_compressed: u64,
    /// Number of tracks
    pub num_tracks: u32,
    /// Reserved
    pub reserved1: u32,
    /// Number of landmarks across all tracks
    pub num_landmarks: u64,
    /// CRC-64/ECMA-182 of the stored payload bytes
    pub checksum: u64,
    /// Reserved
    pub reserved2: [u8; 16],
}

impl SnapshotHeader {
    pub fn new(payload_size: u64, num_tracks: u32, num_landmarks: u64) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            payload_size,
            payload_size_compressed: 0,
            num_tracks,
            reserved1: 0,
            num_landmarks,
            checksum: 0,
            reserved2: [0; 16],
        }
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & FLAG_COMPRESSED) != 0
    }

    pub fn set_compressed(&mut self, compressed: bool) {
        if compressed {
            self.flags |= FLAG_COMPRESSED;
        } else {
            self.flags &= !FLAG_COMPRESSED;
        }
    }

    /// Number of payload bytes following the header
    pub fn stored_payload_size(&self) -> u64 {
        if self.is_compressed() {
            self.payload_size_compressed
        } else {
            self.payload_size
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..16].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.payload_size_compressed.to_le_bytes());
        buf[24..28].copy_from_slice(&self.num_tracks.to_le_bytes());
        buf[28..32].copy_from_slice(&self.reserved1.to_le_bytes());
        buf[32..40].copy_from_slice(&self.num_landmarks.to_le_bytes());
        buf[40..48].copy_from_slice(&self.checksum.to_le_bytes());
        buf[48..64].copy_from_slice(&self.reserved2);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Truncated(bytes.len()));
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != MAGIC {
            return Err(FormatError::BadMagic);
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let mut reserved2 = [0u8; 16];
        reserved2.copy_from_slice(&bytes[48..64]);

        Ok(Self {
            magic,
            version,
            flags: u16::from_le_bytes([bytes[6], bytes[7]]),
            payload_size: read_u64(&bytes[8..16]),
            payload_size_compressed: read_u64(&bytes[16..24]),
            num_tracks: read_u32(&bytes[24..28]),
            reserved1: read_u32(&bytes[28..32]),
            num_landmarks: read_u64(&bytes[32..40]),
            checksum: read_u64(&bytes[40..48]),
            reserved2,
        })
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

/// One stored landmark
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotLandmark {
    pub hash: u32,
    pub time_offset_ms: u32,
    pub anchor_freq: u16,
    pub target_freq: u16,
    pub delta_time_ms: f32,
    pub strength: f32,
}

/// One catalog track with its landmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTrack {
    pub track_id: u64,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_seconds: f64,
    /// Pipeline version tag the landmarks were generated with
    pub pipeline_tag: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    pub landmarks: Vec<SnapshotLandmark>,
}

/// Complete catalog payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Next identifier the catalog will hand out
    pub next_track_id: u64,
    pub tracks: Vec<SnapshotTrack>,
}

impl CatalogSnapshot {
    pub fn num_landmarks(&self) -> u64 {
        self.tracks.iter().map(|t| t.landmarks.len() as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bytes_layout() {
        let mut header = SnapshotHeader::new(1234, 7, 99_000);
        header.set_compressed(true);
        header.payload_size_compressed = 321;
        header.checksum = 0xDEAD_BEEF_0BAD_F00D;

        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"SMCT");
        assert_eq!(SnapshotHeader::from_bytes(&bytes).unwrap(), header);
        assert_eq!(header.stored_payload_size(), 321);
    }

    #[test]
    fn test_header_rejects_bad_input() {
        assert_eq!(
            SnapshotHeader::from_bytes(&[0u8; 10]),
            Err(FormatError::Truncated(10))
        );

        let mut bytes = SnapshotHeader::new(0, 0, 0).to_bytes();
        bytes[0] = b'X';
        assert_eq!(SnapshotHeader::from_bytes(&bytes), Err(FormatError::BadMagic));

        let mut bytes = SnapshotHeader::new(0, 0, 0).to_bytes();
        bytes[4..6].copy_from_slice(&9u16.to_le_bytes());
        assert_eq!(
            SnapshotHeader::from_bytes(&bytes),
            Err(FormatError::UnsupportedVersion(9))
        );
    }
}

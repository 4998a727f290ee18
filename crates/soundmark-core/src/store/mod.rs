//! Fingerprint catalog storage
//!
//! The catalog maps landmark hashes to `(track, offset)` postings and keeps
//! one record per track. Backends differ in durability only; every
//! implementation publishes a track with all of its landmarks at once and
//! removes both together.

mod memory;
mod postgres;

pub use memory::{from_snapshot_track, to_snapshot_track, MemoryStore};
pub use postgres::PostgresStore;

use crate::error::Result;
use crate::landmark::Landmark;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TrackId = u64;

/// One hit of a hash lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub track_id: TrackId,
    pub time_offset_ms: u32,
    pub hash: u32,
}

/// Track fields supplied at ingest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_seconds: f64,
    pub pipeline_tag: String,
}

/// Stored track metadata, without its landmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track_id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_seconds: f64,
    pub pipeline_tag: String,
    pub created_at: DateTime<Utc>,
    pub fingerprint_count: usize,
}

/// Catalog backend
pub trait FingerprintStore: Send + Sync {
    /// Store a track and its landmarks atomically, returning the new id
    fn insert_track(&self, track: &NewTrack, landmarks: &[Landmark]) -> Result<TrackId>;

    /// All postings for `hashes`, grouped by hash in the given order, then by
    /// track and offset
    fn lookup_by_hashes(&self, hashes: &[u32]) -> Result<Vec<Posting>>;

    /// Remove a track and all its postings; `false` if it did not exist
    fn remove_track(&self, track_id: TrackId) -> Result<bool>;

    fn track(&self, track_id: TrackId) -> Result<Option<TrackRecord>>;

    /// Records of the existing tracks among `track_ids`, ordered by id
    fn tracks(&self, track_ids: &[TrackId]) -> Result<Vec<TrackRecord>> {
        let mut records = Vec::with_capacity(track_ids.len());
        for &track_id in track_ids {
            records.extend(self.track(track_id)?);
        }
        records.sort_by_key(|r| r.track_id);
        Ok(records)
    }

    /// Every track, ordered by id
    fn list_tracks(&self) -> Result<Vec<TrackRecord>>;

    /// Landmarks of one track ordered by `(time_offset_ms, hash)`
    fn landmarks(&self, track_id: TrackId) -> Result<Vec<Landmark>>;

    /// Persist pending changes, if the backend buffers any
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

//! In-memory catalog with optional snapshot persistence

use super::{FingerprintStore, NewTrack, Posting, TrackId, TrackRecord};
use crate::error::{Result, SoundmarkError};
use crate::landmark::Landmark;
use chrono::{DateTime, Utc};
use soundmark_fp::{CatalogSnapshot, SnapshotLandmark, SnapshotReader, SnapshotTrack, SnapshotWriter};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct StoredTrack {
    record: TrackRecord,
    landmarks: Vec<Landmark>,
}

struct Catalog {
    next_id: TrackId,
    tracks: BTreeMap<TrackId, StoredTrack>,
    /// hash -> postings in insertion order
    index: HashMap<u32, Vec<(TrackId, u32)>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            next_id: 1,
            tracks: BTreeMap::new(),
            index: HashMap::new(),
        }
    }
}

impl Catalog {
    fn publish(&mut self, track_id: TrackId, stored: StoredTrack) {
        for landmark in &stored.landmarks {
            self.index
                .entry(landmark.hash)
                .or_default()
                .push((track_id, landmark.time_offset_ms));
        }
        self.tracks.insert(track_id, stored);
        self.next_id = self.next_id.max(track_id + 1);
    }
}

/// `RwLock`-guarded hash index plus track records.
///
/// Lookups share the read lock; an insert or removal changes the index and
/// the record table under a single write lock.
pub struct MemoryStore {
    catalog: RwLock<Catalog>,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(Catalog::default()),
            snapshot_path: None,
        }
    }

    /// Open a snapshot-backed store; a missing file starts an empty catalog
    pub fn open(path: &Path) -> Result<Self> {
        let mut store = if path.exists() {
            let snapshot = SnapshotReader::read(path).map_err(SoundmarkError::storage)?;
            let store = Self::from_snapshot(snapshot)?;
            log::info!(
                "Loaded catalog snapshot {} ({} tracks)",
                path.display(),
                store.read()?.tracks.len()
            );
            store
        } else {
            log::info!("No snapshot at {}, starting empty catalog", path.display());
            Self::new()
        };
        store.snapshot_path = Some(path.to_path_buf());
        Ok(store)
    }

    /// Write the whole catalog to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = self.to_snapshot()?;
        SnapshotWriter::new()
            .write(path, &snapshot)
            .map_err(SoundmarkError::storage)?;
        log::info!(
            "Saved catalog snapshot {} ({} tracks, {} landmarks)",
            path.display(),
            snapshot.tracks.len(),
            snapshot.num_landmarks()
        );
        Ok(())
    }

    pub fn to_snapshot(&self) -> Result<CatalogSnapshot> {
        let catalog = self.read()?;
        let tracks = catalog
            .tracks
            .values()
            .map(|stored| to_snapshot_track(&stored.record, &stored.landmarks))
            .collect();

        Ok(CatalogSnapshot {
            next_track_id: catalog.next_id,
            tracks,
        })
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Result<Self> {
        let mut catalog = Catalog::default();
        for track in snapshot.tracks {
            let (record, landmarks) = from_snapshot_track(track)?;
            catalog.publish(record.track_id, StoredTrack { record, landmarks });
        }
        catalog.next_id = catalog.next_id.max(snapshot.next_track_id);

        Ok(Self {
            catalog: RwLock::new(catalog),
            snapshot_path: None,
        })
    }

    /// Insert a track under its existing id, e.g. when importing an export
    pub fn restore_track(&self, record: TrackRecord, landmarks: Vec<Landmark>) -> Result<()> {
        let mut catalog = self.write()?;
        if catalog.tracks.contains_key(&record.track_id) {
            return Err(SoundmarkError::Storage(format!(
                "track {} already exists",
                record.track_id
            )));
        }
        catalog.publish(record.track_id, StoredTrack { record, landmarks });
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Catalog>> {
        self.catalog
            .read()
            .map_err(|_| SoundmarkError::Storage("catalog lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Catalog>> {
        self.catalog
            .write()
            .map_err(|_| SoundmarkError::Storage("catalog lock poisoned".to_string()))
    }
}

impl FingerprintStore for MemoryStore {
    fn insert_track(&self, track: &NewTrack, landmarks: &[Landmark]) -> Result<TrackId> {
        let mut catalog = self.write()?;
        let track_id = catalog.next_id;

        let record = TrackRecord {
            track_id,
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            duration_seconds: track.duration_seconds,
            pipeline_tag: track.pipeline_tag.clone(),
            created_at: Utc::now(),
            fingerprint_count: landmarks.len(),
        };
        catalog.publish(
            track_id,
            StoredTrack {
                record,
                landmarks: landmarks.to_vec(),
            },
        );
        Ok(track_id)
    }

    fn lookup_by_hashes(&self, hashes: &[u32]) -> Result<Vec<Posting>> {
        let catalog = self.read()?;
        let mut postings = Vec::new();
        for &hash in hashes {
            if let Some(hits) = catalog.index.get(&hash) {
                let start = postings.len();
                postings.extend(hits.iter().map(|&(track_id, time_offset_ms)| Posting {
                    track_id,
                    time_offset_ms,
                    hash,
                }));
                postings[start..].sort_by_key(|p| (p.track_id, p.time_offset_ms));
            }
        }
        Ok(postings)
    }

    fn remove_track(&self, track_id: TrackId) -> Result<bool> {
        let mut catalog = self.write()?;
        let Some(stored) = catalog.tracks.remove(&track_id) else {
            return Ok(false);
        };

        for landmark in &stored.landmarks {
            if let Some(hits) = catalog.index.get_mut(&landmark.hash) {
                hits.retain(|&(id, _)| id != track_id);
                if hits.is_empty() {
                    catalog.index.remove(&landmark.hash);
                }
            }
        }
        Ok(true)
    }

    fn track(&self, track_id: TrackId) -> Result<Option<TrackRecord>> {
        Ok(self.read()?.tracks.get(&track_id).map(|s| s.record.clone()))
    }

    fn tracks(&self, track_ids: &[TrackId]) -> Result<Vec<TrackRecord>> {
        let catalog = self.read()?;
        let mut records: Vec<TrackRecord> = track_ids
            .iter()
            .filter_map(|id| catalog.tracks.get(id).map(|s| s.record.clone()))
            .collect();
        records.sort_by_key(|r| r.track_id);
        records.dedup_by_key(|r| r.track_id);
        Ok(records)
    }

    fn list_tracks(&self) -> Result<Vec<TrackRecord>> {
        Ok(self.read()?.tracks.values().map(|s| s.record.clone()).collect())
    }

    fn landmarks(&self, track_id: TrackId) -> Result<Vec<Landmark>> {
        self.read()?
            .tracks
            .get(&track_id)
            .map(|s| s.landmarks.clone())
            .ok_or(SoundmarkError::TrackNotFound(track_id))
    }

    fn flush(&self) -> Result<()> {
        match &self.snapshot_path {
            Some(path) => self.save(path),
            None => Ok(()),
        }
    }
}

/// Snapshot/export form of a track
pub fn to_snapshot_track(record: &TrackRecord, landmarks: &[Landmark]) -> SnapshotTrack {
    SnapshotTrack {
        track_id: record.track_id,
        title: record.title.clone(),
        artist: record.artist.clone(),
        album: record.album.clone(),
        duration_seconds: record.duration_seconds,
        pipeline_tag: record.pipeline_tag.clone(),
        created_at: record.created_at.to_rfc3339(),
        landmarks: landmarks
            .iter()
            .map(|l| SnapshotLandmark {
                hash: l.hash,
                time_offset_ms: l.time_offset_ms,
                anchor_freq: l.anchor_freq,
                target_freq: l.target_freq,
                delta_time_ms: l.delta_time_ms,
                strength: l.strength,
            })
            .collect(),
    }
}

/// Inverse of [`to_snapshot_track`]
pub fn from_snapshot_track(track: SnapshotTrack) -> Result<(TrackRecord, Vec<Landmark>)> {
    let created_at = DateTime::parse_from_rfc3339(&track.created_at)
        .map_err(|e| {
            SoundmarkError::Storage(format!(
                "track {} has an invalid created_at '{}': {}",
                track.track_id, track.created_at, e
            ))
        })?
        .with_timezone(&Utc);

    let landmarks: Vec<Landmark> = track
        .landmarks
        .iter()
        .map(|l| Landmark {
            hash: l.hash,
            time_offset_ms: l.time_offset_ms,
            anchor_freq: l.anchor_freq,
            target_freq: l.target_freq,
            delta_time_ms: l.delta_time_ms,
            strength: l.strength,
        })
        .collect();

    let record = TrackRecord {
        track_id: track.track_id,
        title: track.title,
        artist: track.artist,
        album: track.album,
        duration_seconds: track.duration_seconds,
        pipeline_tag: track.pipeline_tag,
        created_at,
        fingerprint_count: landmarks.len(),
    };
    Ok((record, landmarks))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landmark(hash: u32, time_offset_ms: u32) -> Landmark {
        Landmark {
            hash,
            time_offset_ms,
            anchor_freq: 10,
            target_freq: 20,
            delta_time_ms: 23.2,
            strength: 0.5,
        }
    }

    fn new_track(title: &str) -> NewTrack {
        NewTrack {
            title: title.to_string(),
            artist: "Generator".to_string(),
            album: None,
            duration_seconds: 10.0,
            pipeline_tag: "v1-test".to_string(),
        }
    }

    #[test]
    fn test_insert_assigns_ids_and_indexes_postings() {
        let store = MemoryStore::new();
        let a = store
            .insert_track(&new_track("A"), &[landmark(1, 0), landmark(2, 100)])
            .unwrap();
        let b = store.insert_track(&new_track("B"), &[landmark(2, 500)]).unwrap();
        assert_eq!((a, b), (1, 2));

        let postings = store.lookup_by_hashes(&[2, 99, 1]).unwrap();
        assert_eq!(
            postings,
            vec![
                Posting { track_id: a, time_offset_ms: 100, hash: 2 },
                Posting { track_id: b, time_offset_ms: 500, hash: 2 },
                Posting { track_id: a, time_offset_ms: 0, hash: 1 },
            ]
        );

        let record = store.track(a).unwrap().unwrap();
        assert_eq!(record.title, "A");
        assert_eq!(record.fingerprint_count, 2);
        assert_eq!(store.list_tracks().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_drops_record_and_postings() {
        let store = MemoryStore::new();
        let a = store.insert_track(&new_track("A"), &[landmark(7, 0)]).unwrap();
        let b = store.insert_track(&new_track("B"), &[landmark(7, 40)]).unwrap();

        assert!(store.remove_track(a).unwrap());
        assert!(!store.remove_track(a).unwrap());
        assert!(store.track(a).unwrap().is_none());
        assert!(matches!(
            store.landmarks(a),
            Err(SoundmarkError::TrackNotFound(id)) if id == a
        ));

        let postings = store.lookup_by_hashes(&[7]).unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].track_id, b);

        // Ids are never reused
        let c = store.insert_track(&new_track("C"), &[]).unwrap();
        assert_eq!(c, 3);
    }

    #[test]
    fn test_snapshot_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.smcat");

        let store = MemoryStore::open(&path).unwrap();
        let a = store
            .insert_track(&new_track("A"), &[landmark(1, 0), landmark(3, 60)])
            .unwrap();
        store.insert_track(&new_track("B"), &[landmark(3, 10)]).unwrap();
        store.remove_track(a).unwrap();
        store.flush().unwrap();

        let reopened = MemoryStore::open(&path).unwrap();
        let tracks = reopened.list_tracks().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "B");
        assert_eq!(tracks, store.list_tracks().unwrap());
        assert_eq!(reopened.lookup_by_hashes(&[3]).unwrap().len(), 1);
        assert!(reopened.lookup_by_hashes(&[1]).unwrap().is_empty());

        // next id survives the round trip
        let c = reopened.insert_track(&new_track("C"), &[]).unwrap();
        assert_eq!(c, 3);
    }

    #[test]
    fn test_restore_track_rejects_duplicate_ids() {
        let store = MemoryStore::new();
        let id = store.insert_track(&new_track("A"), &[landmark(5, 0)]).unwrap();
        let record = store.track(id).unwrap().unwrap();
        let landmarks = store.landmarks(id).unwrap();

        assert!(store.restore_track(record.clone(), landmarks.clone()).is_err());

        let other = MemoryStore::new();
        other.restore_track(record, landmarks).unwrap();
        assert_eq!(other.lookup_by_hashes(&[5]).unwrap()[0].track_id, id);
        assert_eq!(other.insert_track(&new_track("B"), &[]).unwrap(), id + 1);
    }

    #[test]
    fn test_lookup_orders_postings_by_track_within_hash() {
        let store = MemoryStore::new();
        let a = store.insert_track(&new_track("A"), &[landmark(4, 0)]).unwrap();
        let b = store.insert_track(&new_track("B"), &[landmark(4, 900)]).unwrap();
        let record = store.track(a).unwrap().unwrap();
        store.remove_track(a).unwrap();

        // Restored after B, but still listed before it
        store
            .restore_track(record, vec![landmark(4, 300), landmark(6, 0)])
            .unwrap();
        let postings = store.lookup_by_hashes(&[6, 4]).unwrap();
        let order: Vec<(u32, TrackId)> = postings.iter().map(|p| (p.hash, p.track_id)).collect();
        assert_eq!(order, vec![(6, a), (4, a), (4, b)]);
    }

    #[test]
    fn test_tracks_fetches_existing_records_in_one_call() {
        let store = MemoryStore::new();
        let a = store.insert_track(&new_track("A"), &[]).unwrap();
        let b = store.insert_track(&new_track("B"), &[]).unwrap();

        let records = store.tracks(&[b, 42, a, b]).unwrap();
        let ids: Vec<TrackId> = records.iter().map(|r| r.track_id).collect();
        assert_eq!(ids, vec![a, b]);
        assert!(store.tracks(&[]).unwrap().is_empty());
    }
}

//! PostgreSQL catalog backend
//!
//! Wraps the async `soundmark-db` operations behind the synchronous store
//! trait with an owned tokio runtime.

use super::{FingerprintStore, NewTrack, Posting, TrackId, TrackRecord};
use crate::error::{Result, SoundmarkError};
use crate::landmark::Landmark;
use crate::settings::PostgresSettings;
use deadpool_postgres::Pool;
use soundmark_db::{self as db, LandmarkRow, NewLandmark, TrackRow};
use tokio::runtime::{Builder, Runtime};

const RUNTIME_WORKERS: usize = 2;

pub struct PostgresStore {
    runtime: Runtime,
    pool: Pool,
}

impl PostgresStore {
    /// Connect, verify the connection and bootstrap the schema
    pub fn connect(settings: &PostgresSettings) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(RUNTIME_WORKERS)
            .thread_name("soundmark-pg")
            .enable_all()
            .build()
            .map_err(|e| SoundmarkError::Storage(format!("failed to start runtime: {}", e)))?;

        let pool = db::create_pool(
            &settings.host,
            settings.port,
            &settings.database,
            &settings.user,
            &settings.password,
            settings.max_connections,
        )
        .map_err(SoundmarkError::storage)?;

        runtime
            .block_on(async {
                db::test_connection(&pool).await?;
                db::ensure_schema(&pool).await
            })
            .map_err(SoundmarkError::storage)?;

        log::info!(
            "Connected to PostgreSQL at {}:{}/{}",
            settings.host,
            settings.port,
            settings.database
        );
        Ok(Self { runtime, pool })
    }

    fn run<T>(&self, fut: impl std::future::Future<Output = anyhow::Result<T>>) -> Result<T> {
        self.runtime.block_on(fut).map_err(SoundmarkError::storage)
    }
}

impl FingerprintStore for PostgresStore {
    fn insert_track(&self, track: &NewTrack, landmarks: &[Landmark]) -> Result<TrackId> {
        let row = db::NewTrack {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            duration_seconds: track.duration_seconds,
            pipeline_tag: track.pipeline_tag.clone(),
        };
        let rows: Vec<NewLandmark> = landmarks.iter().map(to_row).collect();

        let id = self.run(db::insert_track_with_landmarks(&self.pool, &row, &rows))?;
        Ok(id as TrackId)
    }

    fn lookup_by_hashes(&self, hashes: &[u32]) -> Result<Vec<Posting>> {
        let keys: Vec<i64> = hashes.iter().map(|&h| h as i64).collect();
        let hits = self.run(db::lookup_by_hashes(&self.pool, &keys))?;

        Ok(hits
            .into_iter()
            .map(|hit| Posting {
                track_id: hit.track_id as TrackId,
                time_offset_ms: hit.time_offset_ms as u32,
                hash: hit.hash as u32,
            })
            .collect())
    }

    fn remove_track(&self, track_id: TrackId) -> Result<bool> {
        self.run(db::delete_track(&self.pool, track_id as i64))
    }

    fn track(&self, track_id: TrackId) -> Result<Option<TrackRecord>> {
        let row = self.run(db::get_track(&self.pool, track_id as i64))?;
        Ok(row.map(from_track_row))
    }

    fn tracks(&self, track_ids: &[TrackId]) -> Result<Vec<TrackRecord>> {
        let ids: Vec<i64> = track_ids.iter().map(|&id| id as i64).collect();
        let rows = self.run(db::get_tracks(&self.pool, &ids))?;
        Ok(rows.into_iter().map(from_track_row).collect())
    }

    fn list_tracks(&self) -> Result<Vec<TrackRecord>> {
        let rows = self.run(db::list_tracks(&self.pool))?;
        Ok(rows.into_iter().map(from_track_row).collect())
    }

    fn landmarks(&self, track_id: TrackId) -> Result<Vec<Landmark>> {
        if self.track(track_id)?.is_none() {
            return Err(SoundmarkError::TrackNotFound(track_id));
        }
        let rows = self.run(db::get_landmarks_by_track(&self.pool, track_id as i64))?;
        Ok(rows.iter().map(from_landmark_row).collect())
    }
}

fn to_row(l: &Landmark) -> NewLandmark {
    NewLandmark {
        hash: l.hash as i64,
        time_offset_ms: l.time_offset_ms as i32,
        anchor_freq: l.anchor_freq as i32,
        target_freq: l.target_freq as i32,
        delta_time_ms: l.delta_time_ms,
        strength: l.strength,
    }
}

fn from_landmark_row(r: &LandmarkRow) -> Landmark {
    Landmark {
        hash: r.hash as u32,
        time_offset_ms: r.time_offset_ms as u32,
        anchor_freq: r.anchor_freq as u16,
        target_freq: r.target_freq as u16,
        delta_time_ms: r.delta_time_ms,
        strength: r.strength,
    }
}

fn from_track_row(r: TrackRow) -> TrackRecord {
    TrackRecord {
        track_id: r.id as TrackId,
        title: r.title,
        artist: r.artist,
        album: r.album,
        duration_seconds: r.duration_seconds,
        pipeline_tag: r.pipeline_tag,
        created_at: r.created_at,
        fingerprint_count: r.fingerprint_count.max(0) as usize,
    }
}

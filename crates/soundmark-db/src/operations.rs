use anyhow::{Context, Result};
use deadpool_postgres::Pool;
use tokio_postgres::Row;

use crate::models::*;

/// Hashes per `= ANY($1)` round trip
const LOOKUP_CHUNK: usize = 4096;

/// Landmarks per JSONB insert statement
const INSERT_CHUNK: usize = 10_000;

/// Rows come back grouped by hash in request order
const LOOKUP_SQL: &str = "SELECT track_id, time_offset_ms, hash FROM landmarks
     WHERE hash = ANY($1)
     ORDER BY array_position($1, hash), track_id, time_offset_ms";

const TRACKS_SQL: &str = "SELECT id, title, artist, album, duration_seconds, pipeline_tag, created_at, fingerprint_count
     FROM track_summary
     WHERE id = ANY($1)
     ORDER BY id";

fn track_from_row(r: &Row) -> TrackRow {
    TrackRow {
        id: r.get(0),
        title: r.get(1),
        artist: r.get(2),
        album: r.get(3),
        duration_seconds: r.get(4),
        pipeline_tag: r.get(5),
        created_at: r.get(6),
        fingerprint_count: r.get(7),
    }
}

/// Insert a track and all of its landmarks in one transaction.
///
/// Readers never observe the track row without its landmarks: both become
/// visible at commit.
pub async fn insert_track_with_landmarks(
    pool: &Pool,
    track: &NewTrack,
    landmarks: &[NewLandmark],
) -> Result<i64> {
    let mut client = pool.get().await?;
    let tx = client
        .transaction()
        .await
        .context("Failed to open ingest transaction")?;

    let row = tx
        .query_one(
            "INSERT INTO tracks (title, artist, album, duration_seconds, pipeline_tag)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
            &[
                &track.title,
                &track.artist,
                &track.album,
                &track.duration_seconds,
                &track.pipeline_tag,
            ],
        )
        .await
        .context("Failed to insert track")?;
    let track_id: i64 = row.get(0);

    for chunk in landmarks.chunks(INSERT_CHUNK) {
        let rows: Vec<LandmarkInsert<'_>> = chunk
            .iter()
            .map(|landmark| LandmarkInsert { track_id, landmark })
            .collect();
        let json_array = serde_json::to_value(&rows).context("Failed to serialize landmarks")?;

        tx.execute(
            "INSERT INTO landmarks
                 (track_id, hash, time_offset_ms, anchor_freq, target_freq, delta_time_ms, strength)
             SELECT
                 (lm->>'track_id')::BIGINT,
                 (lm->>'hash')::BIGINT,
                 (lm->>'time_offset_ms')::INTEGER,
                 (lm->>'anchor_freq')::INTEGER,
                 (lm->>'target_freq')::INTEGER,
                 (lm->>'delta_time_ms')::REAL,
                 (lm->>'strength')::REAL
             FROM jsonb_array_elements($1::jsonb) AS lm",
            &[&json_array],
        )
        .await
        .context("Failed to batch insert landmarks")?;
    }

    tx.commit().await.context("Failed to commit ingest")?;

    log::debug!("Inserted track {} with {} landmarks", track_id, landmarks.len());
    Ok(track_id)
}

/// Remove a track and its landmarks in one transaction.
///
/// Landmarks go first so no posting can outlive its track. Returns whether
/// the track existed.
pub async fn delete_track(pool: &Pool, track_id: i64) -> Result<bool> {
    let mut client = pool.get().await?;
    let tx = client
        .transaction()
        .await
        .context("Failed to open delete transaction")?;

    tx.execute("DELETE FROM landmarks WHERE track_id = $1", &[&track_id])
        .await
        .context("Failed to delete landmarks")?;
    let deleted = tx
        .execute("DELETE FROM tracks WHERE id = $1", &[&track_id])
        .await
        .context("Failed to delete track")?;

    tx.commit().await.context("Failed to commit delete")?;
    Ok(deleted > 0)
}

/// Fetch every landmark whose hash is in `hashes`, in batches, ordered by
/// position in `hashes`, then track and offset
pub async fn lookup_by_hashes(pool: &Pool, hashes: &[i64]) -> Result<Vec<LandmarkHit>> {
    if hashes.is_empty() {
        return Ok(Vec::new());
    }

    let client = pool.get().await?;
    let statement = client
        .prepare(LOOKUP_SQL)
        .await
        .context("Failed to prepare hash lookup")?;

    let mut hits = Vec::new();
    for chunk in hashes.chunks(LOOKUP_CHUNK) {
        let batch: Vec<i64> = chunk.to_vec();
        let rows = client
            .query(&statement, &[&batch])
            .await
            .context("Failed to look up landmarks by hash")?;

        hits.extend(rows.iter().map(|r| LandmarkHit {
            track_id: r.get(0),
            time_offset_ms: r.get(1),
            hash: r.get(2),
        }));
    }

    Ok(hits)
}

/// Get one track by ID
pub async fn get_track(pool: &Pool, track_id: i64) -> Result<Option<TrackRow>> {
    let client = pool.get().await?;

    let row = client
        .query_opt(
            "SELECT id, title, artist, album, duration_seconds, pipeline_tag, created_at, fingerprint_count
             FROM track_summary
             WHERE id = $1",
            &[&track_id],
        )
        .await
        .context("Failed to get track")?;

    Ok(row.as_ref().map(track_from_row))
}

/// Get the tracks among `track_ids` that exist, in one round trip
pub async fn get_tracks(pool: &Pool, track_ids: &[i64]) -> Result<Vec<TrackRow>> {
    if track_ids.is_empty() {
        return Ok(Vec::new());
    }

    let client = pool.get().await?;
    let rows = client
        .query(TRACKS_SQL, &[&track_ids])
        .await
        .context("Failed to get tracks")?;

    Ok(rows.iter().map(track_from_row).collect())
}

/// List all tracks in id (insertion) order
pub async fn list_tracks(pool: &Pool) -> Result<Vec<TrackRow>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT id, title, artist, album, duration_seconds, pipeline_tag, created_at, fingerprint_count
             FROM track_summary
             ORDER BY id",
            &[],
        )
        .await
        .context("Failed to list tracks")?;

    Ok(rows.iter().map(track_from_row).collect())
}

/// Get all landmarks of a track in time order
pub async fn get_landmarks_by_track(pool: &Pool, track_id: i64) -> Result<Vec<LandmarkRow>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT track_id, hash, time_offset_ms, anchor_freq, target_freq, delta_time_ms, strength
             FROM landmarks
             WHERE track_id = $1
             ORDER BY time_offset_ms, hash",
            &[&track_id],
        )
        .await
        .context("Failed to get landmarks")?;

    Ok(rows
        .iter()
        .map(|r| LandmarkRow {
            track_id: r.get(0),
            hash: r.get(1),
            time_offset_ms: r.get(2),
            anchor_freq: r.get(3),
            target_freq: r.get(4),
            delta_time_ms: r.get(5),
            strength: r.get(6),
        })
        .collect())
}

use serde::{Deserialize, Serialize};

/// A catalog track row, joined with its fingerprint count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRow {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_seconds: f64,
    pub pipeline_tag: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub fingerprint_count: i64,
}

/// Input structure for creating a track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_seconds: f64,
    pub pipeline_tag: String,
}

/// Input structure for inserting landmarks (track id is assigned by the transaction)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLandmark {
    pub hash: i64,
    pub time_offset_ms: i32,
    pub anchor_freq: i32,
    pub target_freq: i32,
    pub delta_time_ms: f32,
    pub strength: f32,
}

/// A stored landmark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkRow {
    pub track_id: i64,
    pub hash: i64,
    pub time_offset_ms: i32,
    pub anchor_freq: i32,
    pub target_freq: i32,
    pub delta_time_ms: f32,
    pub strength: f32,
}

/// Result row of a batched hash lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkHit {
    pub track_id: i64,
    pub time_offset_ms: i32,
    pub hash: i64,
}

/// JSONB row shape used by the batch insert
#[derive(Serialize)]
pub(crate) struct LandmarkInsert<'a> {
    pub track_id: i64,
    #[serde(flatten)]
    pub landmark: &'a NewLandmark,
}

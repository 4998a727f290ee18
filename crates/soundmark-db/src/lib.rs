//! Soundmark Database Layer
//!
//! PostgreSQL catalog storage: tracks, landmarks and batched hash lookup

pub mod connection;
pub mod models;
pub mod operations;

// Re-export commonly used types
pub use connection::{create_pool, ensure_schema, test_connection, DbPool};
pub use models::{LandmarkHit, LandmarkRow, NewLandmark, NewTrack, TrackRow};
pub use operations::{
    delete_track, get_landmarks_by_track, get_track, get_tracks, insert_track_with_landmarks,
    list_tracks, lookup_by_hashes,
};

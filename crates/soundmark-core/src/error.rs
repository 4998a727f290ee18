//! Error type shared by every pipeline stage

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SoundmarkError>;

#[derive(Debug, Error)]
pub enum SoundmarkError {
    /// The decoder could not turn the input into PCM
    #[error("failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    #[error("audio contains no samples")]
    EmptyAudio,

    /// Fewer samples than one analysis frame
    #[error("insufficient audio: {samples} samples, need at least {frame_size}")]
    InsufficientData { samples: usize, frame_size: usize },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("track {0} not found")]
    TrackNotFound(u64),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("resampling failed: {0}")]
    Resample(String),
}

impl SoundmarkError {
    pub(crate) fn decode(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        SoundmarkError::Decode {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Wrap an `anyhow` error from the snapshot or database layer, keeping its context chain
    pub(crate) fn storage(err: anyhow::Error) -> Self {
        SoundmarkError::Storage(format!("{:#}", err))
    }
}

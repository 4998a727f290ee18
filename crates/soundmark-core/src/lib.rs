//! Soundmark Core - Acoustic Fingerprinting Library
//!
//! Landmark fingerprinting in the Shazam tradition: spectral peaks are
//! paired into hashed landmarks, stored in a catalog, and a query is matched
//! by finding the track whose hashes line up at one consistent time offset.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod landmark;
pub mod matching;
pub mod peaks;
pub mod pipeline;
pub mod segmentation;
pub mod settings;
pub mod spectrum;
pub mod store;

pub use audio::{AudioData, AudioFormat, Decoder, FfmpegDecoder, NativeDecoder, SyntheticDecoder};
pub use config::{SoundmarkConfig, HASH_SEED, PIPELINE_VERSION};
pub use engine::{
    IngestReport, RecognizedMatch, Recognition, Recognizer, TrackDetail, TrackMetadata,
};
pub use error::{Result, SoundmarkError};
pub use landmark::{Landmark, LandmarkGenerator};
pub use matching::{MatchCandidate, MatchReport, Matcher};
pub use peaks::{Peak, PeakExtractor};
pub use pipeline::{Mode, Pipeline};
pub use segmentation::{segment_audio, should_segment, AudioSegment, SegmentationConfig};
pub use settings::SoundmarkSettings;
pub use spectrum::{SpectralAnalyzer, SpectrumFrame};
pub use store::{FingerprintStore, MemoryStore, Posting, PostgresStore, TrackId, TrackRecord};

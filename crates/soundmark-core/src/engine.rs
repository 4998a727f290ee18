//! Ingest and recognition over a catalog
//!
//! `Recognizer` ties the pipeline, the matcher, a catalog backend and a
//! decoder together. It holds no mutable state of its own, so one instance
//! can serve concurrent ingests and queries.

use crate::audio::{AudioData, AudioFormat, Decoder};
use crate::config::SoundmarkConfig;
use crate::error::{Result, SoundmarkError};
use crate::landmark::Landmark;
use crate::matching::{distinct_hashes, MatchCandidate, Matcher};
use crate::pipeline::{Mode, Pipeline};
use crate::settings::SoundmarkSettings;
use crate::store::{FingerprintStore, NewTrack, Posting, TrackId, TrackRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Instant;


pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Descriptive fields supplied with a track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl TrackMetadata {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            artist: Some(artist.into()),
            album: None,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    fn title_or_default(&self) -> String {
        non_blank(&self.title).unwrap_or(UNKNOWN_TITLE).to_string()
    }

    fn artist_or_default(&self) -> String {
        non_blank(&self.artist).unwrap_or(UNKNOWN_ARTIST).to_string()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Outcome of a successful ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub track_id: TrackId,
    pub fingerprint_count: usize,
}

/// A ranked candidate joined with its track metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedMatch {
    #[serde(flatten)]
    pub candidate: MatchCandidate,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
}

/// Ranked matches plus the figures needed to explain an empty result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub matches: Vec<RecognizedMatch>,
    pub sample_duration_s: f64,
    /// Landmarks extracted from the query
    pub fingerprint_count: usize,
    /// Postings returned by the catalog lookup
    pub catalog_hits: usize,
    /// Tracks with matching hashes that were skipped for a stale pipeline tag
    pub stale_tracks_skipped: usize,
}

impl Recognition {
    /// Whether any candidate cleared the confidence threshold
    pub fn is_confident(&self) -> bool {
        !self.matches.is_empty()
    }

    pub fn best(&self) -> Option<&RecognizedMatch> {
        self.matches.first()
    }

    /// Human readable reason for an empty result
    pub fn diagnosis(&self) -> Option<&'static str> {
        if self.is_confident() {
            None
        } else if self.fingerprint_count == 0 {
            Some("Could not extract fingerprints from the sample")
        } else if self.catalog_hits == 0 {
            Some("No matching songs found")
        } else {
            Some("No confident match found")
        }
    }
}

/// A track record with the leading landmarks of its fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDetail {
    #[serde(flatten)]
    pub record: TrackRecord,
    pub sample_landmarks: Vec<Landmark>,
}

/// Recognizer
pub struct Recognizer {
    pipeline: Pipeline,
    matcher: Matcher,
    pipeline_tag: String,
    store: Box<dyn FingerprintStore>,
    decoder: Box<dyn Decoder>,
}

impl Recognizer {
    pub fn new(
        config: SoundmarkConfig,
        store: Box<dyn FingerprintStore>,
        decoder: Box<dyn Decoder>,
    ) -> Result<Self> {
        let pipeline = Pipeline::new(&config)?;
        Ok(Self {
            matcher: Matcher::new(&config),
            pipeline_tag: config.pipeline_tag(),
            pipeline,
            store,
            decoder,
        })
    }

    /// Open the configured store and decoder
    pub fn from_settings(settings: &SoundmarkSettings) -> Result<Self> {
        let store = settings.open_store()?;
        let decoder = settings.build_decoder();
        Self::new(settings.pipeline.clone(), store, decoder)
    }

    pub fn config(&self) -> &SoundmarkConfig {
        self.pipeline.config()
    }

    pub fn pipeline_tag(&self) -> &str {
        &self.pipeline_tag
    }

    pub fn store(&self) -> &dyn FingerprintStore {
        self.store.as_ref()
    }

    /// Fingerprint mono samples and store them as one new track
    pub fn ingest(
        &self,
        metadata: &TrackMetadata,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<IngestReport> {
        if samples.is_empty() || sample_rate == 0 {
            return Err(SoundmarkError::EmptyAudio);
        }
        let start = Instant::now();
        let landmarks = self.pipeline.fingerprint(samples, sample_rate, Mode::Ingest)?;

        let track = NewTrack {
            title: metadata.title_or_default(),
            artist: metadata.artist_or_default(),
            album: non_blank(&metadata.album).map(str::to_string),
            duration_seconds: samples.len() as f64 / sample_rate as f64,
            pipeline_tag: self.pipeline_tag.clone(),
        };
        if landmarks.is_empty() {
            log::warn!("'{}' produced no landmarks; it will never match", track.title);
        }

        let track_id = self.store.insert_track(&track, &landmarks)?;
        log::info!(
            "Ingested '{}' by {} as track {}: {} landmarks in {:.2?}",
            track.title,
            track.artist,
            track_id,
            landmarks.len(),
            start.elapsed()
        );

        Ok(IngestReport {
            track_id,
            fingerprint_count: landmarks.len(),
        })
    }

    /// Decode `path` and ingest it
    pub fn ingest_file(&self, metadata: &TrackMetadata, path: &Path) -> Result<IngestReport> {
        let audio = self.decode(path)?;
        self.ingest(metadata, &audio.samples, audio.sample_rate)
    }

    /// Rank catalog tracks against a query sample
    ///
    /// A sample too short or too quiet to fingerprint yields an empty result.
    pub fn recognize(&self, samples: &[f32], sample_rate: u32) -> Result<Recognition> {
        let sample_duration_s = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f64 / sample_rate as f64
        };
        let empty = Recognition {
            sample_duration_s,
            ..Default::default()
        };
        if samples.is_empty() || sample_rate == 0 {
            return Ok(empty);
        }

        let start = Instant::now();
        let query = match self.pipeline.fingerprint(samples, sample_rate, Mode::Query) {
            Ok(landmarks) => landmarks,
            Err(SoundmarkError::InsufficientData { frame_size, .. }) => {
                log::debug!("Query is shorter than one {} sample frame", frame_size);
                return Ok(empty);
            }
            Err(e) => return Err(e),
        };
        if query.is_empty() {
            return Ok(empty);
        }

        let postings = self.store.lookup_by_hashes(&distinct_hashes(&query))?;
        let catalog_hits = postings.len();
        let survivors = self.matcher.floor_survivors(&query, &postings);
        let (records, stale) = self.current_tracks(&survivors)?;
        let postings: Vec<Posting> = postings
            .into_iter()
            .filter(|p| records.contains_key(&p.track_id))
            .collect();

        let matches: Vec<RecognizedMatch> = self
            .matcher
            .rank(&query, &postings)
            .into_iter()
            .filter_map(|candidate| {
                let record = records.get(&candidate.track_id)?;
                Some(RecognizedMatch {
                    title: record.title.clone(),
                    artist: record.artist.clone(),
                    album: record.album.clone(),
                    candidate,
                })
            })
            .collect();

        log::info!(
            "Recognized {:.1} s sample: {} landmarks, {} catalog hits, {} matches in {:.2?}",
            sample_duration_s,
            query.len(),
            catalog_hits,
            matches.len(),
            start.elapsed()
        );

        Ok(Recognition {
            matches,
            sample_duration_s,
            fingerprint_count: query.len(),
            catalog_hits,
            stale_tracks_skipped: stale,
        })
    }

    /// Decode `path` and recognize it
    pub fn recognize_file(&self, path: &Path) -> Result<Recognition> {
        let audio = self.decode(path)?;
        self.recognize(&audio.samples, audio.sample_rate)
    }

    /// Remove a track; `TrackNotFound` if it does not exist
    pub fn remove_track(&self, track_id: TrackId) -> Result<()> {
        if self.store.remove_track(track_id)? {
            log::info!("Removed track {}", track_id);
            Ok(())
        } else {
            Err(SoundmarkError::TrackNotFound(track_id))
        }
    }

    pub fn list_tracks(&self) -> Result<Vec<TrackRecord>> {
        self.store.list_tracks()
    }

    /// Tracks fingerprinted with a different pipeline tag
    pub fn stale_tracks(&self) -> Result<Vec<TrackRecord>> {
        Ok(self
            .store
            .list_tracks()?
            .into_iter()
            .filter(|t| t.pipeline_tag != self.pipeline_tag)
            .collect())
    }

    /// Record plus the first `sample_size` landmarks of a track
    pub fn track_detail(&self, track_id: TrackId, sample_size: usize) -> Result<TrackDetail> {
        let record = self
            .store
            .track(track_id)?
            .ok_or(SoundmarkError::TrackNotFound(track_id))?;
        let mut sample_landmarks = self.store.landmarks(track_id)?;
        sample_landmarks.truncate(sample_size);
        Ok(TrackDetail {
            record,
            sample_landmarks,
        })
    }

    /// Persist buffered catalog changes
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    fn decode(&self, path: &Path) -> Result<AudioData> {
        let audio = self
            .decoder
            .decode(path)?
            .into_canonical(self.config().sample_rate)?;
        log::debug!(
            "Decoded {} ({:?}): {:.1} s",
            path.display(),
            AudioFormat::from_path(path),
            audio.duration_seconds()
        );
        Ok(audio)
    }

    /// Records of `track_ids` that carry the current tag, fetched in one
    /// batch, plus how many were skipped as stale
    fn current_tracks(
        &self,
        track_ids: &BTreeSet<TrackId>,
    ) -> Result<(BTreeMap<TrackId, TrackRecord>, usize)> {
        if track_ids.is_empty() {
            return Ok((BTreeMap::new(), 0));
        }
        let ids: Vec<TrackId> = track_ids.iter().copied().collect();
        let mut records = BTreeMap::new();
        let mut stale = 0;

        // Tracks removed between lookup and fetch are simply absent
        for record in self.store.tracks(&ids)? {
            if record.pipeline_tag == self.pipeline_tag {
                records.insert(record.track_id, record);
            } else {
                log::warn!(
                    "Skipping track {} ('{}'): fingerprinted with {}, current pipeline is {}",
                    record.track_id,
                    record.title,
                    record.pipeline_tag,
                    self.pipeline_tag
                );
                stale += 1;
            }
        }
        Ok((records, stale))
    }
}

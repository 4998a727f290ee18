//! In-memory decoder and signal generators

use super::{AudioData, Decoder};
use crate::error::{Result, SoundmarkError};
use std::collections::HashMap;
use std::f64::consts::TAU;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Serves pre-registered audio by path, without touching the filesystem
#[derive(Debug, Default)]
pub struct SyntheticDecoder {
    clips: RwLock<HashMap<PathBuf, AudioData>>,
}

impl SyntheticDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `audio` under `path`, replacing any previous clip
    pub fn insert(&self, path: impl Into<PathBuf>, audio: AudioData) {
        if let Ok(mut clips) = self.clips.write() {
            clips.insert(path.into(), audio);
        }
    }

    pub fn with_clip(self, path: impl Into<PathBuf>, audio: AudioData) -> Self {
        self.insert(path, audio);
        self
    }
}

impl Decoder for SyntheticDecoder {
    fn decode(&self, path: &Path) -> Result<AudioData> {
        let clips = self
            .clips
            .read()
            .map_err(|_| SoundmarkError::decode(path, "clip table poisoned"))?;
        clips
            .get(path)
            .cloned()
            .ok_or_else(|| SoundmarkError::decode(path, "no synthetic clip registered"))
    }
}

/// Linear frequency sweep from `start_hz` to `end_hz`
pub fn linear_sweep(
    start_hz: f64,
    end_hz: f64,
    duration_s: f64,
    amplitude: f32,
    sample_rate: u32,
) -> AudioData {
    let sr = sample_rate as f64;
    let n = (duration_s * sr).round() as usize;
    let rate = (end_hz - start_hz) / duration_s;

    let samples = (0..n)
        .map(|i| {
            let t = i as f64 / sr;
            // Phase is the integral of the instantaneous frequency
            let phase = TAU * (start_hz * t + 0.5 * rate * t * t);
            (phase.sin() as f32) * amplitude
        })
        .collect();

    AudioData::mono(samples, sample_rate)
}

/// Back-to-back tones of `note_ms` each, phase-continuous across note changes
pub fn tone_sequence(freqs_hz: &[f64], note_ms: u32, amplitude: f32, sample_rate: u32) -> AudioData {
    let sr = sample_rate as f64;
    let per_note = (note_ms as f64 * sr / 1000.0).round() as usize;
    let mut samples = Vec::with_capacity(per_note * freqs_hz.len());
    let mut phase = 0.0f64;

    for &freq in freqs_hz {
        let step = TAU * freq / sr;
        for _ in 0..per_note {
            samples.push((phase.sin() as f32) * amplitude);
            phase = (phase + step) % TAU;
        }
    }

    AudioData::mono(samples, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generators_produce_expected_lengths() {
        let sweep = linear_sweep(200.0, 1200.0, 2.0, 0.5, 44100);
        assert_eq!(sweep.samples.len(), 88200);
        assert_eq!(sweep.duration_ms, 2000);
        assert!(sweep.samples.iter().all(|s| s.abs() <= 0.5 + 1e-6));

        let tones = tone_sequence(&[440.0, 880.0, 660.0], 200, 0.3, 44100);
        assert_eq!(tones.samples.len(), 3 * 8820);
    }

    #[test]
    fn test_synthetic_decoder_serves_registered_clips() {
        let clip = tone_sequence(&[440.0], 100, 0.5, 44100);
        let decoder = SyntheticDecoder::new().with_clip("mem://a440", clip.clone());

        assert_eq!(decoder.decode(Path::new("mem://a440")).unwrap(), clip);
        assert!(matches!(
            decoder.decode(Path::new("mem://missing")),
            Err(SoundmarkError::Decode { .. })
        ));
    }
}

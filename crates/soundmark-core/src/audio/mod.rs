//! Audio decoding and resampling
//!
//! Every decoder hands the pipeline mono PCM at the canonical sample rate.
//! WAV, MP3, FLAC and OGG use dedicated pure Rust decoders, M4A/AAC go
//! through Symphonia, and `FfmpegDecoder` shells out for everything else.

mod container;
mod decoder;
mod ffmpeg;
mod resample;
mod synthetic;

pub use decoder::NativeDecoder;
pub use ffmpeg::FfmpegDecoder;
pub use resample::resample_to_target;
pub use synthetic::{linear_sweep, tone_sequence, SyntheticDecoder};

use crate::error::Result;
use std::path::Path;

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
    M4a,
    Aac,
    Unknown,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("wav") | Some("wave") => AudioFormat::Wav,
            Some("mp3") => AudioFormat::Mp3,
            Some("flac") => AudioFormat::Flac,
            Some("ogg") => AudioFormat::Ogg,
            Some("m4a") | Some("mp4") => AudioFormat::M4a,
            Some("aac") => AudioFormat::Aac,
            _ => AudioFormat::Unknown,
        }
    }

    /// Whether the catalog tools accept files of this format
    pub fn is_supported(&self) -> bool {
        !matches!(self, AudioFormat::Unknown)
    }
}

/// Decoded audio data
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_ms: u32,
}

impl AudioData {
    /// Wrap mono samples
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration_ms = duration_ms(samples.len(), sample_rate, 1);
        Self {
            samples,
            sample_rate,
            channels: 1,
            duration_ms,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks(self.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }

    /// Downmix and resample to mono PCM at `target_rate`
    pub fn into_canonical(self, target_rate: u32) -> Result<Self> {
        if self.channels <= 1 && self.sample_rate == target_rate {
            return Ok(self);
        }

        let mono = self.to_mono();
        let samples = resample_to_target(&mono, self.sample_rate, target_rate)?;
        Ok(Self::mono(samples, target_rate))
    }
}

pub(crate) fn duration_ms(num_samples: usize, sample_rate: u32, channels: u16) -> u32 {
    if sample_rate == 0 || channels == 0 {
        return 0;
    }
    (num_samples as f64 / (sample_rate as f64 * channels as f64) * 1000.0) as u32
}

/// Turns a file into canonical mono PCM
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<AudioData>;
}

//! Pipeline and matching parameters
//!
//! A single immutable `SoundmarkConfig` is threaded through every stage.
//! Fields that change hash values are folded into the pipeline tag stored
//! with each track, so catalogs built with different settings are detected.

use crate::error::{Result, SoundmarkError};
use serde::{Deserialize, Serialize};

/// Bump when the fingerprint algorithm itself changes
pub const PIPELINE_VERSION: u16 = 1;

/// Fixed MurmurHash3 seed for landmark hashes
pub const HASH_SEED: u32 = 0x9747_B28C;

const TAG_CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// All pipeline tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundmarkConfig {
    // Audio and framing
    pub sample_rate: u32,
    pub frame_size: usize,
    pub ingest_hop_size: usize,
    pub query_hop_size: usize,
    pub min_freq: f32,
    pub max_freq: f32,

    // Peak extraction
    pub peaks_per_frame: usize,
    pub peak_min_separation: usize,
    pub peak_neighborhood: usize,
    pub peak_min_prominence: f32,
    pub peak_min_magnitude: f32,

    // Landmark generation
    pub fanout: usize,
    pub min_time_delta_ms: u32,
    pub max_time_delta_ms: u32,
    pub time_quantum_ms: u32,
    /// Mix a coarse magnitude-ratio bucket into each hash
    pub hash_magnitude_ratio: bool,
    pub dedup_bucket_ms: u32,

    // Ingest segmentation
    pub ingest_max_duration_s: f64,
    pub ingest_segment_count: usize,

    // Matching
    pub min_raw_hits: usize,
    pub min_raw_hit_ratio: f64,
    pub offset_bucket_ms: i64,
    pub offset_tolerance_ms: i64,
    pub min_aligned_count: usize,
    pub min_confidence: f64,
    pub spread_weight: f64,
    pub count_bonus_threshold: usize,
    pub count_bonus_weight: f64,
    pub relative_confidence_cutoff: f64,
    pub relative_aligned_cutoff: f64,
    pub max_results: usize,
}

impl Default for SoundmarkConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frame_size: 1024,
            ingest_hop_size: 512,
            query_hop_size: 512,
            min_freq: 40.0,
            max_freq: 4000.0,

            peaks_per_frame: 5,
            peak_min_separation: 3,
            peak_neighborhood: 5,
            peak_min_prominence: 3.0,
            peak_min_magnitude: 1e-3,

            fanout: 10,
            min_time_delta_ms: 20,
            max_time_delta_ms: 2000,
            time_quantum_ms: 20,
            hash_magnitude_ratio: false,
            dedup_bucket_ms: 100,

            ingest_max_duration_s: 30.0,
            ingest_segment_count: 3,

            min_raw_hits: 10,
            min_raw_hit_ratio: 0.01,
            offset_bucket_ms: 100,
            offset_tolerance_ms: 200,
            min_aligned_count: 5,
            min_confidence: 0.25,
            spread_weight: 0.5,
            count_bonus_threshold: 150,
            count_bonus_weight: 0.1,
            relative_confidence_cutoff: 0.7,
            relative_aligned_cutoff: 0.5,
            max_results: 3,
        }
    }
}

impl SoundmarkConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(SoundmarkError::InvalidConfig(msg.to_string()));

        if self.sample_rate == 0 {
            return invalid("sample_rate must be > 0");
        }
        if !self.frame_size.is_power_of_two() || self.frame_size < 64 {
            return invalid("frame_size must be a power of two >= 64");
        }
        for hop in [self.ingest_hop_size, self.query_hop_size] {
            if hop == 0 || hop > self.frame_size {
                return invalid("hop sizes must be in 1..=frame_size");
            }
        }
        if self.frame_size / 2 - 1 > u16::MAX as usize {
            return invalid("frame_size must keep spectrum bins within u16");
        }
        if !(self.min_freq >= 0.0 && self.min_freq < self.max_freq) {
            return invalid("min_freq must be >= 0 and < max_freq");
        }
        if self.max_freq > self.sample_rate as f32 / 2.0 {
            return invalid("max_freq must not exceed the Nyquist frequency");
        }
        if self.peaks_per_frame == 0 || self.peak_neighborhood == 0 {
            return invalid("peaks_per_frame and peak_neighborhood must be > 0");
        }
        if self.fanout == 0 {
            return invalid("fanout must be > 0");
        }
        if self.min_time_delta_ms == 0 || self.min_time_delta_ms > self.max_time_delta_ms {
            return invalid("time deltas must satisfy 0 < min_time_delta_ms <= max_time_delta_ms");
        }
        if self.time_quantum_ms == 0 || self.dedup_bucket_ms == 0 {
            return invalid("time_quantum_ms and dedup_bucket_ms must be > 0");
        }
        if self.ingest_max_duration_s <= 0.0 || self.ingest_segment_count == 0 {
            return invalid("ingest segmentation needs a positive duration and segment count");
        }
        if self.offset_bucket_ms <= 0 || self.offset_tolerance_ms < 0 {
            return invalid("offset_bucket_ms must be > 0 and offset_tolerance_ms >= 0");
        }
        if self.count_bonus_threshold == 0 {
            return invalid("count_bonus_threshold must be > 0");
        }
        let unit = [
            self.min_raw_hit_ratio,
            self.min_confidence,
            self.spread_weight,
            self.count_bonus_weight,
            self.relative_confidence_cutoff,
            self.relative_aligned_cutoff,
        ];
        if unit.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return invalid("ratios, weights and cutoffs must lie in [0, 1]");
        }
        if self.max_results == 0 {
            return invalid("max_results must be > 0");
        }
        Ok(())
    }

    /// Spectrum bin holding `hz`
    pub fn bin_for_hz(&self, hz: f32) -> usize {
        (hz * self.frame_size as f32 / self.sample_rate as f32).round() as usize
    }

    /// Centre frequency of `bin`
    pub fn hz_for_bin(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.frame_size as f32
    }

    /// Inclusive bin range searched for peaks
    pub fn band_bins(&self) -> (usize, usize) {
        let nyquist_bin = self.frame_size / 2 - 1;
        let min_bin = self.bin_for_hz(self.min_freq).max(1);
        let max_bin = self.bin_for_hz(self.max_freq).min(nyquist_bin);
        (min_bin, max_bin)
    }

    /// Tag identifying the hash-affecting parameters, e.g. `v1-1a2b3c4d`
    pub fn pipeline_tag(&self) -> String {
        let mut digest = TAG_CRC.digest();
        digest.update(&PIPELINE_VERSION.to_le_bytes());
        digest.update(&HASH_SEED.to_le_bytes());
        digest.update(&self.sample_rate.to_le_bytes());
        digest.update(&(self.frame_size as u64).to_le_bytes());
        digest.update(&(self.ingest_hop_size as u64).to_le_bytes());
        digest.update(&self.min_freq.to_le_bytes());
        digest.update(&self.max_freq.to_le_bytes());
        digest.update(&(self.peaks_per_frame as u64).to_le_bytes());
        digest.update(&(self.peak_min_separation as u64).to_le_bytes());
        digest.update(&(self.peak_neighborhood as u64).to_le_bytes());
        digest.update(&self.peak_min_prominence.to_le_bytes());
        digest.update(&self.peak_min_magnitude.to_le_bytes());
        digest.update(&(self.fanout as u64).to_le_bytes());
        digest.update(&self.min_time_delta_ms.to_le_bytes());
        digest.update(&self.max_time_delta_ms.to_le_bytes());
        digest.update(&self.time_quantum_ms.to_le_bytes());
        digest.update(&[self.hash_magnitude_ratio as u8]);
        digest.update(&self.dedup_bucket_ms.to_le_bytes());
        format!("v{}-{:08x}", PIPELINE_VERSION, digest.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SoundmarkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.band_bins(), (1, 93));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = SoundmarkConfig {
            frame_size: 1000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SoundmarkError::InvalidConfig(_))
        ));

        let config = SoundmarkConfig {
            min_time_delta_ms: 500,
            max_time_delta_ms: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SoundmarkConfig {
            spread_weight: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_bin_count() {
        // 2^17 samples: bins up to 65535 still fit
        let config = SoundmarkConfig {
            frame_size: 1 << 17,
            sample_rate: 192_000,
            max_freq: 96_000.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.band_bins().1, u16::MAX as usize);

        let config = SoundmarkConfig {
            frame_size: 1 << 18,
            ..config
        };
        assert!(matches!(
            config.validate(),
            Err(SoundmarkError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_pipeline_tag_tracks_hash_parameters() {
        let base = SoundmarkConfig::default();
        let tag = base.pipeline_tag();
        assert!(tag.starts_with("v1-"));
        assert_eq!(tag.len(), "v1-".len() + 8);
        assert_eq!(tag, SoundmarkConfig::default().pipeline_tag());

        let fanout = SoundmarkConfig {
            fanout: 12,
            ..Default::default()
        };
        assert_ne!(fanout.pipeline_tag(), tag);

        // Matching thresholds do not affect stored landmarks
        let matching = SoundmarkConfig {
            min_confidence: 0.5,
            max_results: 10,
            ..Default::default()
        };
        assert_eq!(matching.pipeline_tag(), tag);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: SoundmarkConfig = toml::from_str("fanout = 4\nmax_results = 1\n").unwrap();
        assert_eq!(config.fanout, 4);
        assert_eq!(config.max_results, 1);
        assert_eq!(config.frame_size, 1024);
    }
}

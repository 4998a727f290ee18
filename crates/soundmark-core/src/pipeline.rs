//! Samples to landmarks: framing, peaks, pairing

use crate::audio::resample_to_target;
use crate::config::SoundmarkConfig;
use crate::error::{Result, SoundmarkError};
use crate::landmark::{Landmark, LandmarkGenerator};
use crate::peaks::{Peak, PeakExtractor};
use crate::segmentation::{segment_audio, SegmentationConfig};
use crate::spectrum::SpectralAnalyzer;
use std::borrow::Cow;

/// Which hop size and segmentation policy to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Catalog ingest: `ingest_hop_size`, long tracks reduced to segments
    Ingest,
    /// Recognition: `query_hop_size`, whole sample
    Query,
}

/// The fingerprinting pipeline for one configuration
pub struct Pipeline {
    config: SoundmarkConfig,
    ingest_analyzer: SpectralAnalyzer,
    query_analyzer: SpectralAnalyzer,
    peaks: PeakExtractor,
    generator: LandmarkGenerator,
}

impl Pipeline {
    pub fn new(config: &SoundmarkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            ingest_analyzer: SpectralAnalyzer::new(config, config.ingest_hop_size),
            query_analyzer: SpectralAnalyzer::new(config, config.query_hop_size),
            peaks: PeakExtractor::new(config),
            generator: LandmarkGenerator::new(config),
        })
    }

    pub fn config(&self) -> &SoundmarkConfig {
        &self.config
    }

    /// Fingerprint mono samples recorded at `sample_rate`.
    ///
    /// Fails with `InsufficientData` when no complete frame fits.
    pub fn fingerprint(
        &self,
        samples: &[f32],
        sample_rate: u32,
        mode: Mode,
    ) -> Result<Vec<Landmark>> {
        if samples.is_empty() {
            return Err(SoundmarkError::EmptyAudio);
        }
        let samples = self.canonical(samples, sample_rate)?;

        let landmarks = match mode {
            Mode::Query => {
                let peaks = self.peaks_of(&self.query_analyzer, &samples, 0.0)?;
                self.generator.generate(&peaks)
            }
            Mode::Ingest => self.fingerprint_segments(&samples)?,
        };
        Ok(landmarks)
    }

    /// Peaks of the whole sample as a query would see them
    pub fn peaks(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<Peak>> {
        let samples = self.canonical(samples, sample_rate)?;
        self.peaks_of(&self.query_analyzer, &samples, 0.0)
    }

    fn fingerprint_segments(&self, samples: &[f32]) -> Result<Vec<Landmark>> {
        let segmentation = SegmentationConfig::from(&self.config);
        let segments = segment_audio(samples, self.config.sample_rate, &segmentation);
        if segments.len() > 1 {
            log::debug!(
                "Ingesting {} segments of {:.1} s",
                segments.len(),
                segments[0].samples.len() as f64 / self.config.sample_rate as f64
            );
        }

        let mut all = Vec::new();
        for segment in &segments {
            match self.peaks_of(&self.ingest_analyzer, segment.samples, segment.start_time_ms) {
                Ok(peaks) => all.extend(self.generator.generate(&peaks)),
                Err(SoundmarkError::InsufficientData { .. }) if segments.len() > 1 => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(self.generator.dedup(all))
    }

    fn peaks_of(
        &self,
        analyzer: &SpectralAnalyzer,
        samples: &[f32],
        start_ms: f64,
    ) -> Result<Vec<Peak>> {
        let frames = analyzer.analyze(samples)?;
        let mut peaks = self.peaks.extract(&frames);
        if start_ms != 0.0 {
            for peak in &mut peaks {
                peak.time_offset_ms += start_ms;
            }
        }
        Ok(peaks)
    }

    fn canonical<'a>(&self, samples: &'a [f32], sample_rate: u32) -> Result<Cow<'a, [f32]>> {
        if sample_rate == self.config.sample_rate {
            Ok(Cow::Borrowed(samples))
        } else {
            log::debug!(
                "Resampling {} samples from {} Hz to {} Hz",
                samples.len(),
                sample_rate,
                self.config.sample_rate
            );
            resample_to_target(samples, sample_rate, self.config.sample_rate).map(Cow::Owned)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{linear_sweep, tone_sequence};
    use std::collections::HashSet;

    #[test]
    fn test_sweep_produces_landmarks_with_valid_deltas() {
        let config = SoundmarkConfig::default();
        let pipeline = Pipeline::new(&config).unwrap();
        let audio = linear_sweep(200.0, 1200.0, 3.0, 0.5, 44100);

        let landmarks = pipeline.fingerprint(&audio.samples, 44100, Mode::Ingest).unwrap();
        assert!(landmarks.len() > 50);
        for l in &landmarks {
            assert!(l.delta_time_ms >= 20.0 && l.delta_time_ms <= 2000.0);
            assert!(l.time_offset_ms < 3000);
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let config = SoundmarkConfig::default();
        let pipeline = Pipeline::new(&config).unwrap();
        let freqs: Vec<f64> = (0..10).map(|k| 1500.0 + ((k * 7919) % 50) as f64 * 40.0).collect();
        let audio = tone_sequence(&freqs, 200, 0.5, 44100);

        let a = pipeline.fingerprint(&audio.samples, 44100, Mode::Query).unwrap();
        let b = pipeline.fingerprint(&audio.samples, 44100, Mode::Query).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_silence_and_short_input() {
        let config = SoundmarkConfig::default();
        let pipeline = Pipeline::new(&config).unwrap();

        let silence = vec![0.0f32; 44100];
        assert!(pipeline.fingerprint(&silence, 44100, Mode::Query).unwrap().is_empty());

        assert!(matches!(
            pipeline.fingerprint(&[0.1; 500], 44100, Mode::Query),
            Err(SoundmarkError::InsufficientData { .. })
        ));
        assert!(matches!(
            pipeline.fingerprint(&[], 44100, Mode::Ingest),
            Err(SoundmarkError::EmptyAudio)
        ));
    }

    #[test]
    fn test_long_ingest_keeps_absolute_offsets() {
        let config = SoundmarkConfig {
            ingest_max_duration_s: 6.0,
            ..Default::default()
        };
        let pipeline = Pipeline::new(&config).unwrap();
        let audio = linear_sweep(200.0, 1200.0, 20.0, 0.5, 44100);

        let landmarks = pipeline.fingerprint(&audio.samples, 44100, Mode::Ingest).unwrap();
        // Segments of 2 s at 0, 9 and 18 s
        let seconds: HashSet<u32> = landmarks.iter().map(|l| l.time_offset_ms / 1000).collect();
        assert!(seconds.contains(&0));
        assert!(seconds.contains(&9));
        assert!(seconds.contains(&18));
        assert!(!seconds.contains(&5));
        assert!(!seconds.contains(&14));
    }

    #[test]
    fn test_other_sample_rates_are_resampled() {
        let config = SoundmarkConfig::default();
        let pipeline = Pipeline::new(&config).unwrap();
        let native = linear_sweep(300.0, 900.0, 2.0, 0.5, 44100);
        let low = linear_sweep(300.0, 900.0, 2.0, 0.5, 22050);

        let a: HashSet<u32> = pipeline
            .fingerprint(&native.samples, 44100, Mode::Query)
            .unwrap()
            .iter()
            .map(|l| l.hash)
            .collect();
        let b: HashSet<u32> = pipeline
            .fingerprint(&low.samples, 22050, Mode::Query)
            .unwrap()
            .iter()
            .map(|l| l.hash)
            .collect();

        let shared = a.intersection(&b).count();
        assert!(shared * 3 > a.len(), "{} of {} hashes shared", shared, a.len());
    }

    #[test]
    fn test_peaks_of_a_steady_tone_stay_in_its_bin() {
        let config = SoundmarkConfig::default();
        let pipeline = Pipeline::new(&config).unwrap();
        let audio = tone_sequence(&[1000.0], 1000, 0.5, 44100);

        let peaks = pipeline.peaks(&audio.samples, 44100).unwrap();
        assert!(!peaks.is_empty());
        // 1000 Hz * 1024 / 44100 = 23.2
        assert!(peaks.iter().all(|p| p.frequency_bin == 23));
        assert!(peaks
            .windows(2)
            .all(|w| w[0].time_offset_ms < w[1].time_offset_ms));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SoundmarkConfig {
            fanout: 0,
            ..Default::default()
        };
        assert!(matches!(
            Pipeline::new(&config),
            Err(SoundmarkError::InvalidConfig(_))
        ));
    }
}

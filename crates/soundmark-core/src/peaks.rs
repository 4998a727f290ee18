//! Spectral peak extraction
//!
//! Per frame, keeps the most prominent local maxima inside the configured
//! frequency band. Selection is deterministic: ties on prominence and
//! magnitude fall back to the lower bin.

use crate::config::SoundmarkConfig;
use crate::spectrum::SpectrumFrame;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const MEAN_EPSILON: f32 = 1e-9;

/// A local maximum in one frame's spectrum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub frame_index: usize,
    pub time_offset_ms: f64,
    pub frequency_bin: u16,
    pub frequency_hz: f32,
    pub magnitude: f32,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    bin: usize,
    magnitude: f32,
    prominence: f32,
}

/// Peak extractor
pub struct PeakExtractor {
    min_bin: usize,
    max_bin: usize,
    peaks_per_frame: usize,
    min_separation: usize,
    neighborhood: usize,
    min_prominence: f32,
    min_magnitude: f32,
    hz_per_bin: f32,
}

impl PeakExtractor {
    pub fn new(config: &SoundmarkConfig) -> Self {
        let (min_bin, max_bin) = config.band_bins();
        Self {
            min_bin,
            max_bin,
            peaks_per_frame: config.peaks_per_frame,
            min_separation: config.peak_min_separation,
            neighborhood: config.peak_min_separation.max(config.peak_neighborhood),
            min_prominence: config.peak_min_prominence,
            min_magnitude: config.peak_min_magnitude,
            hz_per_bin: config.hz_for_bin(1),
        }
    }

    /// Peaks of every frame, in frame order then bin order
    pub fn extract(&self, frames: &[SpectrumFrame]) -> Vec<Peak> {
        let peaks: Vec<Peak> = frames
            .par_iter()
            .flat_map_iter(|frame| {
                self.find_peaks(&frame.magnitudes, self.min_bin, self.max_bin, self.peaks_per_frame)
                    .into_iter()
                    .map(move |(bin, magnitude)| Peak {
                        frame_index: frame.frame_index,
                        time_offset_ms: frame.time_offset_ms,
                        frequency_bin: bin as u16,
                        frequency_hz: bin as f32 * self.hz_per_bin,
                        magnitude,
                    })
            })
            .collect();

        log::debug!("Extracted {} peaks from {} frames", peaks.len(), frames.len());
        peaks
    }

    /// Up to `target_count` peaks of one spectrum within `[min_bin, max_bin]`,
    /// ordered by bin
    pub fn find_peaks(
        &self,
        spectrum: &[f32],
        min_bin: usize,
        max_bin: usize,
        target_count: usize,
    ) -> Vec<(usize, f32)> {
        let len = spectrum.len();
        if target_count == 0 || len < 2 * self.min_separation + 1 || len < 3 {
            return Vec::new();
        }

        let lo = min_bin.max(1);
        let hi = max_bin.min(len - 2);
        if lo > hi {
            return Vec::new();
        }

        let mut candidates: Vec<Candidate> = (lo..=hi)
            .filter_map(|bin| {
                let magnitude = spectrum[bin];
                if magnitude < self.min_magnitude
                    || magnitude <= spectrum[bin - 1]
                    || magnitude <= spectrum[bin + 1]
                {
                    return None;
                }

                let prominence = magnitude / self.neighborhood_mean(spectrum, bin);
                (prominence >= self.min_prominence).then_some(Candidate {
                    bin,
                    magnitude,
                    prominence,
                })
            })
            .collect();

        candidates.sort_by(rank);

        let mut selected: Vec<Candidate> = Vec::with_capacity(target_count);
        for candidate in candidates {
            if selected.len() == target_count {
                break;
            }
            if selected
                .iter()
                .all(|s| s.bin.abs_diff(candidate.bin) >= self.min_separation)
            {
                selected.push(candidate);
            }
        }

        selected.sort_by_key(|c| c.bin);
        selected.into_iter().map(|c| (c.bin, c.magnitude)).collect()
    }

    /// Mean magnitude of the bins around `bin`, excluding `bin` itself
    fn neighborhood_mean(&self, spectrum: &[f32], bin: usize) -> f32 {
        let start = bin.saturating_sub(self.neighborhood);
        let end = (bin + self.neighborhood).min(spectrum.len() - 1);

        let (sum, count) = (start..=end)
            .filter(|&i| i != bin)
            .fold((0.0f32, 0usize), |(sum, count), i| (sum + spectrum[i], count + 1));

        if count == 0 {
            MEAN_EPSILON
        } else {
            sum / count as f32 + MEAN_EPSILON
        }
    }
}

/// Prominence descending, magnitude descending, bin ascending
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.prominence
        .total_cmp(&a.prominence)
        .then_with(|| b.magnitude.total_cmp(&a.magnitude))
        .then_with(|| a.bin.cmp(&b.bin))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> PeakExtractor {
        PeakExtractor::new(&SoundmarkConfig::default())
    }

    fn spectrum_with(peaks: &[(usize, f32)]) -> Vec<f32> {
        let mut spectrum = vec![0.01f32; 512];
        for &(bin, mag) in peaks {
            spectrum[bin] = mag;
        }
        spectrum
    }

    #[test]
    fn test_finds_isolated_peaks_in_bin_order() {
        let spectrum = spectrum_with(&[(40, 0.5), (10, 0.3), (70, 0.2)]);
        let peaks = extractor().find_peaks(&spectrum, 1, 93, 5);
        assert_eq!(peaks, vec![(10, 0.3), (40, 0.5), (70, 0.2)]);
    }

    #[test]
    fn test_respects_band_and_target_count() {
        let spectrum = spectrum_with(&[(5, 0.9), (20, 0.8), (35, 0.7), (150, 1.0)]);
        let ex = extractor();

        // Bin 150 is above the 4 kHz band edge
        let peaks = ex.find_peaks(&spectrum, 1, 93, 5);
        assert!(peaks.iter().all(|&(bin, _)| bin <= 93));

        let top_two = ex.find_peaks(&spectrum, 1, 93, 2);
        assert_eq!(top_two, vec![(5, 0.9), (20, 0.8)]);
    }

    #[test]
    fn test_enforces_minimum_separation() {
        // Two maxima two bins apart: only the stronger survives
        let mut spectrum = spectrum_with(&[(30, 0.6), (32, 0.5)]);
        spectrum[31] = 0.02;
        let peaks = extractor().find_peaks(&spectrum, 1, 93, 5);
        assert_eq!(peaks, vec![(30, 0.6)]);
    }

    #[test]
    fn test_rejects_flat_and_quiet_regions() {
        let ex = extractor();

        // Plateau: not strictly greater than neighbours
        let mut spectrum = vec![0.01f32; 512];
        spectrum[20] = 0.5;
        spectrum[21] = 0.5;
        assert!(ex.find_peaks(&spectrum, 1, 93, 5).is_empty());

        // Below the absolute floor
        let spectrum = spectrum_with(&[(20, 5e-4)]);
        let quiet: Vec<f32> = spectrum.iter().map(|m| m * 0.01).collect();
        assert!(ex.find_peaks(&quiet, 1, 93, 5).is_empty());

        // Not prominent enough against its neighbourhood
        let mut spectrum = vec![0.1f32; 512];
        spectrum[50] = 0.2;
        assert!(ex.find_peaks(&spectrum, 1, 93, 5).is_empty());

        assert!(ex.find_peaks(&[0.0; 512], 1, 93, 5).is_empty());
    }

    #[test]
    fn test_short_spectrum_yields_nothing() {
        let ex = extractor();
        assert!(ex.find_peaks(&[0.0, 1.0, 0.0], 0, 2, 5).is_empty());
        assert!(ex.find_peaks(&[], 0, 10, 5).is_empty());
    }

    #[test]
    fn test_extract_tags_frame_position() {
        let config = SoundmarkConfig::default();
        let frames = vec![
            SpectrumFrame {
                frame_index: 0,
                time_offset_ms: 0.0,
                magnitudes: spectrum_with(&[(10, 0.4)]),
            },
            SpectrumFrame {
                frame_index: 1,
                time_offset_ms: 11.6,
                magnitudes: spectrum_with(&[(12, 0.4), (60, 0.3)]),
            },
        ];

        let peaks = PeakExtractor::new(&config).extract(&frames);
        assert_eq!(peaks.len(), 3);
        assert_eq!(peaks[0].frame_index, 0);
        assert_eq!(peaks[1].frequency_bin, 12);
        assert_eq!(peaks[2].time_offset_ms, 11.6);
        assert!((peaks[0].frequency_hz - config.hz_for_bin(10)).abs() < 1e-3);
    }
}

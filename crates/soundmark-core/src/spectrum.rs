//! Framing and magnitude spectra
//!
//! Samples are cut into overlapping Hann-windowed frames; each frame becomes
//! a magnitude spectrum of `frame_size / 2` bins normalized by `frame_size / 2`.

use crate::config::SoundmarkConfig;
use crate::error::{Result, SoundmarkError};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Magnitude spectrum of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    pub frame_index: usize,
    /// Frame start relative to the first sample
    pub time_offset_ms: f64,
    pub magnitudes: Vec<f32>,
}

/// Short-time spectral analyzer for one hop size
pub struct SpectralAnalyzer {
    frame_size: usize,
    hop_size: usize,
    sample_rate: u32,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectralAnalyzer {
    pub fn new(config: &SoundmarkConfig, hop_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.frame_size);

        Self {
            frame_size: config.frame_size,
            hop_size: hop_size.max(1),
            sample_rate: config.sample_rate,
            window: create_hann_window(config.frame_size),
            fft,
        }
    }

    /// Number of complete frames in `num_samples`
    pub fn num_frames(&self, num_samples: usize) -> usize {
        if num_samples < self.frame_size {
            0
        } else {
            (num_samples - self.frame_size) / self.hop_size + 1
        }
    }

    /// Lazy, time-ordered frame iterator; trailing partial frames are dropped
    pub fn frames<'a>(&'a self, samples: &'a [f32]) -> SpectrumFrames<'a> {
        SpectrumFrames {
            analyzer: self,
            samples,
            next: 0,
            count: self.num_frames(samples.len()),
        }
    }

    /// All frames, computed in parallel
    pub fn analyze(&self, samples: &[f32]) -> Result<Vec<SpectrumFrame>> {
        if samples.len() < self.frame_size {
            return Err(SoundmarkError::InsufficientData {
                samples: samples.len(),
                frame_size: self.frame_size,
            });
        }

        let frames: Vec<SpectrumFrame> = (0..self.num_frames(samples.len()))
            .into_par_iter()
            .map(|index| self.frame_at(samples, index))
            .collect();

        log::debug!("Analyzed {} frames (hop {})", frames.len(), self.hop_size);
        Ok(frames)
    }

    fn frame_at(&self, samples: &[f32], index: usize) -> SpectrumFrame {
        let start = index * self.hop_size;
        let mut buffer: Vec<Complex<f32>> = samples[start..start + self.frame_size]
            .iter()
            .zip(&self.window)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();

        self.fft.process(&mut buffer);

        let half = self.frame_size / 2;
        let norm = half as f32;
        let magnitudes = buffer[..half].iter().map(|c| c.norm() / norm).collect();

        SpectrumFrame {
            frame_index: index,
            time_offset_ms: start as f64 * 1000.0 / self.sample_rate as f64,
            magnitudes,
        }
    }
}

/// Iterator returned by [`SpectralAnalyzer::frames`]
pub struct SpectrumFrames<'a> {
    analyzer: &'a SpectralAnalyzer,
    samples: &'a [f32],
    next: usize,
    count: usize,
}

impl Iterator for SpectrumFrames<'_> {
    type Item = SpectrumFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let frame = self.analyzer.frame_at(self.samples, self.next);
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SpectrumFrames<'_> {}

/// Create Hann window
fn create_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let x = i as f32 / (size - 1) as f32;
            0.5 * (1.0 - (2.0 * PI * x).cos())
        })
        .collect()
}

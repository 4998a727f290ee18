//! Representative segments for ingesting long tracks
//!
//! Tracks longer than the ingest budget are reduced to evenly spaced
//! segments (beginning, middle and end by default) whose total length
//! equals the budget. Segments keep their absolute start so stored
//! landmark offsets stay comparable with full-length queries.

use crate::config::SoundmarkConfig;

/// Configuration for ingest segmentation
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Total audio kept per track, in seconds
    pub max_duration_s: f64,
    /// Number of evenly spaced segments sharing that budget
    pub segment_count: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self::from(&SoundmarkConfig::default())
    }
}

impl From<&SoundmarkConfig> for SegmentationConfig {
    fn from(config: &SoundmarkConfig) -> Self {
        Self {
            max_duration_s: config.ingest_max_duration_s,
            segment_count: config.ingest_segment_count.max(1),
        }
    }
}

/// A borrowed window of the source samples
#[derive(Debug, Clone, Copy)]
pub struct AudioSegment<'a> {
    /// Segment identifier (0-based)
    pub segment_id: usize,
    /// Offset of the first sample in the source
    pub start_sample: usize,
    /// Absolute start time in milliseconds
    pub start_time_ms: f64,
    pub samples: &'a [f32],
}

/// Check if audio exceeds the ingest budget
pub fn should_segment(num_samples: usize, sample_rate: u32, config: &SegmentationConfig) -> bool {
    sample_rate > 0 && num_samples as f64 / sample_rate as f64 > config.max_duration_s
}

/// Cut `samples` into ingest segments; short audio comes back whole
pub fn segment_audio<'a>(
    samples: &'a [f32],
    sample_rate: u32,
    config: &SegmentationConfig,
) -> Vec<AudioSegment<'a>> {
    if !should_segment(samples.len(), sample_rate, config) {
        return vec![AudioSegment {
            segment_id: 0,
            start_sample: 0,
            start_time_ms: 0.0,
            samples,
        }];
    }

    let count = config.segment_count.max(1);
    let segment_len =
        ((config.max_duration_s / count as f64) * sample_rate as f64).round() as usize;
    let last_start = samples.len() - segment_len;

    (0..count)
        .map(|segment_id| {
            let start = if count == 1 {
                0
            } else {
                (segment_id as f64 * last_start as f64 / (count - 1) as f64).round() as usize
            };
            AudioSegment {
                segment_id,
                start_sample: start,
                start_time_ms: start as f64 * 1000.0 / sample_rate as f64,
                samples: &samples[start..start + segment_len],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_segmentation_for_short_audio() {
        let samples = vec![0.0; 44100 * 20];
        let config = SegmentationConfig::default();
        assert!(!should_segment(samples.len(), 44100, &config));

        let segments = segment_audio(&samples, 44100, &config);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].samples.len(), samples.len());
        assert_eq!(segments[0].start_time_ms, 0.0);
    }

    #[test]
    fn test_long_audio_keeps_beginning_middle_and_end() {
        let samples = vec![0.0; 44100 * 120];
        let config = SegmentationConfig::default();
        assert!(should_segment(samples.len(), 44100, &config));

        let segments = segment_audio(&samples, 44100, &config);
        assert_eq!(segments.len(), 3);

        let total: usize = segments.iter().map(|s| s.samples.len()).sum();
        assert_eq!(total, 44100 * 30);

        // 10 s each at 0 s, 55 s and 110 s
        assert_eq!(segments[0].start_time_ms, 0.0);
        assert_eq!(segments[1].start_time_ms, 55_000.0);
        assert_eq!(segments[2].start_time_ms, 110_000.0);
        assert_eq!(
            segments[2].start_sample + segments[2].samples.len(),
            samples.len()
        );
    }
}

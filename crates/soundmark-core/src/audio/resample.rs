//! Sample-rate conversion with rubato

use crate::error::{Result, SoundmarkError};
use rubato::{FftFixedIn, Resampler};

const CHUNK: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Resample mono audio to `to_rate`.
///
/// The resampler's delay is trimmed so sample `i` of the output lines up with
/// time `i / to_rate` of the input; output length is `ceil(len * to / from)`.
pub fn resample_to_target(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(SoundmarkError::Resample(format!(
            "cannot resample {} Hz -> {} Hz",
            from_rate, to_rate
        )));
    }

    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK, SUB_CHUNKS, 1)
            .map_err(|e| SoundmarkError::Resample(e.to_string()))?;

    let expected_len = (samples.len() as f64 * to_rate as f64 / from_rate as f64).ceil() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected_len + delay + CHUNK);

    let mut pos = 0;
    while output.len() < expected_len + delay {
        let needed = resampler.input_frames_next();
        let mut chunk = vec![0.0f32; needed];
        if pos < samples.len() {
            let end = (pos + needed).min(samples.len());
            chunk[..end - pos].copy_from_slice(&samples[pos..end]);
        }
        pos += needed;

        let frames = resampler
            .process(&[chunk], None)
            .map_err(|e| SoundmarkError::Resample(e.to_string()))?;
        if let Some(channel) = frames.into_iter().next() {
            output.extend(channel);
        }
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected_len);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_identity() {
        let samples = vec![0.1, -0.2, 0.3];
        assert_eq!(resample_to_target(&samples, 44100, 44100).unwrap(), samples);
    }

    #[test]
    fn test_output_length_follows_ratio() {
        let samples = vec![0.0f32; 22050];
        let out = resample_to_target(&samples, 22050, 44100).unwrap();
        assert_eq!(out.len(), 44100);

        let out = resample_to_target(&vec![0.0f32; 48000], 48000, 44100).unwrap();
        assert_eq!(out.len(), 44100);
    }

    #[test]
    fn test_tone_keeps_its_level() {
        let tone: Vec<f32> = (0..48000)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 48000.0).sin() * 0.5)
            .collect();
        let out = resample_to_target(&tone, 48000, 44100).unwrap();

        // RMS of a 0.5 amplitude sine is ~0.354; skip the edges
        let body = &out[4096..out.len() - 4096];
        let rms = (body.iter().map(|s| s * s).sum::<f32>() / body.len() as f32).sqrt();
        assert!((rms - 0.354).abs() < 0.02, "rms {}", rms);
    }

    #[test]
    fn test_zero_rate_is_an_error() {
        assert!(matches!(
            resample_to_target(&[0.5], 0, 44100),
            Err(SoundmarkError::Resample(_))
        ));
    }
}

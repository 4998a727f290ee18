//! Decoding through an external `ffmpeg` process

use super::{AudioData, Decoder};
use crate::error::{Result, SoundmarkError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Asks ffmpeg for raw little-endian f32 mono PCM at the target rate
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    binary: PathBuf,
    target_sample_rate: u32,
}

impl FfmpegDecoder {
    pub fn new(target_sample_rate: u32) -> Self {
        Self::with_binary("ffmpeg", target_sample_rate)
    }

    pub fn with_binary(binary: impl Into<PathBuf>, target_sample_rate: u32) -> Self {
        Self {
            binary: binary.into(),
            target_sample_rate,
        }
    }
}

impl Decoder for FfmpegDecoder {
    fn decode(&self, path: &Path) -> Result<AudioData> {
        if !path.exists() {
            return Err(SoundmarkError::decode(path, "file not found"));
        }

        let rate = self.target_sample_rate.to_string();
        let output = Command::new(&self.binary)
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(path)
            .args(["-f", "f32le", "-ac", "1", "-ar", rate.as_str(), "-"])
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => SoundmarkError::decode(
                    path,
                    format!("ffmpeg binary not found: {}", self.binary.display()),
                ),
                _ => SoundmarkError::decode(path, format!("ffmpeg execution failed: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SoundmarkError::decode(path, stderr.trim()));
        }

        let samples = parse_f32le(&output.stdout);
        log::debug!(
            "ffmpeg decoded {} samples from {}",
            samples.len(),
            path.display()
        );
        Ok(AudioData::mono(samples, self.target_sample_rate))
    }
}

/// Parse raw f32le PCM; a trailing partial sample is dropped
fn parse_f32le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

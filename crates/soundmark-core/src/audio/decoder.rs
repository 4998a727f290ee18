//! In-process decoding for WAV, MP3, FLAC, OGG, M4A and AAC

use super::{container, duration_ms, AudioData, AudioFormat, Decoder};
use crate::error::{Result, SoundmarkError};
use anyhow::Context;
use std::path::Path;

/// Pure Rust decoders, downmixed and resampled to the target rate
#[derive(Debug, Clone)]
pub struct NativeDecoder {
    target_sample_rate: u32,
}

impl NativeDecoder {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }
}

impl Decoder for NativeDecoder {
    fn decode(&self, path: &Path) -> Result<AudioData> {
        if !path.exists() {
            return Err(SoundmarkError::decode(path, "file not found"));
        }

        let decoded = match AudioFormat::from_path(path) {
            AudioFormat::Wav => decode_wav(path),
            AudioFormat::Mp3 => decode_mp3(path),
            AudioFormat::Flac => decode_flac(path),
            AudioFormat::Ogg => decode_ogg(path),
            AudioFormat::M4a | AudioFormat::Aac => container::decode_container(path),
            AudioFormat::Unknown => {
                return Err(SoundmarkError::decode(path, "unsupported audio format"))
            }
        };

        let audio = decoded.map_err(|e| SoundmarkError::decode(path, format!("{:#}", e)))?;
        log::debug!(
            "Decoded {} ({} Hz, {} ch, {} ms)",
            path.display(),
            audio.sample_rate,
            audio.channels,
            audio.duration_ms
        );
        audio.into_canonical(self.target_sample_rate)
    }
}

/// Decode WAV file
fn decode_wav(path: &Path) -> anyhow::Result<AudioData> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(AudioData {
        duration_ms: duration_ms(samples.len(), spec.sample_rate, spec.channels),
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Decode MP3 file
fn decode_mp3(path: &Path) -> anyhow::Result<AudioData> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read MP3 file: {}", path.display()))?;

    let mut decoder = minimp3::Decoder::new(&data[..]);
    let mut samples = Vec::new();
    let mut sample_rate = 0;
    let mut channels = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = frame.sample_rate as u32;
                    channels = frame.channels as u16;
                }
                samples.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => anyhow::bail!("MP3 decode error: {}", e),
        }
    }

    Ok(AudioData {
        duration_ms: duration_ms(samples.len(), sample_rate, channels),
        samples,
        sample_rate,
        channels,
    })
}

/// Decode FLAC file
fn decode_flac(path: &Path) -> anyhow::Result<AudioData> {
    let mut reader = claxon::FlacReader::open(path)
        .with_context(|| format!("Failed to open FLAC file: {}", path.display()))?;

    let info = reader.streaminfo();
    let channels = info.channels as u16;
    let max_val = (1i64 << (info.bits_per_sample - 1)) as f32;

    let samples: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / max_val))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(AudioData {
        duration_ms: duration_ms(samples.len(), info.sample_rate, channels),
        samples,
        sample_rate: info.sample_rate,
        channels,
    })
}

/// Decode OGG Vorbis file
fn decode_ogg(path: &Path) -> anyhow::Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open OGG file: {}", path.display()))?;

    let mut reader = lewton::inside_ogg::OggStreamReader::new(file)?;
    let sample_rate = reader.ident_hdr.audio_sample_rate;
    let channels = reader.ident_hdr.audio_channels as u16;

    let mut samples = Vec::new();
    while let Some(packet) = reader.read_dec_packet_itl()? {
        samples.extend(packet.iter().map(|&s| s as f32 / 32768.0));
    }

    Ok(AudioData {
        duration_ms: duration_ms(samples.len(), sample_rate, channels),
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let v = ((i as f32 * 0.05).sin() * 8000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(v).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_stereo_wav_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 44100, 2, 4410);

        let audio = NativeDecoder::new(44100).decode(&path).unwrap();
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.sample_rate, 44100);
        assert_eq!(audio.samples.len(), 4410);
        assert_eq!(audio.duration_ms, 100);
    }

    #[test]
    fn test_decode_resamples_to_target_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("low.wav");
        write_wav(&path, 22050, 1, 22050);

        let audio = NativeDecoder::new(44100).decode(&path).unwrap();
        assert_eq!(audio.sample_rate, 44100);
        assert_eq!(audio.samples.len(), 44100);
    }

    #[test]
    fn test_decode_errors() {
        let decoder = NativeDecoder::new(44100);
        let missing = decoder.decode(Path::new("/no/such/file.wav")).unwrap_err();
        assert!(matches!(missing, SoundmarkError::Decode { .. }));

        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.wav");
        std::fs::write(&bogus, b"not a wav file").unwrap();
        assert!(matches!(
            decoder.decode(&bogus),
            Err(SoundmarkError::Decode { .. })
        ));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, b"hello").unwrap();
        assert!(decoder.decode(&text).is_err());
    }
}

//! Audio decoding and encoding
//!
//! Encoded bytes (an imported file, an assembled recording) become a
//! playable [`AudioBuffer`] at the context sample rate. WAV is the native
//! container; anything else is reported as a decode failure to the caller.
//! Sample rate conversion uses linear interpolation.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{Result, VibelabError};

/// Decodes an encoded audio byte buffer into samples
///
/// This is the "decode" capability of the hardware context. Decoding may
/// fail on malformed or unsupported input; callers report that to the user
/// rather than treating it as fatal.
pub trait Decoder: Send + Sync {
    /// Decode `bytes`, resampling to `target_rate`
    fn decode(&self, bytes: &[u8], target_rate: u32) -> Result<AudioBuffer>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// WAV decoder backed by hound
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn decode(&self, bytes: &[u8], target_rate: u32) -> Result<AudioBuffer> {
        let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| {
            VibelabError::DecodeFailed {
                reason: format!("not a readable WAV stream: {}", e),
                source: Some(Box::new(e)),
            }
        })?;

        let spec = reader.spec();
        let channels = spec.channels as usize;
        if ChannelLayout::from_count(channels).is_none() {
            return Err(VibelabError::UnsupportedFormat {
                format: format!("{}-channel audio (only mono/stereo supported)", channels),
            });
        }

        let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
        if interleaved.len() < channels {
            return Err(VibelabError::EmptyAudio);
        }

        let channel_data = deinterleave(&interleaved, channels);
        let channel_data = if spec.sample_rate != target_rate {
            resample_channels(&channel_data, spec.sample_rate, target_rate)
        } else {
            channel_data
        };

        AudioBuffer::from_channels(channel_data, target_rate)
    }

    fn name(&self) -> &'static str {
        "wav"
    }
}

/// Export bit depth configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Bit depth: 16, 24, or 32 (float)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat { bit_depth: 24 }
    }
}

impl ExportFormat {
    /// Lossless float container used for in-memory recording blobs
    pub fn float() -> Self {
        ExportFormat { bit_depth: 32 }
    }

    fn spec(&self, buffer: &AudioBuffer) -> Result<WavSpec> {
        let sample_format = match self.bit_depth {
            16 | 24 => SampleFormat::Int,
            32 => SampleFormat::Float,
            other => {
                return Err(VibelabError::UnsupportedFormat {
                    format: format!("{}-bit audio (only 16, 24, 32 supported)", other),
                })
            }
        };
        Ok(WavSpec {
            channels: buffer.channels() as u16,
            sample_rate: buffer.sample_rate,
            bits_per_sample: self.bit_depth,
            sample_format,
        })
    }
}

/// Encode a buffer into an in-memory WAV blob
pub fn encode_wav(buffer: &AudioBuffer, format: ExportFormat) -> Result<Vec<u8>> {
    let spec = format.spec(buffer)?;
    let mut bytes = Vec::new();
    {
        let writer = WavWriter::new(Cursor::new(&mut bytes), spec).map_err(hound_to_io)?;
        write_samples(writer, buffer, format)?;
    }
    Ok(bytes)
}

/// Write a buffer to a WAV file on disk
pub fn write_wav(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    let spec = format.spec(buffer)?;
    let writer = WavWriter::create(path, spec).map_err(hound_to_io)?;
    write_samples(writer, buffer, format)
}

/// Read and decode a WAV file from disk
pub fn read_wav(path: &Path, target_rate: u32) -> Result<AudioBuffer> {
    let bytes = std::fs::read(path)?;
    WavDecoder.decode(&bytes, target_rate)
}

/// Generate a mono sine tone
///
/// Useful for demos and for testing playback pipelines.
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let mut buffer = AudioBuffer::new(num_samples, ChannelLayout::Mono, sample_rate);

    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    for (i, sample) in buffer.samples[0].iter_mut().enumerate() {
        *sample = (angular_freq * i as f32).sin();
    }

    buffer
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn hound_to_io(e: hound::Error) -> VibelabError {
    VibelabError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

fn write_samples<W: std::io::Write + std::io::Seek>(
    mut writer: WavWriter<W>,
    buffer: &AudioBuffer,
    format: ExportFormat,
) -> Result<()> {
    let interleaved = buffer.to_interleaved();
    match format.bit_depth {
        16 => {
            for sample in interleaved {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
        }
        24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
        }
        _ => {
            for sample in interleaved {
                writer.write_sample(sample).map_err(hound_to_io)?;
            }
        }
    }
    writer.finalize().map_err(hound_to_io)
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    fn decode_err(e: hound::Error) -> VibelabError {
        VibelabError::DecodeFailed {
            reason: format!("corrupt sample data: {}", e),
            source: Some(Box::new(e)),
        }
    }

    match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_err),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_err),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_err),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_err),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_err),
        (SampleFormat::Int, bits) => Err(VibelabError::UnsupportedFormat {
            format: format!("{}-bit integer audio", bits),
        }),
    }
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];

    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            result[ch].push(*sample);
        }
    }

    result
}

/// Resample audio channels to a different sample rate
pub(crate) fn resample_channels(
    channels: &[Vec<f32>],
    source_rate: u32,
    target_rate: u32,
) -> Vec<Vec<f32>> {
    let ratio = target_rate as f64 / source_rate as f64;

    channels
        .iter()
        .map(|channel| resample_linear(channel, ratio))
        .collect()
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).round() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    #[test]
    fn test_decode_encoded_float_blob() {
        let tone = generate_test_tone(440.0, 0.5, 48000);
        let bytes = encode_wav(&tone, ExportFormat::float()).unwrap();

        let decoded = WavDecoder.decode(&bytes, 48000).unwrap();
        assert_eq!(decoded.len(), tone.len());
        assert_relative_eq!(decoded.duration_secs(), 0.5);
        assert_relative_eq!(decoded.channel(0)[100], tone.channel(0)[100], epsilon = 1e-6);
    }

    #[test]
    fn test_decode_resamples_to_context_rate() {
        let tone = generate_test_tone(220.0, 1.0, 44100);
        let bytes = encode_wav(&tone, ExportFormat::default()).unwrap();

        let decoded = WavDecoder.decode(&bytes, 48000).unwrap();
        assert_eq!(decoded.sample_rate, 48000);
        assert_relative_eq!(decoded.duration_secs(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = WavDecoder.decode(b"definitely not a riff header", 48000);
        assert!(matches!(result, Err(VibelabError::DecodeFailed { .. })));
    }

    #[test]
    fn test_decode_header_only_is_empty() {
        let empty = AudioBuffer::new(0, ChannelLayout::Mono, 48000);
        let bytes = encode_wav(&empty, ExportFormat::float()).unwrap();
        assert!(matches!(
            WavDecoder.decode(&bytes, 48000),
            Err(VibelabError::EmptyAudio)
        ));
    }

    #[test]
    fn test_write_and_read_file_16bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beat.wav");
        let tone = generate_test_tone(1000.0, 0.25, 48000);

        write_wav(&tone, &path, ExportFormat { bit_depth: 16 }).unwrap();
        let loaded = read_wav(&path, 48000).unwrap();

        assert_eq!(loaded.len(), tone.len());
        assert_relative_eq!(loaded.channel(0)[12], tone.channel(0)[12], epsilon = 1e-3);
    }

    #[test]
    fn test_unsupported_bit_depth() {
        let tone = generate_test_tone(1000.0, 0.1, 48000);
        let result = encode_wav(&tone, ExportFormat { bit_depth: 12 });
        assert!(matches!(result, Err(VibelabError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_resample_linear_upsample() {
        let samples = vec![0.0, 1.0];
        let out = resample_linear(&samples, 2.0);
        assert_eq!(out.len(), 4);
        assert_relative_eq!(out[1], 0.5);
    }
}

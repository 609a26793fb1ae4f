//! Audio Buffer Management
//!
//! Decoded sample storage shared (read-only) between regions, plus the
//! scratch buffers the render graph mixes into.

use crate::error::{Result, VibelabError};

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Peak absolute sample value across all channels (linear)
pub fn peak_level(buffer: &AudioBuffer) -> f32 {
    buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| s.abs())
        .fold(0.0_f32, f32::max)
}

/// Channel configurations the engine renders and records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    Mono,
    /// Left, right
    #[default]
    Stereo,
}

impl ChannelLayout {
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// `None` for anything but 1 or 2
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

/// Non-interleaved 32-bit float sample buffer
///
/// Outer Vec is channels, inner Vec is samples. Decoded buffers are wrapped
/// in `Arc` once and never mutated afterwards, so split regions can share
/// them.
///
/// # Example
/// ```
/// use vibelab::engine::{AudioBuffer, ChannelLayout};
///
/// let buffer = AudioBuffer::new(48000, ChannelLayout::Stereo, 48000);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.duration_secs(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a zeroed buffer with the specified number of samples per channel
    pub fn new(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        let samples = vec![vec![0.0_f32; num_samples]; layout.num_channels()];
        Self {
            samples,
            sample_rate,
        }
    }

    /// Build a buffer from per-channel sample vectors
    ///
    /// All channels must have the same length.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() || ChannelLayout::from_count(samples.len()).is_none() {
            return Err(VibelabError::UnsupportedFormat {
                format: format!("{}-channel audio (only mono/stereo supported)", samples.len()),
            });
        }
        let len = samples[0].len();
        if samples.iter().any(|ch| ch.len() != len) {
            return Err(VibelabError::InvalidParameter {
                param: "samples".to_string(),
                value: "ragged channels".to_string(),
                expected: "equal channel lengths".to_string(),
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// De-interleave `L R L R ...` frames
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Result<Self> {
        let num_channels = layout.num_channels();

        if interleaved.len() % num_channels != 0 {
            return Err(VibelabError::DecodeFailed {
                reason: format!(
                    "{} samples do not divide into {}-channel frames",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let frames = interleaved.len() / num_channels;
        let samples = (0..num_channels)
            .map(|ch| {
                let mut channel = Vec::with_capacity(frames);
                channel.extend(interleaved.iter().skip(ch).step_by(num_channels));
                channel
            })
            .collect();

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ...)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());
        for frame in 0..self.len() {
            interleaved.extend(self.samples.iter().map(|channel| channel[frame]));
        }
        interleaved
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Frames per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Convert a time offset into a sample index at this buffer's rate
    #[inline]
    pub fn frame_at(&self, secs: f64) -> usize {
        (secs.max(0.0) * self.sample_rate as f64).round() as usize
    }

    /// # Panics
    /// If `index` is not a channel of this buffer
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    #[inline]
    pub fn get_sample(&self, channel: usize, index: usize) -> Option<f32> {
        self.samples
            .get(channel)
            .and_then(|ch| ch.get(index).copied())
    }

    /// Resize every channel to `num_samples` and zero it.
    ///
    /// Used by the render graph on its scratch buffers; only allocates when
    /// the block grows.
    pub fn clear_to(&mut self, num_samples: usize) {
        for channel in &mut self.samples {
            channel.resize(num_samples, 0.0);
            channel.fill(0.0);
        }
    }

    /// Multiply every sample by a linear gain
    pub fn scale(&mut self, gain: f32) {
        for channel in &mut self.samples {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Add another buffer into this one, sample by sample
    pub fn mix_from(&mut self, other: &AudioBuffer) {
        for (dst, src) in self.samples.iter_mut().zip(other.samples.iter()) {
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d += *s;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_db_conversion() {
        assert_relative_eq!(db_to_linear(0.0), 1.0);
        assert_relative_eq!(db_to_linear(-6.0206), 0.5, epsilon = 1e-4);
        assert!(linear_to_db(0.0).is_infinite());
        assert_relative_eq!(linear_to_db(1.0), 0.0);
    }

    #[test]
    fn test_interleave_round_trip_keeps_frames() {
        let interleaved = vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buffer =
            AudioBuffer::from_interleaved(&interleaved, ChannelLayout::Stereo, 48000).unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.channel(1), &[-0.1, -0.2, -0.3]);
        assert_eq!(buffer.to_interleaved(), interleaved);
    }

    #[test]
    fn test_from_interleaved_rejects_partial_frame() {
        let result = AudioBuffer::from_interleaved(&[0.0, 0.1, 0.2], ChannelLayout::Stereo, 48000);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_channels_rejects_ragged() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 4], vec![0.0; 3]], 48000);
        assert!(result.is_err());
        let result = AudioBuffer::from_channels(vec![vec![0.0; 4]; 3], 48000);
        assert!(matches!(result, Err(VibelabError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_frame_at_and_duration() {
        let buffer = AudioBuffer::new(24000, ChannelLayout::Mono, 48000);
        assert_relative_eq!(buffer.duration_secs(), 0.5);
        assert_eq!(buffer.frame_at(0.25), 12000);
        assert_eq!(buffer.frame_at(-1.0), 0);
    }

    #[test]
    fn test_scale_and_mix() {
        let mut a = AudioBuffer::from_channels(vec![vec![1.0; 4]], 48000).unwrap();
        let b = AudioBuffer::from_channels(vec![vec![0.25; 4]], 48000).unwrap();
        a.scale(0.5);
        a.mix_from(&b);
        assert_eq!(a.channel(0), &[0.75; 4]);
        assert_relative_eq!(peak_level(&a), 0.75);

        a.clear_to(8);
        assert_eq!(a.len(), 8);
        assert_eq!(peak_level(&a), 0.0);
    }
}

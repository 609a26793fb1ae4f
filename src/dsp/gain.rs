//! Gain Effect
//!
//! Linear volume stage used for track faders and the master bus.

use crate::dsp::effect::{finite_param, unknown_param, Effect};
use crate::engine::buffer::{db_to_linear, linear_to_db};
use crate::engine::AudioBuffer;
use crate::error::Result;

const PARAMS: &[&str] = &["gain"];

/// Multiplicative gain stage
///
/// # Parameters
/// - `gain`: linear multiplier, clamped to 0..=1 for faders
///
/// # Example
/// ```
/// use vibelab::dsp::{Effect, Gain};
/// use vibelab::engine::AudioBuffer;
///
/// let mut gain = Gain::new(0.5);
/// let mut buffer = AudioBuffer::from_channels(vec![vec![1.0; 4]], 48000).unwrap();
/// gain.process(&mut buffer);
/// assert_eq!(buffer.channel(0), &[0.5; 4]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Gain {
    enabled: bool,
    gain: f32,
}

impl Gain {
    /// Create a gain stage; values outside 0..=1 are clamped
    pub fn new(gain: f32) -> Self {
        Self {
            enabled: true,
            gain: clamp_gain(gain),
        }
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = clamp_gain(gain);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_gain_db(&mut self, db: f32) {
        self.set_gain(db_to_linear(db));
    }

    pub fn gain_db(&self) -> f32 {
        linear_to_db(self.gain)
    }
}

fn clamp_gain(gain: f32) -> f32 {
    if gain.is_finite() {
        gain.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Effect for Gain {
    fn process(&mut self, buffer: &mut AudioBuffer) {
        if !self.enabled || self.gain == 1.0 {
            return;
        }
        buffer.scale(self.gain);
    }

    fn prepare(&mut self, _sample_rate: u32) {}

    fn reset(&mut self) {}

    fn effect_type(&self) -> &'static str {
        "gain"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_param(&mut self, name: &str, value: f32) -> Result<()> {
        let value = finite_param("gain", name, value)?;
        match name {
            "gain" => {
                self.set_gain(value);
                Ok(())
            }
            _ => Err(unknown_param("gain", name, PARAMS)),
        }
    }

    fn param(&self, name: &str) -> Option<f32> {
        (name == "gain").then_some(self.gain)
    }

    fn param_names(&self) -> &'static [&'static str] {
        PARAMS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    #[test_case(0.5, 0.5 ; "in range")]
    #[test_case(1.7, 1.0 ; "above one")]
    #[test_case(-0.2, 0.0 ; "negative")]
    fn test_gain_clamps(input: f32, expected: f32) {
        assert_eq!(Gain::new(input).gain(), expected);
    }

    #[test]
    fn test_zero_gain_silences() {
        let mut gain = Gain::new(0.0);
        let mut buffer = AudioBuffer::from_channels(vec![vec![0.8; 8], vec![-0.8; 8]], 48000)
            .unwrap();
        gain.process(&mut buffer);
        assert!(buffer.samples.iter().flatten().all(|&s| s == 0.0));
    }

    #[test]
    fn test_db_interface() {
        let mut gain = Gain::default();
        gain.set_gain_db(-6.0206);
        assert_relative_eq!(gain.gain(), 0.5, epsilon = 1e-4);
        assert_relative_eq!(gain.gain_db(), -6.0206, epsilon = 1e-3);
    }
}

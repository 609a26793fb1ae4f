//! Biquad EQ band
//!
//! One band of the per-track three-band EQ (low shelf, peaking mid, high
//! shelf), using the Audio EQ Cookbook formulas.

use super::effect::{finite_param, unknown_param, Effect};
use crate::engine::AudioBuffer;
use crate::error::Result;
use std::f64::consts::PI;

const PARAMS: &[&str] = &["frequency", "gain", "Q"];

/// Filter type for EQ bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    /// Bell curve boost/cut
    #[default]
    Peak,
    /// Boost/cut below frequency
    LowShelf,
    /// Boost/cut above frequency
    HighShelf,
}

/// Biquad filter coefficients, normalised by a0
#[derive(Debug, Clone, Copy)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    const UNITY: BiquadCoeffs = BiquadCoeffs {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    fn calculate(
        filter_type: FilterType,
        sample_rate: f64,
        frequency: f64,
        gain_db: f64,
        q: f64,
    ) -> Self {
        let freq = frequency.clamp(20.0, sample_rate / 2.0 - 1.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a = 10.0_f64.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::Peak => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterType::LowShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterType::HighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
        };

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }
}

/// Single biquad EQ band
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    filter_type: FilterType,
    enabled: bool,
    /// Center/corner frequency in Hz
    frequency: f32,
    /// Gain in dB (-40 to +40)
    gain_db: f32,
    /// Q factor (0.1 to 18)
    q: f32,
    sample_rate: f64,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
    coeffs_dirty: bool,
}

impl BiquadFilter {
    pub fn new(filter_type: FilterType, frequency: f32, q: f32) -> Self {
        Self {
            filter_type,
            enabled: true,
            frequency: frequency.clamp(20.0, 20000.0),
            gain_db: 0.0,
            q: q.clamp(0.1, 18.0),
            sample_rate: 48000.0,
            coeffs: BiquadCoeffs::UNITY,
            states: Vec::new(),
            coeffs_dirty: true,
        }
    }

    /// Low shelf at 200 Hz
    pub fn low_shelf() -> Self {
        Self::new(FilterType::LowShelf, 200.0, std::f32::consts::FRAC_1_SQRT_2)
    }

    /// Peaking band at 1 kHz, Q 1
    pub fn mid_peak() -> Self {
        Self::new(FilterType::Peak, 1000.0, 1.0)
    }

    /// High shelf at 5 kHz
    pub fn high_shelf() -> Self {
        Self::new(FilterType::HighShelf, 5000.0, std::f32::consts::FRAC_1_SQRT_2)
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    pub fn q(&self) -> f32 {
        self.q
    }

    /// A band at 0 dB is transparent for every filter type used here
    fn is_bypass(&self) -> bool {
        !self.enabled || self.gain_db.abs() < 0.01
    }

    fn update_coefficients(&mut self) {
        if !self.coeffs_dirty {
            return;
        }
        self.coeffs = if self.is_bypass() {
            BiquadCoeffs::UNITY
        } else {
            BiquadCoeffs::calculate(
                self.filter_type,
                self.sample_rate,
                self.frequency as f64,
                self.gain_db as f64,
                self.q as f64,
            )
        };
        self.coeffs_dirty = false;
    }
}

impl Effect for BiquadFilter {
    fn process(&mut self, buffer: &mut AudioBuffer) {
        if self.is_bypass() {
            return;
        }
        self.update_coefficients();

        if self.states.len() < buffer.channels() {
            self.states.resize_with(buffer.channels(), BiquadState::default);
        }

        let coeffs = self.coeffs;
        for (channel, state) in buffer.samples.iter_mut().zip(self.states.iter_mut()) {
            for sample in channel.iter_mut() {
                *sample = state.process(*sample as f64, &coeffs) as f32;
            }
        }
    }

    fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f64;
        self.coeffs_dirty = true;
    }

    fn reset(&mut self) {
        self.states.iter_mut().for_each(|s| *s = BiquadState::default());
    }

    fn effect_type(&self) -> &'static str {
        match self.filter_type {
            FilterType::LowShelf => "lowshelf",
            FilterType::Peak => "peaking",
            FilterType::HighShelf => "highshelf",
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.coeffs_dirty = true;
    }

    fn set_param(&mut self, name: &str, value: f32) -> Result<()> {
        let value = finite_param(self.effect_type(), name, value)?;
        match name {
            "frequency" => self.frequency = value.clamp(20.0, 20000.0),
            "gain" => self.gain_db = value.clamp(-40.0, 40.0),
            "Q" | "q" => self.q = value.clamp(0.1, 18.0),
            _ => return Err(unknown_param(self.effect_type(), name, PARAMS)),
        }
        self.coeffs_dirty = true;
        Ok(())
    }

    fn param(&self, name: &str) -> Option<f32> {
        match name {
            "frequency" => Some(self.frequency),
            "gain" => Some(self.gain_db),
            "Q" | "q" => Some(self.q),
            _ => None,
        }
    }

    fn param_names(&self) -> &'static [&'static str] {
        PARAMS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::generate_test_tone;

    fn rms(buffer: &AudioBuffer) -> f64 {
        let ch = buffer.channel(0);
        (ch.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / ch.len() as f64).sqrt()
    }

    #[test]
    fn test_flat_band_is_transparent() {
        let mut eq = BiquadFilter::mid_peak();
        eq.prepare(48000);
        let original = generate_test_tone(1000.0, 0.1, 48000);
        let mut buffer = original.clone();
        eq.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_peak_boost() {
        let mut eq = BiquadFilter::mid_peak();
        eq.prepare(48000);
        eq.set_param("gain", 12.0).unwrap();

        let mut buffer = generate_test_tone(1000.0, 0.1, 48000);
        let before = rms(&buffer);
        eq.process(&mut buffer);
        let ratio = rms(&buffer) / before;

        // 12dB boost should increase amplitude by ~4x
        assert!(ratio > 3.0 && ratio < 5.0, "Expected ~4x gain, got {}", ratio);
    }

    #[test]
    fn test_low_shelf_cut_leaves_highs() {
        let mut eq = BiquadFilter::low_shelf();
        eq.prepare(48000);
        eq.set_param("gain", -12.0).unwrap();

        let mut low = generate_test_tone(60.0, 0.2, 48000);
        let low_before = rms(&low);
        eq.process(&mut low);
        eq.reset();

        let mut high = generate_test_tone(8000.0, 0.2, 48000);
        let high_before = rms(&high);
        eq.process(&mut high);

        assert!(rms(&low) / low_before < 0.4);
        assert!((rms(&high) / high_before - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_params_clamp_and_reject() {
        let mut eq = BiquadFilter::high_shelf();
        eq.set_param("frequency", 90000.0).unwrap();
        assert_eq!(eq.param("frequency"), Some(20000.0));
        eq.set_param("Q", 0.0).unwrap();
        assert_eq!(eq.param("Q"), Some(0.1));

        assert!(eq.set_param("detune", 1.0).is_err());
        assert!(eq.set_param("gain", f32::NAN).is_err());
        assert_eq!(eq.effect_type(), "highshelf");
    }
}

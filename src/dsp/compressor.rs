//! Dynamics compressor
//!
//! Feed-forward compressor with linked-channel peak detection, a soft knee
//! gain computer and one-pole attack/release smoothing. Parameters and their
//! defaults follow the browser's `DynamicsCompressorNode`, so values saved by
//! the effects panel mean the same thing here.

use super::effect::{finite_param, unknown_param, Effect};
use crate::engine::buffer::{db_to_linear, linear_to_db};
use crate::engine::AudioBuffer;
use crate::error::Result;

const PARAMS: &[&str] = &["threshold", "knee", "ratio", "attack", "release"];

/// Compressor parameters (dB, ratio, seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorParams {
    /// Threshold level in dB (-100 to 0)
    pub threshold_db: f32,
    /// Knee width in dB (0 = hard knee, up to 40)
    pub knee_db: f32,
    /// Compression ratio (1 to 20)
    pub ratio: f32,
    /// Attack time in seconds (0 to 1)
    pub attack_secs: f32,
    /// Release time in seconds (0 to 1)
    pub release_secs: f32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            knee_db: 30.0,
            ratio: 12.0,
            attack_secs: 0.003,
            release_secs: 0.25,
        }
    }
}

impl CompressorParams {
    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        self.threshold_db = self.threshold_db.clamp(-100.0, 0.0);
        self.knee_db = self.knee_db.clamp(0.0, 40.0);
        self.ratio = self.ratio.clamp(1.0, 20.0);
        self.attack_secs = self.attack_secs.clamp(0.0, 1.0);
        self.release_secs = self.release_secs.clamp(0.0, 1.0);
    }
}

/// Compressor dynamics processor
#[derive(Debug, Clone)]
pub struct Compressor {
    enabled: bool,
    params: CompressorParams,
    sample_rate: f64,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed gain (linear), shared by all channels
    gain: f32,
}

impl Compressor {
    pub fn new() -> Self {
        Self::with_params(CompressorParams::default())
    }

    pub fn with_params(mut params: CompressorParams) -> Self {
        params.clamp();
        let mut comp = Self {
            enabled: true,
            params,
            sample_rate: 48000.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            gain: 1.0,
        };
        comp.update_coefficients();
        comp
    }

    pub fn params(&self) -> &CompressorParams {
        &self.params
    }

    /// Current gain reduction in dB, for metering
    pub fn gain_reduction_db(&self) -> f32 {
        linear_to_db(self.gain).max(-96.0)
    }

    /// coeff = exp(-1 / time_in_samples); zero time means instant
    fn update_coefficients(&mut self) {
        let one_pole = |secs: f32| {
            let samples = secs * self.sample_rate as f32;
            if samples > 0.0 {
                (-1.0 / samples).exp()
            } else {
                0.0
            }
        };
        self.attack_coeff = one_pole(self.params.attack_secs);
        self.release_coeff = one_pole(self.params.release_secs);
    }

    /// Static curve: gain change in dB (<= 0) for an input level in dB
    fn compute_gain_reduction_db(&self, input_db: f32) -> f32 {
        let threshold = self.params.threshold_db;
        let ratio = self.params.ratio;
        let knee = self.params.knee_db;
        let over = input_db - threshold;

        if knee > 0.0 && 2.0 * over.abs() <= knee {
            let x = over + knee / 2.0;
            (1.0 / ratio - 1.0) * x * x / (2.0 * knee)
        } else if over > 0.0 {
            over / ratio - over
        } else {
            0.0
        }
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Compressor {
    fn process(&mut self, buffer: &mut AudioBuffer) {
        if !self.enabled {
            return;
        }
        let num_channels = buffer.channels();

        for frame in 0..buffer.len() {
            let peak = (0..num_channels)
                .map(|ch| buffer.samples[ch][frame].abs())
                .fold(0.0_f32, f32::max);

            let input_db = linear_to_db(peak).max(-96.0);
            let target = db_to_linear(self.compute_gain_reduction_db(input_db));

            let coeff = if target < self.gain {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain = coeff * self.gain + (1.0 - coeff) * target;

            for ch in 0..num_channels {
                buffer.samples[ch][frame] *= self.gain;
            }
        }
    }

    fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f64;
        self.update_coefficients();
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn effect_type(&self) -> &'static str {
        "compressor"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_param(&mut self, name: &str, value: f32) -> Result<()> {
        let value = finite_param("compressor", name, value)?;
        match name {
            "threshold" => self.params.threshold_db = value,
            "knee" => self.params.knee_db = value,
            "ratio" => self.params.ratio = value,
            "attack" => self.params.attack_secs = value,
            "release" => self.params.release_secs = value,
            _ => return Err(unknown_param("compressor", name, PARAMS)),
        }
        self.params.clamp();
        self.update_coefficients();
        Ok(())
    }

    fn param(&self, name: &str) -> Option<f32> {
        match name {
            "threshold" => Some(self.params.threshold_db),
            "knee" => Some(self.params.knee_db),
            "ratio" => Some(self.params.ratio),
            "attack" => Some(self.params.attack_secs),
            "release" => Some(self.params.release_secs),
            _ => None,
        }
    }

    fn param_names(&self) -> &'static [&'static str] {
        PARAMS
    }
}

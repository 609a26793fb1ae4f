//! Effect trait definition
//!
//! Base trait for the nodes of a track's effects chain.

use crate::engine::AudioBuffer;
use crate::error::{Result, VibelabError};

/// Base trait for all DSP effects
///
/// Effects process audio buffers in-place. Parameters are addressed by the
/// Web Audio names the UI already uses (`frequency`, `gain`, `Q`,
/// `threshold`...), with values clamped to each effect's valid range.
pub trait Effect: Send {
    /// Process audio buffer in-place
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Prepare the effect for processing at a sample rate
    fn prepare(&mut self, sample_rate: u32);

    /// Clear internal state (filter history, envelopes)
    fn reset(&mut self);

    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;

    /// Check if effect is enabled
    fn is_enabled(&self) -> bool;

    /// Enable or disable the effect
    fn set_enabled(&mut self, enabled: bool);

    /// Set a single parameter by name
    ///
    /// Unknown names and non-finite values are rejected with
    /// `InvalidParameter`.
    fn set_param(&mut self, name: &str, value: f32) -> Result<()>;

    /// Read a parameter by name
    fn param(&self, name: &str) -> Option<f32>;

    /// Names accepted by `set_param`
    fn param_names(&self) -> &'static [&'static str];
}

/// Shared guard for `set_param` implementations
pub(crate) fn finite_param(effect: &str, name: &str, value: f32) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(VibelabError::InvalidParameter {
            param: format!("{}.{}", effect, name),
            value: value.to_string(),
            expected: "a finite number".to_string(),
        })
    }
}

pub(crate) fn unknown_param(effect: &str, name: &str, known: &[&str]) -> VibelabError {
    VibelabError::InvalidParameter {
        param: format!("{}.{}", effect, name),
        value: name.to_string(),
        expected: format!("one of {}", known.join(", ")),
    }
}

//! Per-track routing
//!
//! Every track gets a bus: `gain(volume) -> [effects chain] -> master`. The
//! effects chain (low shelf, peaking mid, high shelf, compressor) is only
//! present once it has been installed for that track.

use std::fmt;
use std::str::FromStr;

use crate::dsp::{BiquadFilter, Compressor, Effect, Gain};
use crate::engine::AudioBuffer;
use crate::error::VibelabError;

/// Addressable nodes of an effects chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// Low shelf, 200 Hz
    Low,
    /// Peaking, 1 kHz
    Mid,
    /// High shelf, 5 kHz
    High,
    Compressor,
}

impl EffectKind {
    pub const ALL: [EffectKind; 4] = [
        EffectKind::Low,
        EffectKind::Mid,
        EffectKind::High,
        EffectKind::Compressor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Low => "low",
            EffectKind::Mid => "mid",
            EffectKind::High => "high",
            EffectKind::Compressor => "comp",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectKind {
    type Err = VibelabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(EffectKind::Low),
            "mid" => Ok(EffectKind::Mid),
            "high" => Ok(EffectKind::High),
            "comp" | "compressor" => Ok(EffectKind::Compressor),
            other => Err(VibelabError::InvalidParameter {
                param: "effect".to_string(),
                value: other.to_string(),
                expected: "low, mid, high or comp".to_string(),
            }),
        }
    }
}

/// Three-band EQ followed by a compressor
#[derive(Debug, Clone)]
pub struct EffectsChain {
    low: BiquadFilter,
    mid: BiquadFilter,
    high: BiquadFilter,
    compressor: Compressor,
}

impl EffectsChain {
    pub fn new(sample_rate: u32) -> Self {
        let mut chain = Self {
            low: BiquadFilter::low_shelf(),
            mid: BiquadFilter::mid_peak(),
            high: BiquadFilter::high_shelf(),
            compressor: Compressor::new(),
        };
        for kind in EffectKind::ALL {
            chain.node_mut(kind).prepare(sample_rate);
        }
        chain
    }

    pub fn node(&self, kind: EffectKind) -> &dyn Effect {
        match kind {
            EffectKind::Low => &self.low,
            EffectKind::Mid => &self.mid,
            EffectKind::High => &self.high,
            EffectKind::Compressor => &self.compressor,
        }
    }

    pub fn node_mut(&mut self, kind: EffectKind) -> &mut dyn Effect {
        match kind {
            EffectKind::Low => &mut self.low,
            EffectKind::Mid => &mut self.mid,
            EffectKind::High => &mut self.high,
            EffectKind::Compressor => &mut self.compressor,
        }
    }

    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        self.low.process(buffer);
        self.mid.process(buffer);
        self.high.process(buffer);
        self.compressor.process(buffer);
    }

    pub fn reset(&mut self) {
        for kind in EffectKind::ALL {
            self.node_mut(kind).reset();
        }
    }
}

/// A track's signal path inside the render graph
#[derive(Debug, Clone)]
pub struct TrackBus {
    gain: Gain,
    effects: Option<EffectsChain>,
}

impl TrackBus {
    pub fn new(volume: f32) -> Self {
        Self {
            gain: Gain::new(volume),
            effects: None,
        }
    }

    pub fn volume(&self) -> f32 {
        self.gain.gain()
    }

    /// Set the fader; clamped to 0..=1
    pub fn set_volume(&mut self, volume: f32) {
        self.gain.set_gain(volume);
    }

    /// Install the effects chain; a second call keeps the existing one
    pub fn install_effects(&mut self, sample_rate: u32) -> bool {
        if self.effects.is_some() {
            return false;
        }
        self.effects = Some(EffectsChain::new(sample_rate));
        true
    }

    pub fn effects(&self) -> Option<&EffectsChain> {
        self.effects.as_ref()
    }

    pub fn effects_mut(&mut self) -> Option<&mut EffectsChain> {
        self.effects.as_mut()
    }

    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        self.gain.process(buffer);
        if let Some(chain) = &mut self.effects {
            chain.process(buffer);
        }
    }
}

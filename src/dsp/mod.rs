//! DSP building blocks
//!
//! The processors a track bus is made of: a gain stage, three biquad EQ
//! bands and a compressor. All implement [`Effect`].

mod compressor;
mod effect;
mod eq;
mod gain;

pub use compressor::{Compressor, CompressorParams};
pub use effect::Effect;
pub use eq::{BiquadFilter, FilterType};
pub use gain::Gain;

//! Audio Engine Module
//!
//! Core audio processing engine including:
//! - Audio buffer management and WAV I/O
//! - The hardware context and its render graph
//! - Per-track routing and effects
//! - Playback scheduling and the playhead clock

pub mod buffer;
pub mod clock;
pub mod context;
#[cfg(feature = "device")]
pub mod device;
pub mod io;
pub mod playback;
pub mod routing;

pub use buffer::{db_to_linear, linear_to_db, peak_level, AudioBuffer, ChannelLayout};
pub use clock::{Anchor, PeriodicTask, PlayheadClock, PlayheadHandle};
pub use context::{
    AudioContext, ContextState, ManualDriver, OutputDriver, RenderGraph, SharedGraph, SourceId,
};
#[cfg(feature = "device")]
pub use device::{CpalCapture, CpalOutput};
pub use io::{
    encode_wav, generate_test_tone, read_wav, write_wav, Decoder, ExportFormat, WavDecoder,
};
pub use playback::{AudioEngine, ScheduleReport};
pub use routing::{EffectKind, EffectsChain, TrackBus};

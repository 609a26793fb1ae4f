//! Studio controller
//!
//! Glue between the timeline store, the audio engine and the recorder,
//! driven by typed commands and reporting through an event bus.

pub mod controller;
pub mod events;

pub use controller::{Studio, DEFAULT_BEAT_TRACK, DEFAULT_VOCAL_TRACK};
pub use events::{command_channel, EventBus, StudioCommand, StudioEvent, CHANNEL_CAPACITY};

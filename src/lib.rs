//! Vibelab - timeline engine for a multi-track vocal recording studio
//!
//! The crate provides the parts of a studio that sit below the UI:
//! 1. A timeline store - tracks, regions, and pure edit transitions
//! 2. An audio engine - a hardware context, per-track routing and playback scheduling
//! 3. A recording pipeline - capture, decode, and hand back a region
//!
//! # Architecture
//!
//! The [`studio::Studio`] controller owns one of each and keeps them in step:
//! - Play requests select regions from the current timeline state and schedule them
//! - The playhead clock republishes engine time while playing
//! - Finished takes are added to the timeline as regions
//!
//! Real audio hardware is available behind the `device` feature.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod recording;
pub mod studio;
pub mod timeline;

pub use config::EngineConfig;
pub use engine::{AudioBuffer, AudioContext, AudioEngine, ScheduleReport};
pub use error::{Result, VibelabError};
pub use recording::Recorder;
pub use studio::{Studio, StudioCommand, StudioEvent};
pub use timeline::{Action, Region, TimelineState, TimelineStore, Track, TrackKind};

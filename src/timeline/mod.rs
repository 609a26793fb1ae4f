//! Timeline data store
//!
//! Tracks, regions and the pure transitions between timeline states:
//! - Data model and invariants helpers
//! - The closed action set and its reducer
//! - The authoritative store with pluggable id generation
//! - Playback region selection and drag gestures

pub mod action;
pub mod gesture;
pub mod model;
pub mod reducer;
pub mod selection;
pub mod store;

pub use action::Action;
pub use gesture::{seconds_at, RegionDrag};
pub use model::{Region, TimelineState, Track, TrackKind, DEFAULT_BPM, MIN_REGION_DURATION_SECS};
pub use reducer::reduce;
pub use selection::{is_audible, select_regions, DEFAULT_HORIZON_SECS};
pub use store::{IdGenerator, SequentialIds, TimelineStore, UuidIds};

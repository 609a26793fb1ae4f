//! Timeline data model
//!
//! Tracks own their regions. Decoded audio is shared behind `Arc`, so the
//! regions produced by split, duplicate and paste point at the same samples.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::AudioBuffer;

/// Shortest region a gesture may produce, in seconds
pub const MIN_REGION_DURATION_SECS: f64 = 0.05;

/// Default project tempo
pub const DEFAULT_BPM: f64 = 140.0;

/// What a track holds; decides where imports land
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Beat,
    #[default]
    Vocal,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Beat => write!(f, "beat"),
            TrackKind::Vocal => write!(f, "vocal"),
        }
    }
}

/// A placed slice of decoded audio on a track
#[derive(Clone)]
pub struct Region {
    pub id: String,
    /// Owning track
    pub track_id: String,
    pub start_sec: f64,
    pub duration_sec: f64,
    /// Absent while a decode is still pending
    pub audio: Option<Arc<AudioBuffer>>,
    /// Offset into `audio` where playback begins
    pub buffer_offset: f64,
    /// Source file for imported material
    pub file_name: Option<String>,
}

impl Region {
    pub fn new(
        id: impl Into<String>,
        track_id: impl Into<String>,
        start_sec: f64,
        duration_sec: f64,
    ) -> Self {
        Self {
            id: id.into(),
            track_id: track_id.into(),
            start_sec,
            duration_sec,
            audio: None,
            buffer_offset: 0.0,
            file_name: None,
        }
    }

    pub fn with_audio(mut self, audio: Arc<AudioBuffer>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_offset(mut self, buffer_offset: f64) -> Self {
        self.buffer_offset = buffer_offset;
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn end_sec(&self) -> f64 {
        self.start_sec + self.duration_sec
    }

    /// Whether `at_sec` lies strictly inside the region
    pub fn contains(&self, at_sec: f64) -> bool {
        let offset = at_sec - self.start_sec;
        offset > 0.0 && offset < self.duration_sec
    }

    /// Whether the played slice stays within the decoded buffer
    ///
    /// Always true when no audio is attached yet.
    pub fn fits_buffer(&self) -> bool {
        match &self.audio {
            Some(audio) => self.buffer_offset + self.duration_sec <= audio.duration_secs() + 1e-9,
            None => true,
        }
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        let same_audio = match (&self.audio, &other.audio) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.id == other.id
            && self.track_id == other.track_id
            && self.start_sec == other.start_sec
            && self.duration_sec == other.duration_sec
            && self.buffer_offset == other.buffer_offset
            && self.file_name == other.file_name
            && same_audio
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("id", &self.id)
            .field("track_id", &self.track_id)
            .field("start_sec", &self.start_sec)
            .field("duration_sec", &self.duration_sec)
            .field("buffer_offset", &self.buffer_offset)
            .field("audio_secs", &self.audio.as_ref().map(|a| a.duration_secs()))
            .field("file_name", &self.file_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub kind: TrackKind,
    /// Linear fader, 0-1
    pub volume: f32,
    pub muted: bool,
    pub solo: bool,
    pub regions: Vec<Region>,
}

impl Track {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            volume: 1.0,
            muted: false,
            solo: false,
            regions: Vec::new(),
        }
    }

    pub fn region(&self, region_id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == region_id)
    }
}

/// The whole editable project
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineState {
    pub tracks: Vec<Track>,
    pub playhead_sec: f64,
    pub is_playing: bool,
    pub bpm: f64,
    /// Single-slot copy buffer
    pub clipboard: Option<Region>,
}

impl Default for TimelineState {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            playhead_sec: 0.0,
            is_playing: false,
            bpm: DEFAULT_BPM,
            clipboard: None,
        }
    }
}

impl TimelineState {
    pub fn track(&self, track_id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == track_id)
    }

    pub fn has_track(&self, track_id: &str) -> bool {
        self.track(track_id).is_some()
    }

    pub fn region(&self, region_id: &str) -> Option<&Region> {
        self.tracks.iter().find_map(|t| t.region(region_id))
    }

    pub fn has_region(&self, region_id: &str) -> bool {
        self.region(region_id).is_some()
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.tracks.iter().flat_map(|t| t.regions.iter())
    }

    pub fn first_track_of(&self, kind: TrackKind) -> Option<&Track> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    /// Latest region end across all tracks
    pub fn duration_secs(&self) -> f64 {
        self.regions().map(Region::end_sec).fold(0.0, f64::max)
    }
}

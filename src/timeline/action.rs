//! Timeline edit actions

use super::model::{Region, Track};

/// Every edit the timeline store accepts
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Ignored when a track with the same id exists
    AddTrack(Track),
    ReorderTrack {
        from: usize,
        to: usize,
    },
    /// Dropped when `region.track_id` names no track
    AddRegion(Region),
    MoveRegion {
        region_id: String,
        track_id: String,
        start_sec: f64,
    },
    SplitRegion {
        region_id: String,
        at_sec: f64,
    },
    /// Callers clamp; the store applies values as given
    TrimRegion {
        region_id: String,
        new_start: Option<f64>,
        new_duration: Option<f64>,
    },
    DeleteRegion {
        region_id: String,
    },
    DeleteTrack {
        track_id: String,
    },
    DuplicateRegion {
        region_id: String,
        new_id: String,
        offset_sec: f64,
    },
    CopyRegion {
        region_id: String,
    },
    PasteRegion {
        track_id: String,
        start_sec: f64,
    },
    SetPlayhead {
        sec: f64,
    },
    SetPlaying {
        playing: bool,
    },
    SetTrackVolume {
        track_id: String,
        volume: f32,
    },
    ToggleMute {
        track_id: String,
    },
    ToggleSolo {
        track_id: String,
    },
    SetBpm {
        bpm: f64,
    },
}

impl Action {
    /// Name used in log events
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddTrack(_) => "add_track",
            Action::ReorderTrack { .. } => "reorder_track",
            Action::AddRegion(_) => "add_region",
            Action::MoveRegion { .. } => "move_region",
            Action::SplitRegion { .. } => "split_region",
            Action::TrimRegion { .. } => "trim_region",
            Action::DeleteRegion { .. } => "delete_region",
            Action::DeleteTrack { .. } => "delete_track",
            Action::DuplicateRegion { .. } => "duplicate_region",
            Action::CopyRegion { .. } => "copy_region",
            Action::PasteRegion { .. } => "paste_region",
            Action::SetPlayhead { .. } => "set_playhead",
            Action::SetPlaying { .. } => "set_playing",
            Action::SetTrackVolume { .. } => "set_track_volume",
            Action::ToggleMute { .. } => "toggle_track_mute",
            Action::ToggleSolo { .. } => "toggle_track_solo",
            Action::SetBpm { .. } => "set_bpm",
        }
    }

    pub fn split(region_id: impl Into<String>, at_sec: f64) -> Self {
        Action::SplitRegion {
            region_id: region_id.into(),
            at_sec,
        }
    }

    pub fn move_region(region_id: impl Into<String>, track_id: impl Into<String>, start_sec: f64) -> Self {
        Action::MoveRegion {
            region_id: region_id.into(),
            track_id: track_id.into(),
            start_sec,
        }
    }

    pub fn trim(region_id: impl Into<String>, new_start: Option<f64>, new_duration: Option<f64>) -> Self {
        Action::TrimRegion {
            region_id: region_id.into(),
            new_start,
            new_duration,
        }
    }

    pub fn copy(region_id: impl Into<String>) -> Self {
        Action::CopyRegion {
            region_id: region_id.into(),
        }
    }

    pub fn paste(track_id: impl Into<String>, start_sec: f64) -> Self {
        Action::PasteRegion {
            track_id: track_id.into(),
            start_sec,
        }
    }
}

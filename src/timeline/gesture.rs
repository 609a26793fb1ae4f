//! Pointer-drag gestures
//!
//! Turns pointer positions into timeline actions. The store applies trims
//! unclamped, so the non-negative start, the minimum duration and the end of
//! the source audio are enforced here.

use super::action::Action;
use super::model::{Region, MIN_REGION_DURATION_SECS};

/// Timeline position under a pixel offset (ruler clicks); never negative
pub fn seconds_at(x_px: f64, pixels_per_second: f64) -> f64 {
    (x_px / pixels_per_second).max(0.0)
}

/// A drag in progress, captured at pointer-down
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDrag {
    region_id: String,
    track_id: String,
    origin_x: f64,
    orig_start: f64,
    orig_duration: f64,
    /// Audio left after `buffer_offset`; unbounded without audio
    available: f64,
    pixels_per_second: f64,
    min_duration: f64,
}

impl RegionDrag {
    pub fn begin(region: &Region, x_px: f64, pixels_per_second: f64) -> Self {
        tracing::debug!(region_id = %region.id, start_sec = region.start_sec, "drag start");
        Self {
            region_id: region.id.clone(),
            track_id: region.track_id.clone(),
            origin_x: x_px,
            orig_start: region.start_sec,
            orig_duration: region.duration_sec,
            available: region
                .audio
                .as_ref()
                .map_or(f64::INFINITY, |audio| (audio.duration_secs() - region.buffer_offset).max(0.0)),
            pixels_per_second,
            min_duration: MIN_REGION_DURATION_SECS,
        }
    }

    pub fn with_min_duration(mut self, min_duration: f64) -> Self {
        self.min_duration = min_duration;
        self
    }

    fn delta_secs(&self, x_px: f64) -> f64 {
        (x_px - self.origin_x) / self.pixels_per_second
    }

    /// Move on the same track
    pub fn move_to(&self, x_px: f64) -> Action {
        self.move_to_track(x_px, self.track_id.clone())
    }

    /// Move, dropping onto `track_id`
    pub fn move_to_track(&self, x_px: f64, track_id: impl Into<String>) -> Action {
        let start_sec = (self.orig_start + self.delta_secs(x_px)).max(0.0);
        Action::move_region(self.region_id.clone(), track_id, start_sec)
    }

    /// Drag the left edge; the right edge stays put
    ///
    /// The offset into the audio is kept, so the edge cannot move further
    /// left than the audio is long.
    pub fn trim_left_to(&self, x_px: f64) -> Action {
        let end = self.orig_start + self.orig_duration;
        let latest_start = (end - self.min_duration).max(0.0);
        let earliest_start = (end - self.available).max(0.0);
        // audio bound wins over the minimum duration
        let new_start = (self.orig_start + self.delta_secs(x_px))
            .min(latest_start)
            .max(earliest_start);
        let new_duration = (end - new_start).max(self.min_duration).min(self.available);
        Action::trim(self.region_id.clone(), Some(new_start), Some(new_duration))
    }

    /// Drag the right edge, up to the end of the audio
    pub fn trim_right_to(&self, x_px: f64) -> Action {
        let new_duration = (self.orig_duration + self.delta_secs(x_px))
            .max(self.min_duration)
            .min(self.available);
        Action::trim(self.region_id.clone(), None, Some(new_duration))
    }
}

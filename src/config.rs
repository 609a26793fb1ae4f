//! Engine configuration
//!
//! Every field has a default so a partial JSON file (or none at all) is
//! enough to run the engine.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VibelabError};

/// Runtime configuration for the engine, clock and recording pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output/context sample rate in Hz
    pub sample_rate: u32,
    /// Output channel count (1 or 2)
    pub channels: u16,
    /// Frames rendered per pull when bouncing offline
    pub block_frames: usize,
    /// Playhead clock tick interval (one display frame)
    pub frame_interval_ms: u64,
    /// Forward bound used by the region selection policy
    pub horizon_secs: f64,
    /// Minimum region duration enforced by drag gestures
    pub min_region_secs: f64,
    /// Timeline zoom used to convert pointer deltas into seconds
    pub pixels_per_second: f64,
    /// Auto-stop for timed takes
    pub auto_stop_secs: f64,
    /// Master output gain (linear, 0-1)
    pub master_volume: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            block_frames: 512,
            frame_interval_ms: 16,
            horizon_secs: 3600.0,
            min_region_secs: 0.05,
            pixels_per_second: 80.0,
            auto_stop_secs: 5.0,
            master_volume: 1.0,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file, filling missing fields with defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), ?config, "loaded engine config");
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(8000..=192_000).contains(&self.sample_rate) {
            return Err(VibelabError::InvalidConfig {
                reason: format!("sample_rate {} outside 8000-192000 Hz", self.sample_rate),
            });
        }
        if !(1..=2).contains(&self.channels) {
            return Err(VibelabError::InvalidConfig {
                reason: format!("channels must be 1 or 2, got {}", self.channels),
            });
        }
        if self.block_frames == 0 || self.frame_interval_ms == 0 {
            return Err(VibelabError::InvalidConfig {
                reason: "block_frames and frame_interval_ms must be non-zero".to_string(),
            });
        }
        if !(self.horizon_secs > 0.0) || !(self.pixels_per_second > 0.0) {
            return Err(VibelabError::InvalidConfig {
                reason: "horizon_secs and pixels_per_second must be positive".to_string(),
            });
        }
        if !(self.min_region_secs > 0.0) || !(self.auto_stop_secs > 0.0) {
            return Err(VibelabError::InvalidConfig {
                reason: "min_region_secs and auto_stop_secs must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.master_volume) {
            return Err(VibelabError::InvalidConfig {
                reason: format!("master_volume {} outside 0-1", self.master_volume),
            });
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn auto_stop(&self) -> Duration {
        Duration::from_secs_f64(self.auto_stop_secs)
    }
}

//! Project snapshots
//!
//! Timeline metadata saved as JSON. Samples are not stored; regions keep the
//! file name of their source audio and `restore` asks a loader for it.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::AudioBuffer;
use crate::error::{Result, VibelabError};
use crate::timeline::{Action, Region, TimelineState, TimelineStore, Track, TrackKind, UuidIds, DEFAULT_BPM};

/// Snapshot format version
pub const SNAPSHOT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub id: String,
    pub start_sec: f64,
    pub duration_sec: f64,
    #[serde(default)]
    pub buffer_offset: f64,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    #[serde(default = "unity")]
    pub volume: f32,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
    #[serde(default)]
    pub regions: Vec<RegionSnapshot>,
}

fn unity() -> f32 {
    1.0
}

fn default_bpm() -> f64 {
    DEFAULT_BPM
}

fn default_version() -> String {
    SNAPSHOT_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    #[serde(default = "default_version")]
    pub version: String,
    pub name: String,
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    #[serde(default)]
    pub playhead_sec: f64,
    #[serde(default)]
    pub lyrics: Option<String>,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub tracks: Vec<TrackSnapshot>,
}

impl ProjectSnapshot {
    pub fn from_state(name: &str, state: &TimelineState) -> Self {
        let tracks = state
            .tracks
            .iter()
            .map(|track| TrackSnapshot {
                id: track.id.clone(),
                name: track.name.clone(),
                kind: track.kind,
                volume: track.volume,
                muted: track.muted,
                solo: track.solo,
                regions: track
                    .regions
                    .iter()
                    .map(|r| RegionSnapshot {
                        id: r.id.clone(),
                        start_sec: r.start_sec,
                        duration_sec: r.duration_sec,
                        buffer_offset: r.buffer_offset,
                        file_name: r.file_name.clone(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            version: SNAPSHOT_VERSION.to_string(),
            name: name.to_string(),
            bpm: state.bpm,
            playhead_sec: state.playhead_sec,
            lyrics: None,
            saved_at: Utc::now(),
            tracks,
        }
    }

    pub fn region_count(&self) -> usize {
        self.tracks.iter().map(|t| t.regions.len()).sum()
    }

    /// Rebuild a timeline, loading each referenced file once
    ///
    /// Entries are replayed through the timeline reducer, so duplicate ids
    /// are dropped. A file the loader cannot provide leaves its regions
    /// without audio; they are kept but never scheduled.
    pub fn restore<F>(&self, mut loader: F) -> Result<TimelineState>
    where
        F: FnMut(&str) -> Result<AudioBuffer>,
    {
        let mut store = TimelineStore::from_state(TimelineState::default(), Box::new(UuidIds));
        let mut cache: HashMap<String, Option<Arc<AudioBuffer>>> = HashMap::new();

        for track in &self.tracks {
            let mut restored = Track::new(track.id.clone(), track.name.clone(), track.kind);
            restored.volume = track.volume;
            restored.muted = track.muted;
            restored.solo = track.solo;
            store.dispatch(Action::AddTrack(restored));

            for snap in &track.regions {
                let mut region = Region::new(snap.id.clone(), track.id.clone(), snap.start_sec, snap.duration_sec)
                    .with_offset(snap.buffer_offset);
                if let Some(file) = &snap.file_name {
                    let audio = cache
                        .entry(file.clone())
                        .or_insert_with(|| match loader(file) {
                            Ok(buffer) => Some(Arc::new(buffer)),
                            Err(e) => {
                                tracing::warn!(file = %file, error = %e, "region audio unavailable");
                                None
                            }
                        })
                        .clone();
                    region = region.with_file_name(file.clone());
                    if let Some(audio) = audio {
                        region = region.with_audio(audio);
                    }
                }
                store.dispatch(Action::AddRegion(region));
            }
        }

        store.dispatch_all([
            Action::SetBpm { bpm: self.bpm },
            Action::SetPlayhead { sec: self.playhead_sec },
        ]);
        tracing::info!(
            name = %self.name,
            tracks = store.state().tracks.len(),
            regions = store.state().regions().count(),
            "snapshot restored"
        );
        Ok(store.state().clone())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), "snapshot saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let snapshot: ProjectSnapshot = serde_json::from_str(&content)?;
        let major = snapshot.version.split('.').next().unwrap_or_default();
        if major != "1" {
            return Err(VibelabError::UnsupportedFormat {
                format: format!("snapshot version {}", snapshot.version),
            });
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::generate_test_tone;
    use pretty_assertions::assert_eq;

    fn state_with_regions() -> TimelineState {
        let mut store = TimelineStore::new();
        let tone = Arc::new(generate_test_tone(220.0, 4.0, 48000));
        store.dispatch_all([
            Action::AddTrack(Track::new("t_beat", "Beat", TrackKind::Beat)),
            Action::AddTrack(Track::new("t_v1", "Vocal 1", TrackKind::Vocal)),
            Action::AddRegion(
                Region::new("beat", "t_beat", 0.0, 4.0)
                    .with_audio(Arc::clone(&tone))
                    .with_file_name("beat.wav"),
            ),
            Action::AddRegion(Region::new("take", "t_v1", 1.0, 2.0).with_file_name("take.wav")),
            Action::SetBpm { bpm: 92.0 },
        ]);
        store.state().clone()
    }

    #[test]
    fn test_save_load_keeps_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.json");
        let snapshot = ProjectSnapshot::from_state("Song", &state_with_regions());
        snapshot.save(&path).unwrap();

        let loaded = ProjectSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.region_count(), 2);
    }

    #[test]
    fn test_restore_loads_each_file_once() {
        let snapshot = ProjectSnapshot::from_state("Song", &state_with_regions());
        let mut calls = Vec::new();
        let state = snapshot
            .restore(|file| {
                calls.push(file.to_string());
                if file == "beat.wav" {
                    Ok(generate_test_tone(220.0, 4.0, 48000))
                } else {
                    Err(VibelabError::EmptyAudio)
                }
            })
            .unwrap();

        assert_eq!(calls, vec!["beat.wav", "take.wav"]);
        assert_eq!(state.bpm, 92.0);
        assert!(state.region("beat").and_then(|r| r.audio.as_ref()).is_some());
        let take = state.region("take").unwrap();
        assert!(take.audio.is_none());
        assert_eq!(take.file_name.as_deref(), Some("take.wav"));
    }

    #[test]
    fn test_unknown_major_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.json");
        fs::write(
            &path,
            r#"{"version":"2.0.0","name":"x","saved_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(matches!(
            ProjectSnapshot::load(&path),
            Err(VibelabError::UnsupportedFormat { .. })
        ));
    }
}

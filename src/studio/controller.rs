//! Studio controller
//!
//! Owns the timeline store, the audio engine and the recorder, and keeps
//! them in step: every play request re-selects regions from the current
//! state and reschedules from the stored playhead.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use super::events::{command_channel, EventBus, StudioCommand, StudioEvent};
use crate::config::EngineConfig;
use crate::engine::{AudioEngine, ScheduleReport};
use crate::error::{Result, VibelabError};
use crate::recording::{CaptureDevice, Recorder};
use crate::timeline::{
    seconds_at, select_regions, Action, IdGenerator, Region, RegionDrag, TimelineState,
    TimelineStore, Track, TrackKind,
};

pub const DEFAULT_BEAT_TRACK: &str = "t_beat";
pub const DEFAULT_VOCAL_TRACK: &str = "t_v1";

pub struct Studio {
    config: EngineConfig,
    store: TimelineStore,
    engine: AudioEngine,
    recorder: Recorder,
    commands_tx: Sender<StudioCommand>,
    commands_rx: Receiver<StudioCommand>,
    events: EventBus,
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("store", &self.store)
            .field("engine", &self.engine)
            .field("recorder", &self.recorder)
            .field("subscribers", &self.events.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl Studio {
    pub fn new(config: EngineConfig, engine: AudioEngine, store: TimelineStore) -> Self {
        let (commands_tx, commands_rx) = command_channel();
        Self {
            config,
            store,
            engine,
            recorder: Recorder::new(),
            commands_tx,
            commands_rx,
            events: EventBus::new(),
        }
    }

    /// Studio over an offline engine
    pub fn offline(config: EngineConfig) -> Self {
        let engine = AudioEngine::offline(&config);
        Self::new(config, engine, TimelineStore::new())
    }

    pub fn with_ids(mut self, ids: Box<dyn IdGenerator>) -> Self {
        self.store = TimelineStore::from_state(self.store.state().clone(), ids);
        self
    }

    /// Add the Beat and "Vocal 1" tracks to an empty timeline
    pub fn with_default_tracks(mut self) -> Self {
        if self.store.state().tracks.is_empty() {
            self.store.dispatch_all([
                Action::AddTrack(Track::new(DEFAULT_BEAT_TRACK, "Beat", TrackKind::Beat)),
                Action::AddTrack(Track::new(DEFAULT_VOCAL_TRACK, "Vocal 1", TrackKind::Vocal)),
            ]);
        }
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &TimelineState {
        self.store.state()
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AudioEngine {
        &mut self.engine
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Sender for widgets; commands apply on the next `process_commands`
    pub fn command_sender(&self) -> Sender<StudioCommand> {
        self.commands_tx.clone()
    }

    pub fn subscribe(&mut self) -> Receiver<StudioEvent> {
        self.events.subscribe()
    }

    pub fn dispatch(&mut self, action: Action) -> &TimelineState {
        self.store.dispatch(action)
    }

    /// Clock position while playing, stored playhead otherwise
    pub fn playhead_sec(&self) -> f64 {
        if self.engine.is_playing() {
            self.engine.playhead().get()
        } else {
            self.store.state().playhead_sec
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Schedule every eligible region from the stored playhead
    pub fn play(&mut self) -> ScheduleReport {
        let state = self.store.state();
        let cursor = state.playhead_sec;
        let regions = select_regions(&state.tracks, cursor, self.config.horizon_secs);
        for track in &state.tracks {
            self.engine.set_track_volume(&track.id, track.volume);
        }
        tracing::debug!(action = "play_pressed", cursor, regions_found = regions.len());

        let report = self.engine.schedule_playback(&regions, cursor, cursor);
        self.store.dispatch(Action::SetPlaying { playing: true });
        tracing::info!(
            cursor,
            scheduled = report.scheduled,
            skipped = report.skipped,
            failed = report.failed,
            "play started"
        );
        self.events.emit(StudioEvent::PlaybackStarted {
            cursor_sec: cursor,
            scheduled: report.scheduled,
        });
        report
    }

    /// Stop and move the stored playhead to where playback stopped
    pub fn pause(&mut self) -> f64 {
        if !self.engine.is_playing() {
            return self.store.state().playhead_sec;
        }
        let at = self.engine.pause();
        self.store.dispatch_all([
            Action::SetPlayhead { sec: at },
            Action::SetPlaying { playing: false },
        ]);
        self.events.emit(StudioEvent::PlaybackStopped { at_sec: at });
        at
    }

    /// Stop without moving the stored playhead
    pub fn stop(&mut self) {
        self.engine.stop_all_scheduled();
        self.engine.clear_resume_point();
        self.store.dispatch(Action::SetPlaying { playing: false });
        tracing::debug!(action = "stop_clicked");
        self.events.emit(StudioEvent::PlaybackStopped {
            at_sec: self.store.state().playhead_sec,
        });
    }

    pub fn rewind(&mut self) {
        self.seek(0.0);
    }

    /// Move the playhead; playback restarts from there if it was running
    pub fn seek(&mut self, sec: f64) {
        self.store.dispatch(Action::SetPlayhead { sec });
        tracing::debug!(action = "seek", sec = self.store.state().playhead_sec);
        if self.engine.is_playing() {
            self.play();
        }
    }

    // ========================================================================
    // Import and recording
    // ========================================================================

    /// Decode a beat file and place it at 0 on the beat track
    pub fn import_beat(&mut self, bytes: &[u8], file_name: &str) -> Result<Region> {
        let decoded = match self.engine.context().decode(bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(action = "import_error", file_name, error = %e);
                self.events.emit(StudioEvent::Error {
                    message: e.friendly_message(),
                });
                return Err(e);
            }
        };

        let existing = self
            .store
            .state()
            .first_track_of(TrackKind::Beat)
            .map(|track| track.id.clone());
        let track_id = match existing {
            Some(id) => id,
            None => {
                let id = if self.store.state().has_track(DEFAULT_BEAT_TRACK) {
                    format!("{}_{}", DEFAULT_BEAT_TRACK, self.store.next_id())
                } else {
                    DEFAULT_BEAT_TRACK.to_string()
                };
                self.store
                    .dispatch(Action::AddTrack(Track::new(id.clone(), "Beat", TrackKind::Beat)));
                id
            }
        };

        let region = Region::new(self.store.next_id(), track_id, 0.0, decoded.duration_secs())
            .with_audio(Arc::new(decoded))
            .with_file_name(file_name);
        self.store.dispatch(Action::AddRegion(region.clone()));
        tracing::info!(
            action = "import_beat",
            track_id = %region.track_id,
            region_id = %region.id,
            file_name,
            duration = region.duration_sec,
        );
        Ok(region)
    }

    /// Start a take on `track_id` at the current project position
    pub fn start_recording(&mut self, device: &mut dyn CaptureDevice, track_id: &str) -> Result<()> {
        if !self.store.state().has_track(track_id) {
            return Err(VibelabError::InvalidParameter {
                param: "track_id".to_string(),
                value: track_id.to_string(),
                expected: "an existing track".to_string(),
            });
        }
        let start_sec = if self.engine.is_playing() {
            self.engine.playback_time()
        } else {
            self.store.state().playhead_sec
        };

        if let Err(e) = self.recorder.start(device, track_id, start_sec) {
            self.events.emit(StudioEvent::Error {
                message: e.friendly_message(),
            });
            return Err(e);
        }
        Ok(())
    }

    /// Finalize the take and add its region to the timeline
    pub fn finish_recording(&mut self) -> Result<Region> {
        let result = self.recorder.stop(self.engine.context(), self.store.ids());
        match result {
            Ok(region) => {
                self.store.dispatch(Action::AddRegion(region.clone()));
                tracing::debug!(
                    action = "region_added",
                    region_id = %region.id,
                    track_id = %region.track_id,
                    duration = region.duration_sec,
                );
                self.events.emit(StudioEvent::RegionRecorded {
                    region: region.clone(),
                });
                Ok(region)
            }
            Err(e) => {
                self.events.emit(StudioEvent::Error {
                    message: e.friendly_message(),
                });
                Err(e)
            }
        }
    }

    /// Record until `duration` of audio has arrived or `duration` has elapsed
    pub fn record_for(
        &mut self,
        device: &mut dyn CaptureDevice,
        track_id: &str,
        duration: Duration,
    ) -> Result<Region> {
        self.start_recording(device, track_id)?;

        let deadline = Instant::now() + duration;
        let wanted = duration.as_secs_f64();
        loop {
            if self.recorder.captured_secs() >= wanted {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(self.config.frame_interval().min(deadline - now));
        }
        tracing::debug!(action = "auto_stop", track_id);
        self.finish_recording()
    }

    /// Timed take using the configured auto-stop
    pub fn record_take(&mut self, device: &mut dyn CaptureDevice, track_id: &str) -> Result<Region> {
        let duration = self.config.auto_stop();
        self.record_for(device, track_id, duration)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Pointer-down on a region at `x_px`, at the configured zoom
    pub fn begin_drag(&self, region_id: &str, x_px: f64) -> Option<RegionDrag> {
        let region = self.store.state().region(region_id)?;
        Some(
            RegionDrag::begin(region, x_px, self.config.pixels_per_second)
                .with_min_duration(self.config.min_region_secs),
        )
    }

    /// Ruler click
    pub fn seek_to_pixel(&mut self, x_px: f64) {
        self.seek(seconds_at(x_px, self.config.pixels_per_second));
    }

    /// Split a region at the current playhead; true if the split happened
    pub fn split_at_playhead(&mut self, region_id: &str) -> bool {
        let at_sec = self.playhead_sec();
        self.split(region_id, at_sec)
    }

    fn split(&mut self, region_id: &str, at_sec: f64) -> bool {
        tracing::debug!(action = "split_request", region_id, at_sec);
        self.events.emit(StudioEvent::SplitRequested {
            region_id: region_id.to_string(),
            at_sec,
        });
        self.store.dispatch(Action::split(region_id, at_sec));
        !self.store.state().has_region(region_id)
    }

    /// Apply every queued command; returns how many were handled
    pub fn process_commands(&mut self) -> usize {
        let pending: Vec<StudioCommand> = self.commands_rx.try_iter().collect();
        let count = pending.len();
        for command in pending {
            self.apply(command);
        }
        count
    }

    pub fn apply(&mut self, command: StudioCommand) {
        match command {
            StudioCommand::ToggleMute { track_id } => {
                self.store.dispatch(Action::ToggleMute {
                    track_id: track_id.clone(),
                });
                if let Some(track) = self.store.state().track(&track_id) {
                    let muted = track.muted;
                    self.events.emit(StudioEvent::MuteToggled { track_id, muted });
                }
            }
            StudioCommand::ToggleSolo { track_id } => {
                self.store.dispatch(Action::ToggleSolo {
                    track_id: track_id.clone(),
                });
                if let Some(track) = self.store.state().track(&track_id) {
                    let solo = track.solo;
                    self.events.emit(StudioEvent::SoloToggled { track_id, solo });
                }
            }
            StudioCommand::SetVolume { track_id, volume } => {
                self.store.dispatch(Action::SetTrackVolume {
                    track_id: track_id.clone(),
                    volume,
                });
                if let Some(track) = self.store.state().track(&track_id) {
                    let volume = track.volume;
                    self.engine.set_track_volume(&track_id, volume);
                    self.events.emit(StudioEvent::VolumeChanged { track_id, volume });
                }
            }
            StudioCommand::ReorderTrack { from, to } => {
                self.store.dispatch(Action::ReorderTrack { from, to });
            }
            StudioCommand::DeleteTrack { track_id } => {
                if !self.store.state().has_track(&track_id) {
                    return;
                }
                self.store.dispatch(Action::DeleteTrack {
                    track_id: track_id.clone(),
                });
                self.engine.remove_track(&track_id);
                self.events.emit(StudioEvent::TrackDeleted { track_id });
            }
            StudioCommand::SplitRequested { region_id, at_sec } => {
                self.split(&region_id, at_sec);
            }
            StudioCommand::SplitAtPlayhead { region_id } => {
                self.split_at_playhead(&region_id);
            }
            StudioCommand::Copy { region_id } => {
                self.store.dispatch(Action::copy(region_id));
                self.events.emit(StudioEvent::ClipboardUpdated {
                    region: self.store.state().clipboard.clone(),
                });
            }
            StudioCommand::Paste { track_id, start_sec } => {
                let at = start_sec.unwrap_or_else(|| self.playhead_sec());
                self.store.dispatch(Action::paste(track_id, at));
            }
        }
    }
}

impl Drop for Studio {
    fn drop(&mut self) {
        self.recorder.cancel();
        self.engine.stop_all_scheduled();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::{encode_wav, generate_test_tone, ExportFormat};
    use crate::timeline::SequentialIds;

    fn studio() -> Studio {
        Studio::offline(EngineConfig::default())
            .with_ids(Box::new(SequentialIds::new("r")))
            .with_default_tracks()
    }

    fn beat_bytes(secs: f32) -> Vec<u8> {
        encode_wav(&generate_test_tone(110.0, secs, 48000), ExportFormat::default()).unwrap()
    }

    #[test]
    fn test_default_tracks() {
        let studio = studio();
        let ids: Vec<_> = studio.state().tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, [DEFAULT_BEAT_TRACK, DEFAULT_VOCAL_TRACK]);
    }

    #[test]
    fn test_import_beat_lands_on_beat_track() {
        let mut studio = studio();
        let region = studio.import_beat(&beat_bytes(1.0), "beat.wav").unwrap();
        assert_eq!(region.track_id, DEFAULT_BEAT_TRACK);
        assert_eq!(region.start_sec, 0.0);
        assert_eq!(region.file_name.as_deref(), Some("beat.wav"));
        assert!(studio.state().has_region(&region.id));
    }

    #[test]
    fn test_import_creates_beat_track_when_missing() {
        let mut studio = Studio::offline(EngineConfig::default());
        let region = studio.import_beat(&beat_bytes(0.5), "beat.wav").unwrap();
        assert_eq!(region.track_id, DEFAULT_BEAT_TRACK);
        assert_eq!(
            studio.state().track(DEFAULT_BEAT_TRACK).map(|t| t.kind),
            Some(TrackKind::Beat)
        );
    }

    #[test]
    fn test_bad_import_emits_error() {
        let mut studio = studio();
        let events = studio.subscribe();
        assert!(studio.import_beat(b"not a wav", "junk.bin").is_err());
        assert!(matches!(events.try_recv(), Ok(StudioEvent::Error { .. })));
    }

    #[test]
    fn test_pause_moves_playhead() {
        let mut studio = studio();
        studio.import_beat(&beat_bytes(2.0), "beat.wav").unwrap();
        studio.play();
        assert!(studio.state().is_playing);

        studio.engine().context().render_secs(0.5);
        let at = studio.pause();
        assert!((at - 0.5).abs() < 0.02);
        assert_eq!(studio.state().playhead_sec, at);
        assert!(!studio.state().is_playing);
    }

    #[test]
    fn test_drag_uses_configured_zoom() {
        let mut studio = studio();
        studio.dispatch(Action::AddRegion(Region::new("r", DEFAULT_VOCAL_TRACK, 1.0, 2.0)));

        // 80 px/s by default
        let drag = studio.begin_drag("r", 100.0).unwrap();
        studio.dispatch(drag.move_to(180.0));
        assert_eq!(studio.state().region("r").map(|r| r.start_sec), Some(2.0));

        let drag = studio.begin_drag("r", 0.0).unwrap();
        studio.dispatch(drag.trim_right_to(-1000.0));
        assert_eq!(
            studio.state().region("r").map(|r| r.duration_sec),
            Some(studio.config().min_region_secs)
        );

        studio.seek_to_pixel(40.0);
        assert_eq!(studio.state().playhead_sec, 0.5);
    }

    #[test]
    fn test_delete_track_removes_bus() {
        let mut studio = studio();
        studio.play();
        assert!(studio.engine().track_volume(DEFAULT_VOCAL_TRACK).is_some());

        studio
            .command_sender()
            .send(StudioCommand::DeleteTrack {
                track_id: DEFAULT_VOCAL_TRACK.into(),
            })
            .unwrap();
        assert_eq!(studio.process_commands(), 1);
        assert!(!studio.state().has_track(DEFAULT_VOCAL_TRACK));
        assert!(studio.engine().track_volume(DEFAULT_VOCAL_TRACK).is_none());
    }
}

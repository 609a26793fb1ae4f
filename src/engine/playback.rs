//! Playback scheduling
//!
//! [`AudioEngine`] turns a selected region set into scheduled sources on the
//! audio context, keeps the anchor pair used to translate hardware time back
//! into project time, and runs the playhead clock while playing.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::clock::{Anchor, PlayheadClock, PlayheadHandle};
use crate::engine::context::{AudioContext, ContextState, SourceId};
use crate::engine::routing::EffectKind;
use crate::timeline::Region;

/// Outcome of one `schedule_playback` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub scheduled: usize,
    /// Regions without decoded audio, or with nothing left to play
    pub skipped: usize,
    /// Regions the context refused
    pub failed: usize,
}

pub struct AudioEngine {
    context: AudioContext,
    clock: PlayheadClock,
    scheduled: Vec<SourceId>,
    anchor: Option<Anchor>,
    paused_at: Option<f64>,
    playing: bool,
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("context", &self.context)
            .field("scheduled", &self.scheduled.len())
            .field("anchor", &self.anchor)
            .field("paused_at", &self.paused_at)
            .field("playing", &self.playing)
            .finish()
    }
}

impl AudioEngine {
    pub fn new(context: AudioContext, config: &EngineConfig) -> Self {
        Self {
            context,
            clock: PlayheadClock::new(config.frame_interval()),
            scheduled: Vec::new(),
            anchor: None,
            paused_at: None,
            playing: false,
        }
    }

    /// Engine over an offline context
    pub fn offline(config: &EngineConfig) -> Self {
        Self::new(AudioContext::offline(config), config)
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut AudioContext {
        &mut self.context
    }

    /// Register the playhead UI callback
    pub fn on_time_update(&mut self, callback: impl Fn(f64) + Send + Sync + 'static) {
        self.clock.on_tick(callback);
    }

    /// Last position published by the playhead clock
    pub fn playhead(&self) -> PlayheadHandle {
        self.clock.handle()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    pub fn is_clock_running(&self) -> bool {
        self.clock.is_running()
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// Create the bus for a track if it does not exist
    pub fn ensure_track(&self, track_id: &str, volume: f32) {
        self.context.with_graph(|g| {
            g.ensure_bus(track_id, volume);
        });
    }

    /// Remove a track's bus and any sources still playing on it
    pub fn remove_track(&self, track_id: &str) -> bool {
        let removed = self.context.with_graph(|g| g.remove_bus(track_id));
        if removed {
            tracing::debug!(track_id, "removed track bus");
        }
        removed
    }

    pub fn set_track_volume(&self, track_id: &str, volume: f32) {
        self.context.with_graph(|g| g.ensure_bus(track_id, 1.0).set_volume(volume));
        tracing::debug!(track_id, volume, "set track volume");
    }

    pub fn track_volume(&self, track_id: &str) -> Option<f32> {
        self.context.with_graph(|g| g.bus(track_id).map(|b| b.volume()))
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.context.with_graph(|g| g.set_master_volume(volume));
    }

    /// Insert EQ and compressor between the track gain and the master bus
    pub fn create_effects_chain(&self, track_id: &str) -> bool {
        let sample_rate = self.context.sample_rate();
        let created = self
            .context
            .with_graph(|g| g.ensure_bus(track_id, 1.0).install_effects(sample_rate));
        tracing::debug!(action = "create_effects_chain", track_id, created);
        created
    }

    /// Set one effect parameter; returns false when nothing was changed
    pub fn set_effect_param(&self, track_id: &str, effect: EffectKind, param: &str, value: f32) -> bool {
        let result = self.context.with_graph(|g| {
            let chain = g.bus_mut(track_id)?.effects_mut()?;
            Some(chain.node_mut(effect).set_param(param, value))
        });
        match result {
            Some(Ok(())) => {
                tracing::debug!(action = "set_effect_param", track_id, %effect, param, value);
                true
            }
            Some(Err(e)) => {
                tracing::debug!(action = "set_effect_param_error", track_id, %effect, param, value, error = %e);
                false
            }
            None => {
                tracing::debug!(action = "set_effect_param_ignored", track_id, %effect, param);
                false
            }
        }
    }

    pub fn effect_param(&self, track_id: &str, effect: EffectKind, param: &str) -> Option<f32> {
        self.context
            .with_graph(|g| g.bus(track_id)?.effects()?.node(effect).param(param))
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Replace the current playback session with `regions`
    ///
    /// Regions are placed relative to `cursor_sec`; the anchor maps the
    /// current context time to `project_offset_sec`. A region already under
    /// the cursor starts immediately, part-way into its audio.
    pub fn schedule_playback(
        &mut self,
        regions: &[Region],
        cursor_sec: f64,
        project_offset_sec: f64,
    ) -> ScheduleReport {
        if self.context.state() == ContextState::Suspended {
            match self.context.resume() {
                Ok(()) => tracing::debug!(action = "resume_audio_context"),
                Err(e) => tracing::warn!(action = "resume_error", error = %e),
            }
        }

        self.stop_all_scheduled();
        let now = self.context.current_time();
        let anchor = Anchor {
            context_time: now,
            project_offset: project_offset_sec,
        };
        self.anchor = Some(anchor);
        self.paused_at = None;
        self.playing = true;

        tracing::info!(
            cursor_sec,
            schedule_at = now,
            regions = regions.len(),
            context_state = %self.context.state(),
            "playback start"
        );

        let mut report = ScheduleReport::default();
        for region in regions {
            self.ensure_track(&region.track_id, 1.0);
            let Some(audio) = &region.audio else {
                report.skipped += 1;
                continue;
            };

            let lead_in = (cursor_sec - region.start_sec).max(0.0);
            let duration = region.duration_sec - lead_in;
            if duration <= 0.0 {
                report.skipped += 1;
                continue;
            }
            let start_at = now + (region.start_sec - cursor_sec).max(0.0);

            match self.context.start_source(
                &region.track_id,
                Arc::clone(audio),
                start_at,
                region.buffer_offset + lead_in,
                duration,
            ) {
                Ok(id) => {
                    self.scheduled.push(id);
                    report.scheduled += 1;
                }
                Err(e) => {
                    tracing::debug!(region_id = %region.id, error = %e, "region not scheduled");
                    report.failed += 1;
                }
            }
        }

        if let Err(e) = self.clock.start(self.context.graph(), anchor) {
            tracing::warn!(error = %e, "playhead clock failed to start");
        }
        report
    }

    /// Stop every source and the clock; clears the anchor
    pub fn stop_all_scheduled(&mut self) {
        self.clock.stop();
        for id in self.scheduled.drain(..) {
            // Sources that already finished are gone from the graph
            let _ = self.context.stop_source(id);
        }
        self.anchor = None;
    }

    /// Stop playback and remember where it stopped
    pub fn pause(&mut self) -> f64 {
        let position = self.playback_time();
        self.stop_all_scheduled();
        self.playing = false;
        self.paused_at = Some(position);
        tracing::info!(paused_at = position, "playback pause");
        position
    }

    /// Saved pause position
    ///
    /// Does not reschedule: the caller re-selects regions and calls
    /// `schedule_playback` from the returned offset.
    pub fn resume(&self) -> Option<f64> {
        let position = self.paused_at?;
        tracing::debug!(resume_from = position, "playback resume requested");
        Some(position)
    }

    pub fn resume_point(&self) -> Option<f64> {
        self.paused_at
    }

    /// Project time derived from the anchor pair; 0 when nothing is scheduled
    pub fn playback_time(&self) -> f64 {
        match self.anchor {
            Some(anchor) => anchor.project_time(self.context.current_time()),
            None => 0.0,
        }
    }

    /// Forget any pause point, e.g. after `stop`
    pub fn clear_resume_point(&mut self) {
        self.paused_at = None;
        self.playing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AudioBuffer;
    use approx::assert_relative_eq;

    fn engine() -> AudioEngine {
        AudioEngine::offline(&EngineConfig::default())
    }

    fn region(id: &str, track: &str, start: f64, dur: f64) -> Region {
        let frames = (dur * 48000.0).round() as usize;
        let audio = Arc::new(AudioBuffer::from_channels(vec![vec![0.5; frames]; 2], 48000).unwrap());
        Region::new(id, track, start, dur).with_audio(audio)
    }

    #[test]
    fn test_playback_time_starts_at_offset() {
        let mut engine = engine();
        engine.context().render_secs(1.0); // suspended: clock stays at 0
        let report = engine.schedule_playback(&[region("r1", "t1", 0.0, 1.0)], 3.0, 3.0);

        assert_eq!(report.scheduled, 0);
        assert_eq!(report.skipped, 1);
        assert_relative_eq!(engine.playback_time(), 3.0);
        assert_eq!(engine.context().state(), ContextState::Running);
        engine.context().render_secs(0.5);
        assert_relative_eq!(engine.playback_time(), 3.5);
    }

    #[test]
    fn test_regions_without_audio_skipped() {
        let mut engine = engine();
        let report = engine.schedule_playback(
            &[Region::new("stub", "t1", 0.0, 2.0), region("r1", "t1", 0.5, 1.0)],
            0.0,
            0.0,
        );
        assert_eq!(
            report,
            ScheduleReport {
                scheduled: 1,
                skipped: 1,
                failed: 0
            }
        );
    }

    #[test]
    fn test_bad_region_does_not_abort_session() {
        let mut engine = engine();
        // offset past the buffer end is refused by the context
        let bad = region("bad", "t1", 0.0, 1.0).with_offset(5.0);
        let report = engine.schedule_playback(&[bad, region("ok", "t2", 0.0, 1.0)], 0.0, 0.0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.scheduled, 1);
    }

    #[test]
    fn test_pause_records_position_and_stops() {
        let mut engine = engine();
        engine.schedule_playback(&[region("r1", "t1", 0.0, 2.0)], 0.0, 0.0);
        engine.context().render_secs(0.75);

        let paused = engine.pause();
        assert_relative_eq!(paused, 0.75);
        assert!(!engine.is_playing());
        assert!(!engine.is_clock_running());
        assert_eq!(engine.scheduled_count(), 0);
        assert_eq!(engine.playback_time(), 0.0);
        assert_eq!(engine.resume(), Some(0.75));
    }

    #[test]
    fn test_stop_all_is_idempotent() {
        let mut engine = engine();
        engine.stop_all_scheduled();
        engine.stop_all_scheduled();
        assert_eq!(engine.playback_time(), 0.0);
        assert_eq!(engine.resume(), None);
    }

    #[test]
    fn test_effect_params_require_chain() {
        let engine = engine();
        engine.ensure_track("t1", 1.0);
        assert!(!engine.set_effect_param("t1", EffectKind::Mid, "gain", 3.0));

        assert!(engine.create_effects_chain("t1"));
        assert!(engine.set_effect_param("t1", EffectKind::Mid, "gain", 3.0));
        assert_eq!(engine.effect_param("t1", EffectKind::Mid, "gain"), Some(3.0));
        assert!(!engine.set_effect_param("t1", EffectKind::Compressor, "wet", 0.5));
        assert!(!engine.set_effect_param("t9", EffectKind::Low, "gain", 1.0));
    }

    #[test]
    fn test_track_volume_clamped() {
        let engine = engine();
        engine.set_track_volume("t1", 4.0);
        assert_eq!(engine.track_volume("t1"), Some(1.0));
        engine.set_track_volume("t1", 0.3);
        assert_eq!(engine.track_volume("t1"), Some(0.3));
        assert!(engine.remove_track("t1"));
        assert_eq!(engine.track_volume("t1"), None);
    }
}

//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::EngineConfig;
use crate::engine::{peak_level, read_wav, write_wav, AudioEngine, ExportFormat};
use crate::error::Result;
use crate::persistence::{JsonFileRepository, ProjectSnapshot};
use crate::timeline::{select_regions, TimelineState};

/// Summary of a finished bounce
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    pub out: PathBuf,
    pub seconds: f64,
    pub scheduled: usize,
    pub skipped: usize,
    pub peak: f32,
}

fn snapshot_dir(snapshot: &Path) -> PathBuf {
    snapshot
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Load a snapshot and its audio from files next to it
pub fn load_timeline(snapshot: &Path, config: &EngineConfig) -> Result<(ProjectSnapshot, TimelineState)> {
    let snap = ProjectSnapshot::load(snapshot)?;
    let base = snapshot_dir(snapshot);
    let state = snap.restore(|file| read_wav(&base.join(file), config.sample_rate))?;
    Ok((snap, state))
}

/// Print the tracks and regions of a snapshot.
pub fn inspect(snapshot: &Path) -> Result<()> {
    let snap = ProjectSnapshot::load(snapshot)?;

    println!("Project: {} (v{})", snap.name, snap.version);
    println!("BPM: {} | Playhead: {:.2}s", snap.bpm, snap.playhead_sec);
    println!("Saved: {}", snap.saved_at.format("%Y-%m-%d %H:%M:%S"));
    println!("{:-<60}", "");

    for track in &snap.tracks {
        let mut flags = String::new();
        if track.muted {
            flags.push_str(" [M]");
        }
        if track.solo {
            flags.push_str(" [S]");
        }
        println!(
            "{} \"{}\" ({}) vol {:.2}{}",
            track.id, track.name, track.kind, track.volume, flags
        );
        for region in &track.regions {
            println!(
                "    {}: {:.3}s +{:.3}s (offset {:.3}s) {}",
                region.id,
                region.start_sec,
                region.duration_sec,
                region.buffer_offset,
                region.file_name.as_deref().unwrap_or("-")
            );
        }
    }

    println!("{:-<60}", "");
    println!("Tracks: {} | Regions: {}", snap.tracks.len(), snap.region_count());
    Ok(())
}

/// Bounce a snapshot through the offline engine.
pub fn render(
    snapshot: &Path,
    out: &Path,
    from: f64,
    seconds: Option<f64>,
    config: &EngineConfig,
) -> Result<RenderSummary> {
    info!(snapshot = %snapshot.display(), from, "rendering snapshot");
    let (_, state) = load_timeline(snapshot, config)?;

    let from = from.max(0.0);
    let seconds = seconds.unwrap_or(state.duration_secs() - from).max(0.0);

    let mut engine = AudioEngine::offline(config);
    for track in &state.tracks {
        engine.set_track_volume(&track.id, track.volume);
    }
    let regions = select_regions(&state.tracks, from, config.horizon_secs);
    let report = engine.schedule_playback(&regions, from, from);
    let mix = engine.context().render_secs(seconds);
    engine.stop_all_scheduled();

    write_wav(&mix, out, ExportFormat::default())?;
    let summary = RenderSummary {
        out: out.to_path_buf(),
        seconds,
        scheduled: report.scheduled,
        skipped: report.skipped,
        peak: peak_level(&mix),
    };
    info!(?summary, "render complete");

    println!("Rendered {:.2}s to {}", summary.seconds, summary.out.display());
    println!(
        "Regions: {} scheduled, {} without audio",
        summary.scheduled, summary.skipped
    );
    Ok(summary)
}

/// Create the metadata tables.
pub fn init_store(dir: &Path) -> Result<()> {
    let repo = JsonFileRepository::init(dir)?;
    println!("Tables ready in {}", repo.dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_test_tone;
    use crate::timeline::{Action, Region, TimelineStore, Track, TrackKind};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    #[test]
    fn test_render_bounces_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::default();
        let tone = generate_test_tone(220.0, 1.0, config.sample_rate);
        write_wav(&tone, &dir.path().join("beat.wav"), ExportFormat::float()).unwrap();

        let mut store = TimelineStore::new();
        store.dispatch_all([
            Action::AddTrack(Track::new("t_beat", "Beat", TrackKind::Beat)),
            Action::AddRegion(
                Region::new("r1", "t_beat", 0.5, 1.0)
                    .with_audio(Arc::new(tone))
                    .with_file_name("beat.wav"),
            ),
        ]);
        let snapshot_path = dir.path().join("song.json");
        ProjectSnapshot::from_state("Song", store.state())
            .save(&snapshot_path)
            .unwrap();

        let out = dir.path().join("mix.wav");
        let summary = render(&snapshot_path, &out, 0.0, None, &config).unwrap();
        assert_eq!(summary.scheduled, 1);
        assert_relative_eq!(summary.seconds, 1.5);
        assert!(summary.peak > 0.1);

        let mix = read_wav(&out, config.sample_rate).unwrap();
        assert_eq!(mix.len(), 72000);
        // Silence before the region starts
        assert!(mix.samples[0][..24000].iter().all(|s| *s == 0.0));
    }
}

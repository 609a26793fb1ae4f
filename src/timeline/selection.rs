//! Region selection for playback
//!
//! Decides which regions a play request schedules. Recomputed on every play
//! so mute/solo changes made while stopped are always honoured.

use super::model::{Region, Track};

/// Forward bound standing in for "rest of the project"
pub const DEFAULT_HORIZON_SECS: f64 = 3600.0;

/// Solo gate: with any solo engaged only soloed tracks play, even if muted;
/// otherwise every unmuted track plays
pub fn is_audible(track: &Track, any_solo: bool) -> bool {
    if any_solo {
        track.solo
    } else {
        !track.muted
    }
}

/// Regions on audible tracks overlapping `[cursor_sec, cursor_sec + horizon_secs)`
pub fn select_regions(tracks: &[Track], cursor_sec: f64, horizon_secs: f64) -> Vec<Region> {
    let any_solo = tracks.iter().any(|t| t.solo);
    let window_end = cursor_sec + horizon_secs;

    let selected: Vec<Region> = tracks
        .iter()
        .filter(|t| is_audible(t, any_solo))
        .flat_map(|t| t.regions.iter())
        .filter(|r| r.end_sec() > cursor_sec && r.start_sec < window_end)
        .cloned()
        .collect();

    tracing::debug!(
        cursor_sec,
        horizon_secs,
        any_solo,
        selected = selected.len(),
        "selected regions for playback"
    );
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::model::TrackKind;

    fn track(id: &str, muted: bool, solo: bool, regions: &[(f64, f64)]) -> Track {
        let mut t = Track::new(id, id, TrackKind::Vocal);
        t.muted = muted;
        t.solo = solo;
        for (i, (start, dur)) in regions.iter().enumerate() {
            t.regions.push(Region::new(format!("{}_{}", id, i), id, *start, *dur));
        }
        t
    }

    #[test]
    fn test_muted_tracks_excluded_without_solo() {
        let tracks = vec![
            track("a", false, false, &[(0.0, 5.0)]),
            track("b", true, false, &[(0.0, 5.0)]),
        ];
        let ids: Vec<_> = select_regions(&tracks, 0.0, DEFAULT_HORIZON_SECS)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a_0"]);
    }

    #[test]
    fn test_muted_and_soloed_track_plays() {
        let tracks = vec![
            track("a", false, false, &[(0.0, 5.0)]),
            track("b", true, true, &[(0.0, 5.0)]),
        ];
        let selected = select_regions(&tracks, 0.0, DEFAULT_HORIZON_SECS);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].track_id, "b");
    }

    #[test]
    fn test_window_bounds() {
        // ends at cursor, overlaps cursor, starts at window end
        let tracks = vec![track("a", false, false, &[(0.0, 2.0), (1.0, 2.0), (12.0, 1.0)])];
        let ids: Vec<_> = select_regions(&tracks, 2.0, 10.0)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a_1"]);
    }
}

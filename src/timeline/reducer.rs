//! Timeline transition function
//!
//! `reduce` is pure and total: every action yields a new state, and payloads
//! that cannot apply (unknown ids, out-of-range indices, boundary splits)
//! return the state unchanged.

use std::collections::HashSet;

use super::action::Action;
use super::model::{Region, TimelineState, Track};
use super::store::IdGenerator;

/// Apply one action, returning the next state
pub fn reduce(state: &TimelineState, action: &Action, ids: &dyn IdGenerator) -> TimelineState {
    let mut next = state.clone();
    let applied = apply(&mut next, action, ids);
    if applied {
        next
    } else {
        tracing::debug!(action = action.name(), "timeline action ignored");
        state.clone()
    }
}

/// Mutate `state` in place; returns false when the action does not apply
fn apply(state: &mut TimelineState, action: &Action, ids: &dyn IdGenerator) -> bool {
    match action {
        Action::AddTrack(track) => {
            if state.has_track(&track.id) {
                tracing::debug!(action = "add_track_ignored_duplicate", track_id = %track.id);
                return false;
            }
            let mut incoming = HashSet::new();
            if let Some(region) = track
                .regions
                .iter()
                .find(|r| state.has_region(&r.id) || !incoming.insert(r.id.as_str()))
            {
                tracing::debug!(
                    action = "add_track_ignored_duplicate_region",
                    track_id = %track.id,
                    region_id = %region.id
                );
                return false;
            }
            let mut track = track.clone();
            track.volume = clamp_volume(track.volume);
            for region in &mut track.regions {
                region.track_id = track.id.clone();
            }
            tracing::debug!(action = "add_track", track_id = %track.id, kind = %track.kind);
            state.tracks.push(track);
            true
        }

        Action::ReorderTrack { from, to } => {
            if *from >= state.tracks.len() {
                return false;
            }
            let moved = state.tracks.remove(*from);
            let to = (*to).min(state.tracks.len());
            tracing::debug!(action = "reorder_track", from = *from, to, track_id = %moved.id);
            state.tracks.insert(to, moved);
            true
        }

        Action::AddRegion(region) => {
            if state.has_region(&region.id) {
                tracing::debug!(action = "add_region_ignored_duplicate", region_id = %region.id);
                return false;
            }
            let Some(track) = track_mut(state, &region.track_id) else {
                return false;
            };
            tracing::debug!(
                action = "add_region",
                region_id = %region.id,
                track_id = %region.track_id,
                start_sec = region.start_sec,
                duration_sec = region.duration_sec
            );
            track.regions.push(region.clone());
            true
        }

        Action::MoveRegion {
            region_id,
            track_id,
            start_sec,
        } => {
            if !start_sec.is_finite() || !state.has_track(track_id) {
                return false;
            }
            let Some(mut region) = take_region(state, region_id) else {
                return false;
            };
            let from_track = std::mem::replace(&mut region.track_id, track_id.clone());
            region.start_sec = start_sec.max(0.0);
            tracing::debug!(
                action = "move_region",
                region_id = %region_id,
                from_track = %from_track,
                to_track = %track_id,
                start_sec = region.start_sec
            );
            // Target track was checked above
            if let Some(track) = track_mut(state, track_id) {
                track.regions.push(region);
            }
            true
        }

        Action::SplitRegion { region_id, at_sec } => split_region(state, region_id, *at_sec, ids),

        Action::TrimRegion {
            region_id,
            new_start,
            new_duration,
        } => {
            let new_start = new_start.filter(|s| s.is_finite());
            let new_duration = new_duration.filter(|d| d.is_finite());
            let Some(region) = region_mut(state, region_id) else {
                return false;
            };
            if let Some(start) = new_start {
                region.start_sec = start;
            }
            if let Some(duration) = new_duration {
                region.duration_sec = duration;
            }
            tracing::debug!(
                action = "trim_region",
                region_id = %region_id,
                new_start = ?new_start,
                new_duration = ?new_duration
            );
            true
        }

        Action::DeleteRegion { region_id } => {
            let removed = take_region(state, region_id).is_some();
            if removed {
                tracing::debug!(action = "delete_region", region_id = %region_id);
            }
            removed
        }

        Action::DeleteTrack { track_id } => {
            let before = state.tracks.len();
            state.tracks.retain(|t| &t.id != track_id);
            let removed = state.tracks.len() != before;
            if removed {
                tracing::debug!(action = "delete_track", track_id = %track_id);
            }
            removed
        }

        Action::DuplicateRegion {
            region_id,
            new_id,
            offset_sec,
        } => {
            if !offset_sec.is_finite() || state.has_region(new_id) {
                return false;
            }
            let Some(source) = state.region(region_id) else {
                return false;
            };
            let mut duplicate = source.clone();
            duplicate.id = new_id.clone();
            duplicate.start_sec = (source.start_sec + offset_sec).max(0.0);
            tracing::debug!(action = "duplicate_region", region_id = %region_id, new_id = %new_id);
            if let Some(track) = track_mut(state, &duplicate.track_id) {
                track.regions.push(duplicate);
            }
            true
        }

        Action::CopyRegion { region_id } => {
            state.clipboard = state.region(region_id).cloned();
            tracing::debug!(
                action = "copy_region",
                region_id = %region_id,
                clipboard_present = state.clipboard.is_some()
            );
            true
        }

        Action::PasteRegion {
            track_id,
            start_sec,
        } => {
            if !start_sec.is_finite() || !state.has_track(track_id) {
                return false;
            }
            let Some(clipboard) = state.clipboard.clone() else {
                return false;
            };
            let mut pasted = clipboard;
            let from_region = std::mem::replace(&mut pasted.id, fresh_id(state, ids));
            pasted.track_id = track_id.clone();
            pasted.start_sec = start_sec.max(0.0);
            tracing::debug!(
                action = "paste_region",
                from_region_id = %from_region,
                new_region_id = %pasted.id,
                track_id = %track_id,
                start_sec = pasted.start_sec
            );
            if let Some(track) = track_mut(state, track_id) {
                track.regions.push(pasted);
            }
            true
        }

        Action::SetPlayhead { sec } => {
            if !sec.is_finite() {
                return false;
            }
            state.playhead_sec = sec.max(0.0);
            tracing::debug!(action = "set_playhead", sec = state.playhead_sec);
            true
        }

        Action::SetPlaying { playing } => {
            state.is_playing = *playing;
            tracing::debug!(action = "set_playing", playing = *playing);
            true
        }

        Action::SetTrackVolume { track_id, volume } => {
            if !volume.is_finite() {
                return false;
            }
            let Some(track) = track_mut(state, track_id) else {
                return false;
            };
            track.volume = clamp_volume(*volume);
            tracing::debug!(action = "set_track_volume", track_id = %track_id, volume = track.volume);
            true
        }

        Action::ToggleMute { track_id } => {
            let Some(track) = track_mut(state, track_id) else {
                return false;
            };
            track.muted = !track.muted;
            tracing::debug!(action = "toggle_track_mute", track_id = %track_id, muted = track.muted);
            true
        }

        Action::ToggleSolo { track_id } => {
            let Some(track) = track_mut(state, track_id) else {
                return false;
            };
            track.solo = !track.solo;
            tracing::debug!(action = "toggle_track_solo", track_id = %track_id, solo = track.solo);
            true
        }

        Action::SetBpm { bpm } => {
            if !bpm.is_finite() || *bpm <= 0.0 {
                return false;
            }
            state.bpm = *bpm;
            tracing::debug!(action = "set_bpm", bpm = *bpm);
            true
        }
    }
}

fn split_region(state: &mut TimelineState, region_id: &str, at_sec: f64, ids: &dyn IdGenerator) -> bool {
    let Some(original) = state.region(region_id).cloned() else {
        return false;
    };
    if !at_sec.is_finite() || !original.contains(at_sec) {
        return false;
    }
    let offset = at_sec - original.start_sec;

    let left_id = child_id(state, region_id, "_L", ids);
    let right_id = child_id(state, region_id, "_R", ids);
    let right_id = if right_id == left_id {
        format!("{}_R", left_id)
    } else {
        right_id
    };

    let left = Region {
        id: left_id,
        duration_sec: offset,
        ..original.clone()
    };
    let right = Region {
        id: right_id,
        start_sec: at_sec,
        duration_sec: original.duration_sec - offset,
        buffer_offset: original.buffer_offset + offset,
        ..original
    };

    let Some(track) = track_mut(state, &left.track_id) else {
        return false;
    };
    let Some(index) = track.regions.iter().position(|r| r.id == region_id) else {
        return false;
    };
    tracing::debug!(
        action = "split_region",
        region_id = %region_id,
        at_sec,
        left_id = %left.id,
        right_id = %right.id
    );
    track.regions[index] = left;
    track.regions.insert(index + 1, right);
    true
}

/// `<id><suffix>` unless another region already uses it
fn child_id(state: &TimelineState, parent: &str, suffix: &str, ids: &dyn IdGenerator) -> String {
    let candidate = format!("{}{}", parent, suffix);
    if state.has_region(&candidate) {
        fresh_id(state, ids)
    } else {
        candidate
    }
}

/// A generated id not used by any region
fn fresh_id(state: &TimelineState, ids: &dyn IdGenerator) -> String {
    let base = ids.next_id();
    let mut candidate = base.clone();
    let mut n = 1;
    while state.has_region(&candidate) {
        candidate = format!("{}_{}", base, n);
        n += 1;
    }
    candidate
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn track_mut<'a>(state: &'a mut TimelineState, track_id: &str) -> Option<&'a mut Track> {
    state.tracks.iter_mut().find(|t| t.id == track_id)
}

fn region_mut<'a>(state: &'a mut TimelineState, region_id: &str) -> Option<&'a mut Region> {
    state
        .tracks
        .iter_mut()
        .flat_map(|t| t.regions.iter_mut())
        .find(|r| r.id == region_id)
}

fn take_region(state: &mut TimelineState, region_id: &str) -> Option<Region> {
    state.tracks.iter_mut().find_map(|t| {
        let index = t.regions.iter().position(|r| r.id == region_id)?;
        Some(t.regions.remove(index))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::model::TrackKind;
    use crate::timeline::store::SequentialIds;
    use pretty_assertions::assert_eq;

    fn two_tracks() -> TimelineState {
        let mut state = TimelineState::default();
        let mut t1 = Track::new("t1", "Beat", TrackKind::Beat);
        t1.regions.push(Region::new("r1", "t1", 1.0, 4.0).with_offset(0.5));
        state.tracks.push(t1);
        state.tracks.push(Track::new("t2", "Vocal 1", TrackKind::Vocal));
        state
    }

    #[test]
    fn test_split_keeps_order_and_offsets() {
        let ids = SequentialIds::new("r");
        let state = reduce(&two_tracks(), &Action::split("r1", 2.5), &ids);
        let regions = &state.tracks[0].regions;

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].id, "r1_L");
        assert_eq!(regions[0].duration_sec, 1.5);
        assert_eq!(regions[0].buffer_offset, 0.5);
        assert_eq!(regions[1].id, "r1_R");
        assert_eq!(regions[1].start_sec, 2.5);
        assert_eq!(regions[1].duration_sec, 2.5);
        assert_eq!(regions[1].buffer_offset, 2.0);
    }

    #[test]
    fn test_split_child_id_taken_uses_generator() {
        let ids = SequentialIds::new("r");
        let mut state = two_tracks();
        state.tracks[1].regions.push(Region::new("r1_L", "t2", 10.0, 1.0));

        let state = reduce(&state, &Action::split("r1", 2.0), &ids);
        let ids_on_t1: Vec<_> = state.tracks[0].regions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids_on_t1, vec!["r_1", "r1_R"]);
    }

    #[test]
    fn test_move_between_tracks() {
        let ids = SequentialIds::new("r");
        let state = reduce(&two_tracks(), &Action::move_region("r1", "t2", -3.0), &ids);

        assert!(state.tracks[0].regions.is_empty());
        assert_eq!(state.tracks[1].regions.len(), 1);
        assert_eq!(state.tracks[1].regions[0].track_id, "t2");
        assert_eq!(state.tracks[1].regions[0].start_sec, 0.0);
    }

    #[test]
    fn test_move_to_unknown_track_is_noop() {
        let ids = SequentialIds::new("r");
        let before = two_tracks();
        let after = reduce(&before, &Action::move_region("r1", "t9", 3.0), &ids);
        assert_eq!(after, before);
    }

    #[test]
    fn test_reorder() {
        let ids = SequentialIds::new("r");
        let state = reduce(&two_tracks(), &Action::ReorderTrack { from: 0, to: 7 }, &ids);
        assert_eq!(state.tracks[0].id, "t2");
        assert_eq!(state.tracks[1].id, "t1");

        let unchanged = reduce(&state, &Action::ReorderTrack { from: 5, to: 0 }, &ids);
        assert_eq!(unchanged, state);
    }

    #[test]
    fn test_trim_applies_values_as_given() {
        let ids = SequentialIds::new("r");
        let state = reduce(&two_tracks(), &Action::trim("r1", None, Some(0.01)), &ids);
        let region = state.region("r1").unwrap();
        assert_eq!(region.start_sec, 1.0);
        assert_eq!(region.duration_sec, 0.01);
    }

    #[test]
    fn test_delete_track_cascades() {
        let ids = SequentialIds::new("r");
        let state = reduce(
            &two_tracks(),
            &Action::DeleteTrack {
                track_id: "t1".to_string(),
            },
            &ids,
        );
        assert_eq!(state.tracks.len(), 1);
        assert!(!state.has_region("r1"));
    }

    #[test]
    fn test_duplicate_rejects_existing_id() {
        let ids = SequentialIds::new("r");
        let before = two_tracks();
        let dup = |new_id: &str| Action::DuplicateRegion {
            region_id: "r1".to_string(),
            new_id: new_id.to_string(),
            offset_sec: 4.0,
        };

        assert_eq!(reduce(&before, &dup("r1"), &ids), before);
        let state = reduce(&before, &dup("r2"), &ids);
        assert_eq!(state.region("r2").unwrap().start_sec, 5.0);
        assert_eq!(state.region("r2").unwrap().track_id, "t1");
    }

    #[test]
    fn test_copy_unknown_clears_clipboard() {
        let ids = SequentialIds::new("r");
        let state = reduce(&two_tracks(), &Action::copy("r1"), &ids);
        assert!(state.clipboard.is_some());
        let state = reduce(&state, &Action::copy("missing"), &ids);
        assert!(state.clipboard.is_none());
        let after_paste = reduce(&state, &Action::paste("t2", 1.0), &ids);
        assert_eq!(after_paste, state);
    }

    #[test]
    fn test_playhead_volume_bpm_guards() {
        let ids = SequentialIds::new("r");
        let state = reduce(&two_tracks(), &Action::SetPlayhead { sec: -2.0 }, &ids);
        assert_eq!(state.playhead_sec, 0.0);
        let state = reduce(&state, &Action::SetPlayhead { sec: f64::NAN }, &ids);
        assert_eq!(state.playhead_sec, 0.0);

        let state = reduce(
            &state,
            &Action::SetTrackVolume {
                track_id: "t1".to_string(),
                volume: 3.0,
            },
            &ids,
        );
        assert_eq!(state.tracks[0].volume, 1.0);

        let state = reduce(&state, &Action::SetBpm { bpm: 0.0 }, &ids);
        assert_eq!(state.bpm, 140.0);
        let state = reduce(&state, &Action::SetBpm { bpm: 92.0 }, &ids);
        assert_eq!(state.bpm, 92.0);
    }

    #[test]
    fn test_add_region_to_unknown_track_dropped() {
        let ids = SequentialIds::new("r");
        let before = two_tracks();
        let after = reduce(&before, &Action::AddRegion(Region::new("r5", "t9", 0.0, 1.0)), &ids);
        assert_eq!(after, before);
    }
}

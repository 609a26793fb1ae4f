//! Timeline Integration Tests
//!
//! Edit sequences through the public store API.

use std::collections::HashSet;
use std::sync::Arc;

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use test_case::test_case;

use vibelab::engine::generate_test_tone;
use vibelab::timeline::{
    select_regions, Action, Region, RegionDrag, SequentialIds, TimelineStore, Track, TrackKind,
    DEFAULT_HORIZON_SECS,
};

fn store_with_region(start: f64, duration: f64, offset: f64) -> TimelineStore {
    let tone = Arc::new(generate_test_tone(220.0, 30.0, 48000));
    let mut store = TimelineStore::with_ids(Box::new(SequentialIds::new("r")));
    store.dispatch_all([
        Action::AddTrack(Track::new("t1", "Vocal 1", TrackKind::Vocal)),
        Action::AddRegion(
            Region::new("a", "t1", start, duration)
                .with_audio(tone)
                .with_offset(offset),
        ),
    ]);
    store
}

fn all_ids(store: &TimelineStore) -> Vec<String> {
    store.state().regions().map(|r| r.id.clone()).collect()
}

// === Split ===

#[test]
fn test_split_children_cover_parent() {
    let mut store = store_with_region(2.0, 4.0, 1.0);
    store.dispatch(Action::split("a", 3.5));

    let state = store.state();
    let left = state.region("a_L").unwrap();
    let right = state.region("a_R").unwrap();
    assert!(!state.has_region("a"));

    assert_relative_eq!(left.duration_sec + right.duration_sec, 4.0);
    assert_relative_eq!(left.start_sec, 2.0);
    assert_relative_eq!(right.start_sec, 3.5);
    assert_relative_eq!(right.buffer_offset, left.buffer_offset + left.duration_sec);
    assert!(Arc::ptr_eq(
        left.audio.as_ref().unwrap(),
        right.audio.as_ref().unwrap()
    ));
}

#[test_case(2.0 ; "at start")]
#[test_case(6.0 ; "at end")]
#[test_case(1.0 ; "before region")]
#[test_case(9.0 ; "after region")]
#[test_case(f64::NAN ; "not a number")]
fn test_split_outside_interior_is_noop(at: f64) {
    let mut store = store_with_region(2.0, 4.0, 0.0);
    let before = store.state().clone();
    store.dispatch(Action::split("a", at));
    assert_eq!(store.state(), &before);
}

#[test]
fn test_repeated_splits_keep_ids_unique() {
    let mut store = store_with_region(0.0, 10.0, 0.0);
    store.dispatch(Action::split("a", 5.0));
    store.dispatch(Action::split("a_L", 2.0));
    store.dispatch(Action::split("a_R", 7.0));
    store.dispatch(Action::DuplicateRegion {
        region_id: "a_L_L".into(),
        new_id: "dup".into(),
        offset_sec: 20.0,
    });
    store.dispatch(Action::copy("a_R_R"));
    store.dispatch(Action::paste("t1", 40.0));
    store.dispatch(Action::paste("t1", 45.0));

    let ids = all_ids(&store);
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(ids.len(), 7);
    assert_eq!(unique.len(), ids.len());
}

// === Tracks ===

#[test]
fn test_duplicate_add_track_ignored() {
    let mut store = TimelineStore::new();
    store.dispatch(Action::AddTrack(Track::new("t1", "Vocal 1", TrackKind::Vocal)));
    store.dispatch(Action::AddTrack(Track::new("t1", "Other", TrackKind::Beat)));

    assert_eq!(store.state().tracks.len(), 1);
    assert_eq!(store.state().tracks[0].name, "Vocal 1");

    // region ids must stay unique across tracks
    store.dispatch(Action::AddRegion(Region::new("r1", "t1", 0.0, 1.0)));
    let mut t2 = Track::new("t2", "Vocal 2", TrackKind::Vocal);
    t2.regions.push(Region::new("r1", "t2", 2.0, 1.0));
    store.dispatch(Action::AddTrack(t2));
    assert!(!store.state().has_track("t2"));
    assert_eq!(store.state().regions().filter(|r| r.id == "r1").count(), 1);

    let mut t3 = Track::new("t3", "Vocal 3", TrackKind::Vocal);
    t3.regions.push(Region::new("x", "t3", 0.0, 1.0));
    t3.regions.push(Region::new("x", "t3", 1.0, 1.0));
    store.dispatch(Action::AddTrack(t3));
    assert!(!store.state().has_track("t3"));
}

#[test]
fn test_region_for_unknown_track_dropped() {
    let mut store = TimelineStore::new();
    store.dispatch(Action::AddRegion(Region::new("r", "ghost", 0.0, 1.0)));
    assert_eq!(store.state().regions().count(), 0);
}

#[test]
fn test_delete_track_cascades() {
    let mut store = store_with_region(0.0, 1.0, 0.0);
    store.dispatch(Action::DeleteTrack {
        track_id: "t1".into(),
    });
    assert!(store.state().tracks.is_empty());
    assert!(!store.state().has_region("a"));
}

#[test_case(0, 2, &["b", "c", "a"] ; "forward")]
#[test_case(2, 0, &["c", "a", "b"] ; "backward")]
#[test_case(0, 99, &["b", "c", "a"] ; "target clamped")]
#[test_case(7, 0, &["a", "b", "c"] ; "source out of range")]
fn test_reorder(from: usize, to: usize, expected: &[&str]) {
    let mut store = TimelineStore::new();
    for id in ["a", "b", "c"] {
        store.dispatch(Action::AddTrack(Track::new(id, id, TrackKind::Vocal)));
    }
    store.dispatch(Action::ReorderTrack { from, to });
    let order: Vec<_> = store.state().tracks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(order, expected);
}

// === Clipboard ===

#[test]
fn test_copy_then_paste_twice() {
    let mut store = store_with_region(1.0, 2.0, 0.5);
    store.dispatch(Action::copy("a"));
    store.dispatch(Action::paste("t1", 10.0));
    store.dispatch(Action::paste("t1", 20.0));

    let track = store.state().track("t1").unwrap();
    assert_eq!(track.regions.len(), 3);
    let pasted: Vec<_> = track.regions[1..].iter().collect();
    assert_ne!(pasted[0].id, pasted[1].id);
    assert_eq!(pasted[0].start_sec, 10.0);
    assert_eq!(pasted[1].start_sec, 20.0);
    for region in pasted {
        assert_eq!(region.duration_sec, 2.0);
        assert_eq!(region.buffer_offset, 0.5);
    }
}

#[test]
fn test_paste_with_empty_clipboard_is_noop() {
    let mut store = store_with_region(0.0, 1.0, 0.0);
    let before = store.state().clone();
    store.dispatch(Action::paste("t1", 3.0));
    assert_eq!(store.state(), &before);
}

// === Moves and gestures ===

#[test]
fn test_cross_track_move() {
    let mut store = store_with_region(1.0, 1.0, 0.0);
    store.dispatch(Action::AddTrack(Track::new("t2", "Vocal 2", TrackKind::Vocal)));
    store.dispatch(Action::move_region("a", "t2", -3.0));

    let state = store.state();
    assert!(state.track("t1").unwrap().regions.is_empty());
    let moved = state.track("t2").unwrap().region("a").unwrap();
    assert_eq!(moved.track_id, "t2");
    assert_eq!(moved.start_sec, 0.0);
}

#[test]
fn test_left_trim_gesture_keeps_right_edge() {
    let mut store = store_with_region(2.0, 3.0, 0.0);
    let region = store.state().region("a").unwrap().clone();

    // 80 px/s: 240 px is 3.0 s
    let drag = RegionDrag::begin(&region, 160.0, 80.0);
    store.dispatch(drag.trim_left_to(240.0));

    let trimmed = store.state().region("a").unwrap();
    assert_relative_eq!(trimmed.start_sec, 3.0, epsilon = 1e-9);
    assert_relative_eq!(trimmed.end_sec(), 5.0, epsilon = 1e-9);
}

#[test]
fn test_trim_gestures_stay_within_audio() {
    let tone = Arc::new(generate_test_tone(220.0, 2.0, 48000));
    let mut store = TimelineStore::new();
    store.dispatch_all([
        Action::AddTrack(Track::new("t1", "Vocal 1", TrackKind::Vocal)),
        Action::AddRegion(Region::new("a", "t1", 1.0, 2.0).with_audio(tone)),
    ]);

    let region = store.state().region("a").unwrap().clone();
    store.dispatch(RegionDrag::begin(&region, 0.0, 80.0).trim_right_to(80.0));
    let after_right = store.state().region("a").unwrap().clone();
    assert!(after_right.fits_buffer());
    assert_relative_eq!(after_right.duration_sec, 2.0, epsilon = 1e-9);

    store.dispatch(RegionDrag::begin(&after_right, 80.0, 80.0).trim_left_to(0.0));
    let after_left = store.state().region("a").unwrap();
    assert!(after_left.fits_buffer());
    assert_relative_eq!(after_left.start_sec, 1.0, epsilon = 1e-9);
    assert_relative_eq!(after_left.end_sec(), 3.0, epsilon = 1e-9);
}

// === Selection ===

#[test]
fn test_solo_selects_only_soloed_track() {
    let mut store = TimelineStore::new();
    for id in ["A", "B", "C"] {
        store.dispatch(Action::AddTrack(Track::new(id, id, TrackKind::Vocal)));
        store.dispatch(Action::AddRegion(Region::new(format!("r{id}"), id, 0.0, 5.0)));
    }
    store.dispatch(Action::ToggleMute { track_id: "C".into() });
    store.dispatch(Action::ToggleSolo { track_id: "B".into() });

    let selected = select_regions(&store.state().tracks, 0.0, DEFAULT_HORIZON_SECS);
    let tracks: Vec<_> = selected.iter().map(|r| r.track_id.as_str()).collect();
    assert_eq!(tracks, vec!["B"]);
}

#[test]
fn test_selection_skips_regions_behind_cursor() {
    let mut store = store_with_region(0.0, 2.0, 0.0);
    store.dispatch(Action::AddRegion(Region::new("b", "t1", 4.0, 2.0)));

    let selected = select_regions(&store.state().tracks, 3.0, DEFAULT_HORIZON_SECS);
    assert_eq!(selected.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["b"]);
}

//! Timeline store
//!
//! Holds the single authoritative [`TimelineState`] and applies actions to
//! it through [`reduce`](super::reduce).

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use super::action::Action;
use super::model::TimelineState;
use super::reducer::reduce;

/// Source of fresh region ids
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// `r_<uuid>` ids
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        format!("r_{}", Uuid::new_v4().simple())
    }
}

/// `<prefix>_1`, `<prefix>_2`, ... for reproducible tests and demos
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}_{}", self.prefix, n)
    }
}

pub struct TimelineStore {
    state: TimelineState,
    ids: Box<dyn IdGenerator>,
}

impl std::fmt::Debug for TimelineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineStore")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for TimelineStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineStore {
    pub fn new() -> Self {
        Self::with_ids(Box::new(UuidIds))
    }

    pub fn with_ids(ids: Box<dyn IdGenerator>) -> Self {
        Self {
            state: TimelineState::default(),
            ids,
        }
    }

    /// Start from an existing state, e.g. a restored snapshot
    pub fn from_state(state: TimelineState, ids: Box<dyn IdGenerator>) -> Self {
        Self { state, ids }
    }

    pub fn state(&self) -> &TimelineState {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) -> &TimelineState {
        self.state = reduce(&self.state, &action, self.ids.as_ref());
        &self.state
    }

    /// Apply actions in order
    pub fn dispatch_all(&mut self, actions: impl IntoIterator<Item = Action>) -> &TimelineState {
        for action in actions {
            self.state = reduce(&self.state, &action, self.ids.as_ref());
        }
        &self.state
    }

    /// Fresh id from the store's generator
    pub fn next_id(&self) -> String {
        self.ids.next_id()
    }

    pub fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::model::{Track, TrackKind};

    #[test]
    fn test_uuid_ids_are_prefixed_and_distinct() {
        let a = UuidIds.next_id();
        let b = UuidIds.next_id();
        assert!(a.starts_with("r_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIds::new("clip");
        assert_eq!(ids.next_id(), "clip_1");
        assert_eq!(ids.next_id(), "clip_2");
    }

    #[test]
    fn test_dispatch_updates_state() {
        let mut store = TimelineStore::with_ids(Box::new(SequentialIds::new("r")));
        store.dispatch_all([
            Action::AddTrack(Track::new("t1", "Beat", TrackKind::Beat)),
            Action::SetPlayhead { sec: 3.0 },
        ]);
        assert_eq!(store.state().tracks.len(), 1);
        assert_eq!(store.state().playhead_sec, 3.0);
    }
}

//! Studio command and event channels
//!
//! Track rows and region widgets talk to the controller through
//! [`StudioCommand`]s; the controller reports what happened through the
//! [`EventBus`].

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::timeline::Region;

/// Capacity of every command and event channel
pub const CHANNEL_CAPACITY: usize = 1024;

/// Requests from track and region widgets
#[derive(Debug, Clone, PartialEq)]
pub enum StudioCommand {
    ToggleMute { track_id: String },
    ToggleSolo { track_id: String },
    SetVolume { track_id: String, volume: f32 },
    ReorderTrack { from: usize, to: usize },
    DeleteTrack { track_id: String },
    SplitRequested { region_id: String, at_sec: f64 },
    /// Split at the engine's playhead while playing, else at the stored playhead
    SplitAtPlayhead { region_id: String },
    Copy { region_id: String },
    /// Paste at `start_sec`, or at the playhead when `None`
    Paste { track_id: String, start_sec: Option<f64> },
}

/// Notifications from the controller
#[derive(Debug, Clone, PartialEq)]
pub enum StudioEvent {
    MuteToggled { track_id: String, muted: bool },
    SoloToggled { track_id: String, solo: bool },
    VolumeChanged { track_id: String, volume: f32 },
    TrackDeleted { track_id: String },
    SplitRequested { region_id: String, at_sec: f64 },
    ClipboardUpdated { region: Option<Region> },
    PlaybackStarted { cursor_sec: f64, scheduled: usize },
    PlaybackStopped { at_sec: f64 },
    RegionRecorded { region: Region },
    Error { message: String },
}

/// Bounded command channel
pub fn command_channel() -> (Sender<StudioCommand>, Receiver<StudioCommand>) {
    bounded(CHANNEL_CAPACITY)
}

/// Fan-out of [`StudioEvent`]s to every live subscriber
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<StudioEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<StudioEvent> {
        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver to every subscriber; dropped receivers are forgotten
    pub fn emit(&mut self, event: StudioEvent) {
        self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(?event, "event subscriber lagging, event dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

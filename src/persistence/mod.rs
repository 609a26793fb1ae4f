//! Project persistence
//!
//! Project and track metadata records, and JSON snapshots of the timeline.

pub mod repository;
pub mod snapshot;

pub use repository::{
    JsonFileRepository, ProjectRecord, ProjectRepository, ProjectUpdate, TrackRecord,
    PROJECTS_TABLE, TRACKS_TABLE,
};
pub use snapshot::{ProjectSnapshot, RegionSnapshot, TrackSnapshot, SNAPSHOT_VERSION};

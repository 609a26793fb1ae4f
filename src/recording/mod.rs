//! Microphone recording
//!
//! Capturing a take on a track and turning it into a timeline region.

pub mod capture;
pub mod recorder;

pub use capture::{BufferedCapture, CaptureChunk, CaptureDevice, CaptureStream};
#[cfg(feature = "device")]
pub use crate::engine::device::CpalCapture;
pub use recorder::{PendingTake, Recorder, RecorderState, RecordingSession};

//! Capture devices
//!
//! A [`CaptureDevice`] opens an exclusive input stream that pushes
//! [`CaptureChunk`]s into a channel until the returned [`CaptureStream`] is
//! released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::engine::AudioBuffer;
use crate::error::{Result, VibelabError};

/// Interleaved block of captured samples
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureChunk {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl CaptureChunk {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Handle on an open input stream
///
/// Releasing frees the hardware lock; it is idempotent and also runs on drop.
pub trait CaptureStream {
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

/// Source of microphone input
pub trait CaptureDevice {
    /// Acquire the device and start delivering chunks into `sink`
    fn open(&mut self, sink: Sender<CaptureChunk>) -> Result<Box<dyn CaptureStream>>;

    fn name(&self) -> &'static str;
}

/// Capture device replaying in-memory samples
///
/// Delivers its whole buffer in `chunk_frames` blocks as soon as it is
/// opened. Used by tests, demos and the CLI.
#[derive(Debug)]
pub struct BufferedCapture {
    source: AudioBuffer,
    chunk_frames: usize,
    deny: bool,
    in_use: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
}

impl BufferedCapture {
    pub fn new(source: AudioBuffer) -> Self {
        Self {
            source,
            chunk_frames: 4096,
            deny: false,
            in_use: Arc::new(AtomicBool::new(false)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_chunk_frames(mut self, chunk_frames: usize) -> Self {
        self.chunk_frames = chunk_frames.max(1);
        self
    }

    /// A device whose permission prompt is always refused
    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new(AudioBuffer::new(0, Default::default(), 48000))
        }
    }

    /// Set once the most recent stream has been released
    pub fn released_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }
}

impl CaptureDevice for BufferedCapture {
    fn open(&mut self, sink: Sender<CaptureChunk>) -> Result<Box<dyn CaptureStream>> {
        if self.deny {
            return Err(VibelabError::PermissionDenied);
        }
        if self.in_use.swap(true, Ordering::AcqRel) {
            return Err(VibelabError::MicrophoneUnavailable {
                reason: "device is already capturing".to_string(),
            });
        }
        self.released.store(false, Ordering::Release);

        let channels = self.source.channels() as u16;
        let interleaved = self.source.to_interleaved();
        let block = self.chunk_frames * channels.max(1) as usize;
        for samples in interleaved.chunks(block) {
            let chunk = CaptureChunk {
                samples: samples.to_vec(),
                channels,
                sample_rate: self.source.sample_rate,
            };
            if sink.send(chunk).is_err() {
                break;
            }
        }

        tracing::debug!(
            device = self.name(),
            frames = self.source.len(),
            "capture stream opened"
        );
        Ok(Box::new(BufferedStream {
            in_use: Arc::clone(&self.in_use),
            released: Arc::clone(&self.released),
        }))
    }

    fn name(&self) -> &'static str {
        "buffered"
    }
}

struct BufferedStream {
    in_use: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
}

impl CaptureStream for BufferedStream {
    fn release(&mut self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.in_use.store(false, Ordering::Release);
            tracing::debug!("capture stream released");
        }
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Drop for BufferedStream {
    fn drop(&mut self) {
        self.release();
    }
}

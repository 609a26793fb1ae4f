//! Recording pipeline
//!
//! `Idle -> Capturing -> Finalizing -> Idle`. Releasing a take closes the
//! input stream and drains what it captured into a [`PendingTake`]; decoding
//! that take assembles the chunks into one WAV blob, decodes it with the
//! engine's context and produces a region anchored at the take's start. The
//! input stream is released on every path out of `Capturing`.

use std::fmt;

use crossbeam_channel::{unbounded, Receiver};

use super::capture::{CaptureChunk, CaptureDevice, CaptureStream};
use crate::engine::io::{encode_wav, ExportFormat};
use crate::engine::{AudioBuffer, AudioContext, ChannelLayout};
use crate::error::{Result, VibelabError};
use crate::timeline::{IdGenerator, Region, MIN_REGION_DURATION_SECS};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Capturing,
    Finalizing,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderState::Idle => write!(f, "idle"),
            RecorderState::Capturing => write!(f, "capturing"),
            RecorderState::Finalizing => write!(f, "finalizing"),
        }
    }
}

type CompletionCallback = Box<dyn FnOnce(&Region) + Send>;

/// One capture in progress
pub struct RecordingSession {
    track_id: String,
    start_sec: f64,
    stream: Box<dyn CaptureStream>,
    chunks: Receiver<CaptureChunk>,
    pending: Vec<CaptureChunk>,
    on_complete: Option<CompletionCallback>,
}

impl fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSession")
            .field("track_id", &self.track_id)
            .field("start_sec", &self.start_sec)
            .field("pending_chunks", &self.pending.len())
            .field("released", &self.stream.is_released())
            .finish()
    }
}

impl RecordingSession {
    /// Open `device` and start capturing for `track_id` at project time `start_sec`
    pub fn start(device: &mut dyn CaptureDevice, track_id: &str, start_sec: f64) -> Result<Self> {
        tracing::debug!(action = "start_request", track_id, start_sec, device = device.name());
        let (tx, rx) = unbounded();
        let stream = device.open(tx)?;
        Ok(Self {
            track_id: track_id.to_string(),
            start_sec,
            stream,
            chunks: rx,
            pending: Vec::new(),
            on_complete: None,
        })
    }

    /// Hand the finished region to `callback` before `stop` returns it
    pub fn on_complete(mut self, callback: impl FnOnce(&Region) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn start_sec(&self) -> f64 {
        self.start_sec
    }

    fn pump(&mut self) {
        self.pending.extend(self.chunks.try_iter());
    }

    /// Seconds of audio received so far
    pub fn captured_secs(&mut self) -> f64 {
        self.pump();
        chunk_secs(&self.pending)
    }

    /// Close the input stream and keep what it captured
    pub fn release(mut self) -> PendingTake {
        self.stream.release();
        self.pump();
        tracing::debug!(action = "release", chunks = self.pending.len());
        PendingTake {
            track_id: std::mem::take(&mut self.track_id),
            start_sec: self.start_sec,
            chunks: std::mem::take(&mut self.pending),
            on_complete: self.on_complete.take(),
        }
    }

    /// Stop capturing, decode the take and build its region
    pub fn stop(self, context: &AudioContext, ids: &dyn IdGenerator) -> Result<Region> {
        self.release().decode(context, ids)
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.stream.release();
    }
}

/// A take whose stream is closed, waiting to be decoded
pub struct PendingTake {
    track_id: String,
    start_sec: f64,
    chunks: Vec<CaptureChunk>,
    on_complete: Option<CompletionCallback>,
}

impl fmt::Debug for PendingTake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTake")
            .field("track_id", &self.track_id)
            .field("start_sec", &self.start_sec)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

impl PendingTake {
    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn captured_secs(&self) -> f64 {
        chunk_secs(&self.chunks)
    }

    /// Decode the take and build its region
    ///
    /// Takes shorter than [`MIN_REGION_DURATION_SECS`] are reported as
    /// [`VibelabError::EmptyAudio`].
    pub fn decode(mut self, context: &AudioContext, ids: &dyn IdGenerator) -> Result<Region> {
        let blob = assemble(&self.chunks)?;
        tracing::debug!(action = "stop", blob_size = blob.len(), chunks = self.chunks.len());

        let decoded = context.decode(&blob)?;
        let duration = decoded.duration_secs();
        tracing::debug!(action = "decoded", duration);
        if duration < MIN_REGION_DURATION_SECS {
            tracing::debug!(action = "take_too_short", duration, min = MIN_REGION_DURATION_SECS);
            return Err(VibelabError::EmptyAudio);
        }

        let region = Region::new(ids.next_id(), self.track_id.clone(), self.start_sec, duration)
            .with_audio(Arc::new(decoded));
        if let Some(callback) = self.on_complete.take() {
            callback(&region);
        }
        Ok(region)
    }
}

fn chunk_secs(chunks: &[CaptureChunk]) -> f64 {
    match chunks.first() {
        Some(first) if first.sample_rate > 0 => {
            let frames: usize = chunks.iter().map(CaptureChunk::frames).sum();
            frames as f64 / first.sample_rate as f64
        }
        _ => 0.0,
    }
}

/// Concatenate chunks into one WAV blob in the first chunk's format
fn assemble(chunks: &[CaptureChunk]) -> Result<Vec<u8>> {
    let Some(first) = chunks.first() else {
        return Err(VibelabError::EmptyAudio);
    };
    let layout = ChannelLayout::from_count(first.channels as usize).ok_or_else(|| {
        VibelabError::UnsupportedFormat {
            format: format!("{}-channel capture", first.channels),
        }
    })?;

    let mut interleaved = Vec::with_capacity(chunks.iter().map(|c| c.samples.len()).sum());
    for chunk in chunks {
        if chunk.channels != first.channels || chunk.sample_rate != first.sample_rate {
            tracing::warn!(
                channels = chunk.channels,
                sample_rate = chunk.sample_rate,
                "dropping capture chunk with mismatched format"
            );
            continue;
        }
        interleaved.extend_from_slice(&chunk.samples);
    }

    let buffer = AudioBuffer::from_interleaved(&interleaved, layout, first.sample_rate)?;
    encode_wav(&buffer, ExportFormat::float())
}

/// Single-flight wrapper around [`RecordingSession`]
#[derive(Debug, Default)]
pub struct Recorder {
    session: Option<RecordingSession>,
    finalizing: Option<PendingTake>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecorderState {
        match (&self.session, &self.finalizing) {
            (_, Some(_)) => RecorderState::Finalizing,
            (Some(_), None) => RecorderState::Capturing,
            (None, None) => RecorderState::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Track of the take being captured or finalized
    pub fn track_id(&self) -> Option<&str> {
        match (&self.session, &self.finalizing) {
            (Some(session), _) => Some(session.track_id()),
            (None, Some(take)) => Some(take.track_id()),
            (None, None) => None,
        }
    }

    pub fn start(&mut self, device: &mut dyn CaptureDevice, track_id: &str, start_sec: f64) -> Result<()> {
        if let Some(active) = self.track_id() {
            return Err(VibelabError::RecordingInProgress {
                track_id: active.to_string(),
            });
        }
        self.session = Some(RecordingSession::start(device, track_id, start_sec)?);
        tracing::info!(track_id, start_sec, "recording started");
        Ok(())
    }

    pub fn captured_secs(&mut self) -> f64 {
        self.session.as_mut().map_or(0.0, RecordingSession::captured_secs)
    }

    /// `Capturing -> Finalizing`: close the stream, keep the captured audio
    pub fn release(&mut self) -> Result<()> {
        let session = self.session.take().ok_or(VibelabError::NotRecording)?;
        self.finalizing = Some(session.release());
        Ok(())
    }

    /// `Finalizing -> Idle`: decode the released take, whatever the outcome
    pub fn finalize(&mut self, context: &AudioContext, ids: &dyn IdGenerator) -> Result<Region> {
        let take = self.finalizing.take().ok_or(VibelabError::NotRecording)?;
        let result = take.decode(context, ids);

        match &result {
            Ok(region) => tracing::info!(
                region_id = %region.id,
                track_id = %region.track_id,
                start_sec = region.start_sec,
                duration_sec = region.duration_sec,
                "recording finalized"
            ),
            Err(e) => tracing::warn!(error = %e, "recording failed to finalize"),
        }
        result
    }

    /// Release and finalize the active take
    pub fn stop(&mut self, context: &AudioContext, ids: &dyn IdGenerator) -> Result<Region> {
        if self.session.is_some() {
            self.release()?;
        }
        self.finalize(context, ids)
    }

    /// Drop the active take without decoding it
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.session.take().is_some() | self.finalizing.take().is_some();
        if cancelled {
            tracing::info!("recording cancelled");
        }
        cancelled
    }
}

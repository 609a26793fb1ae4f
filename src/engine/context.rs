//! Audio context
//!
//! The hardware-clock abstraction the scheduler talks to. A context owns a
//! render graph (track buses, scheduled sources, master gain) that an
//! [`OutputDriver`] pulls from. Time is derived from frames rendered, so the
//! clock is monotonic and stands still while the context is suspended.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::dsp::{Effect, Gain};
use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::engine::io::{Decoder, WavDecoder};
use crate::engine::routing::TrackBus;
use crate::error::{Result, VibelabError};

/// Handle for a scheduled one-shot source
pub type SourceId = u64;

/// Render graph shared between the control thread and the audio callback
pub type SharedGraph = Arc<Mutex<RenderGraph>>;

/// Hardware context state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    /// Not producing audio; the clock is frozen. Initial state.
    #[default]
    Suspended,
    Running,
    /// Terminal
    Closed,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextState::Suspended => write!(f, "suspended"),
            ContextState::Running => write!(f, "running"),
            ContextState::Closed => write!(f, "closed"),
        }
    }
}

/// One-shot playback of a slice of a decoded buffer on a track bus
#[derive(Debug, Clone)]
struct ScheduledSource {
    id: SourceId,
    bus: String,
    buffer: Arc<AudioBuffer>,
    /// Absolute context frame at which playback begins
    start_frame: u64,
    /// First buffer frame played
    offset_frame: usize,
    /// Number of buffer frames played; never runs past the buffer end
    length: usize,
}

impl ScheduledSource {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.length as u64
    }

    /// Add the part of this source overlapping `[block_start, block_start + frames)`
    fn mix_into(&self, out: &mut AudioBuffer, block_start: u64, frames: usize) {
        let block_end = block_start + frames as u64;
        let from = self.start_frame.max(block_start);
        let to = self.end_frame().min(block_end);
        if from >= to {
            return;
        }

        let dst_start = (from - block_start) as usize;
        let src_start = self.offset_frame + (from - self.start_frame) as usize;
        let count = (to - from) as usize;
        let src_channels = self.buffer.channels();
        let downmix = out.channels() == 1 && src_channels == 2;

        for (ch, dst) in out.samples.iter_mut().enumerate() {
            let dst = &mut dst[dst_start..dst_start + count];
            if downmix {
                let l = &self.buffer.samples[0][src_start..src_start + count];
                let r = &self.buffer.samples[1][src_start..src_start + count];
                for ((d, a), b) in dst.iter_mut().zip(l).zip(r) {
                    *d += 0.5 * (a + b);
                }
            } else {
                // Mono material feeds every output channel
                let src = &self.buffer.samples[ch.min(src_channels - 1)][src_start..src_start + count];
                dst.iter_mut().zip(src).for_each(|(d, s)| *d += *s);
            }
        }
    }
}

/// Mix graph: sources feed track buses, buses feed the master gain
#[derive(Debug)]
pub struct RenderGraph {
    sample_rate: u32,
    layout: ChannelLayout,
    state: ContextState,
    frames_rendered: u64,
    buses: BTreeMap<String, TrackBus>,
    master: Gain,
    sources: Vec<ScheduledSource>,
    next_source_id: SourceId,
    bus_scratch: AudioBuffer,
    mix_scratch: AudioBuffer,
}

impl RenderGraph {
    pub fn new(sample_rate: u32, layout: ChannelLayout) -> Self {
        Self {
            sample_rate,
            layout,
            state: ContextState::Suspended,
            frames_rendered: 0,
            buses: BTreeMap::new(),
            master: Gain::default(),
            sources: Vec::new(),
            next_source_id: 1,
            bus_scratch: AudioBuffer::new(0, layout, sample_rate),
            mix_scratch: AudioBuffer::new(0, layout, sample_rate),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.layout.num_channels()
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Get or create the bus for a track
    pub fn ensure_bus(&mut self, track_id: &str, volume: f32) -> &mut TrackBus {
        self.buses
            .entry(track_id.to_string())
            .or_insert_with(|| TrackBus::new(volume))
    }

    pub fn bus(&self, track_id: &str) -> Option<&TrackBus> {
        self.buses.get(track_id)
    }

    pub fn bus_mut(&mut self, track_id: &str) -> Option<&mut TrackBus> {
        self.buses.get_mut(track_id)
    }

    /// Remove a bus along with every source routed to it
    pub fn remove_bus(&mut self, track_id: &str) -> bool {
        self.sources.retain(|s| s.bus != track_id);
        self.buses.remove(track_id).is_some()
    }

    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    pub fn master_volume(&self) -> f32 {
        self.master.gain()
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master.set_gain(volume);
    }

    pub fn active_sources(&self) -> usize {
        self.sources.len()
    }

    fn add_source(
        &mut self,
        bus: &str,
        buffer: Arc<AudioBuffer>,
        start_frame: u64,
        offset_frame: usize,
        length: usize,
    ) -> SourceId {
        let id = self.next_source_id;
        self.next_source_id += 1;
        self.sources.push(ScheduledSource {
            id,
            bus: bus.to_string(),
            buffer,
            start_frame: start_frame.max(self.frames_rendered),
            offset_frame,
            length,
        });
        id
    }

    fn remove_source(&mut self, id: SourceId) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.id != id);
        self.sources.len() != before
    }

    /// Fill an interleaved output block
    ///
    /// Outside the running state the block is silent and the clock does not
    /// move.
    pub fn render(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        if self.state != ContextState::Running {
            return;
        }

        let channels = self.layout.num_channels();
        let frames = output.len() / channels;
        if frames == 0 {
            return;
        }
        let block_start = self.frames_rendered;

        self.mix_scratch.clear_to(frames);
        for (track_id, bus) in self.buses.iter_mut() {
            self.bus_scratch.clear_to(frames);
            for source in self.sources.iter().filter(|s| &s.bus == track_id) {
                source.mix_into(&mut self.bus_scratch, block_start, frames);
            }
            bus.process(&mut self.bus_scratch);
            self.mix_scratch.mix_from(&self.bus_scratch);
        }
        self.master.process(&mut self.mix_scratch);

        for (frame, out) in output.chunks_exact_mut(channels).enumerate() {
            for (ch, sample) in out.iter_mut().enumerate() {
                *sample = self.mix_scratch.samples[ch][frame];
            }
        }

        self.frames_rendered += frames as u64;
        let now = self.frames_rendered;
        self.sources.retain(|s| s.end_frame() > now);
    }
}

/// Pushes rendered audio to an output
///
/// Resuming hands the driver the shared graph to pull from. The offline
/// [`ManualDriver`] never pulls on its own; callers drive it through
/// [`AudioContext::render`].
pub trait OutputDriver {
    fn resume(&mut self, graph: &SharedGraph) -> Result<()>;

    fn suspend(&mut self) -> Result<()>;

    fn close(&mut self);

    fn name(&self) -> &'static str;
}

/// Driver for offline rendering and tests
#[derive(Debug, Default)]
pub struct ManualDriver;

impl OutputDriver for ManualDriver {
    fn resume(&mut self, _graph: &SharedGraph) -> Result<()> {
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {}

    fn name(&self) -> &'static str {
        "manual"
    }
}

/// Hardware audio context: clock, decoder and source scheduling
pub struct AudioContext {
    graph: SharedGraph,
    driver: Box<dyn OutputDriver>,
    decoder: Box<dyn Decoder>,
    block_frames: usize,
}

impl fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.graph.lock();
        f.debug_struct("AudioContext")
            .field("driver", &self.driver.name())
            .field("decoder", &self.decoder.name())
            .field("state", &graph.state)
            .field("sample_rate", &graph.sample_rate)
            .field("current_time", &graph.current_time())
            .finish()
    }
}

impl AudioContext {
    pub fn new(
        config: &EngineConfig,
        driver: Box<dyn OutputDriver>,
        decoder: Box<dyn Decoder>,
    ) -> Self {
        let layout = ChannelLayout::from_count(config.channels as usize).unwrap_or_default();
        let mut graph = RenderGraph::new(config.sample_rate, layout);
        graph.set_master_volume(config.master_volume);
        Self {
            graph: Arc::new(Mutex::new(graph)),
            driver,
            decoder,
            block_frames: config.block_frames.max(1),
        }
    }

    /// Offline context with a manual driver and the WAV decoder
    pub fn offline(config: &EngineConfig) -> Self {
        Self::new(config, Box::new(ManualDriver), Box::new(WavDecoder))
    }

    pub fn state(&self) -> ContextState {
        self.graph.lock().state
    }

    pub fn sample_rate(&self) -> u32 {
        self.graph.lock().sample_rate
    }

    pub fn channels(&self) -> usize {
        self.graph.lock().channels()
    }

    /// Seconds of audio rendered since the context was created
    pub fn current_time(&self) -> f64 {
        self.graph.lock().current_time()
    }

    /// Shared graph for drivers and clock readers
    pub fn graph(&self) -> SharedGraph {
        Arc::clone(&self.graph)
    }

    /// Run a closure against the locked graph
    pub fn with_graph<R>(&self, f: impl FnOnce(&mut RenderGraph) -> R) -> R {
        f(&mut self.graph.lock())
    }

    pub fn resume(&mut self) -> Result<()> {
        match self.state() {
            ContextState::Closed => Err(VibelabError::ContextClosed),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                self.driver.resume(&self.graph)?;
                self.graph.lock().state = ContextState::Running;
                tracing::debug!(driver = self.driver.name(), "audio context resumed");
                Ok(())
            }
        }
    }

    pub fn suspend(&mut self) -> Result<()> {
        match self.state() {
            ContextState::Closed => Err(VibelabError::ContextClosed),
            ContextState::Suspended => Ok(()),
            ContextState::Running => {
                self.driver.suspend()?;
                self.graph.lock().state = ContextState::Suspended;
                tracing::debug!(driver = self.driver.name(), "audio context suspended");
                Ok(())
            }
        }
    }

    /// Stop the driver and drop every source; the context cannot be resumed
    pub fn close(&mut self) {
        if self.state() == ContextState::Closed {
            return;
        }
        self.driver.close();
        let mut graph = self.graph.lock();
        graph.sources.clear();
        graph.state = ContextState::Closed;
        tracing::debug!("audio context closed");
    }

    /// Decode encoded bytes at the context sample rate
    pub fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer> {
        if self.state() == ContextState::Closed {
            return Err(VibelabError::ContextClosed);
        }
        let buffer = self.decoder.decode(bytes, self.sample_rate())?;
        tracing::debug!(
            decoder = self.decoder.name(),
            bytes = bytes.len(),
            duration = buffer.duration_secs(),
            "decoded audio"
        );
        Ok(buffer)
    }

    /// Schedule `duration_secs` of `buffer`, starting `offset_secs` into it,
    /// at absolute context time `when_secs`
    ///
    /// Start times in the past play immediately. Playback is cut at the end
    /// of the buffer.
    pub fn start_source(
        &self,
        bus: &str,
        buffer: Arc<AudioBuffer>,
        when_secs: f64,
        offset_secs: f64,
        duration_secs: f64,
    ) -> Result<SourceId> {
        let reject = |reason: String| Err(VibelabError::ScheduleRejected { reason });

        let mut graph = self.graph.lock();
        if graph.state == ContextState::Closed {
            return Err(VibelabError::ContextClosed);
        }
        if !graph.buses.contains_key(bus) {
            return reject(format!("no bus for track {}", bus));
        }
        if !when_secs.is_finite() || when_secs < 0.0 {
            return reject(format!("invalid start time {}", when_secs));
        }
        if !offset_secs.is_finite() || offset_secs < 0.0 {
            return reject(format!("invalid buffer offset {}", offset_secs));
        }
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return reject(format!("invalid duration {}", duration_secs));
        }
        if buffer.sample_rate != graph.sample_rate {
            return reject(format!(
                "buffer rate {} differs from context rate {}",
                buffer.sample_rate, graph.sample_rate
            ));
        }

        let offset_frame = buffer.frame_at(offset_secs);
        if offset_frame >= buffer.len() {
            return reject(format!(
                "offset {:.3}s is past the buffer end ({:.3}s)",
                offset_secs,
                buffer.duration_secs()
            ));
        }
        let length = buffer.frame_at(duration_secs).min(buffer.len() - offset_frame);
        let start_frame = (when_secs * graph.sample_rate as f64).round() as u64;

        Ok(graph.add_source(bus, buffer, start_frame, offset_frame, length))
    }

    pub fn stop_source(&self, id: SourceId) -> Result<()> {
        if self.graph.lock().remove_source(id) {
            Ok(())
        } else {
            Err(VibelabError::SourceNotFound { id })
        }
    }

    /// Pull one interleaved block from the graph
    pub fn render(&self, output: &mut [f32]) {
        self.graph.lock().render(output);
    }

    /// Render `secs` of audio in configured block sizes and return it
    ///
    /// Advances the clock when running; returns silence otherwise.
    pub fn render_secs(&self, secs: f64) -> AudioBuffer {
        let (sample_rate, layout) = {
            let graph = self.graph.lock();
            (graph.sample_rate, graph.layout)
        };
        let channels = layout.num_channels();
        let total = (secs.max(0.0) * sample_rate as f64).round() as usize;

        let mut interleaved = vec![0.0_f32; total * channels];
        for block in interleaved.chunks_mut(self.block_frames * channels) {
            self.render(block);
        }

        let mut buffer = AudioBuffer::new(total, layout, sample_rate);
        for (frame, samples) in interleaved.chunks_exact(channels).enumerate() {
            for (ch, &s) in samples.iter().enumerate() {
                buffer.samples[ch][frame] = s;
            }
        }
        buffer
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}

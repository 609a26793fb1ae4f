//! Hardware audio through cpal
//!
//! Output pulls the shared render graph from the device callback; input
//! forwards microphone blocks into the recording channel.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, Stream, StreamConfig};
use crossbeam_channel::Sender;

use crate::config::EngineConfig;
use crate::engine::context::{AudioContext, OutputDriver, SharedGraph};
use crate::engine::io::WavDecoder;
use crate::error::{Result, VibelabError};
use crate::recording::{CaptureChunk, CaptureDevice, CaptureStream};

fn device_error(reason: impl std::fmt::Display) -> VibelabError {
    VibelabError::DeviceError {
        reason: reason.to_string(),
    }
}

/// Default output device
#[derive(Default)]
pub struct CpalOutput {
    stream: Option<Stream>,
}

impl CpalOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn build(graph: &SharedGraph) -> Result<Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| device_error("no audio output device found"))?;

        let (channels, sample_rate) = {
            let g = graph.lock();
            (g.channels() as u16, g.sample_rate())
        };
        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Default,
        };

        let callback_graph = SharedGraph::clone(graph);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Never block the audio thread; a missed lock is a silent block
                    match callback_graph.try_lock() {
                        Some(mut g) => g.render(data),
                        None => data.fill(0.0),
                    }
                },
                |err| tracing::error!(error = %err, "audio output stream error"),
                None,
            )
            .map_err(device_error)?;

        tracing::info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate,
            channels,
            "opened output stream"
        );
        Ok(stream)
    }
}

impl OutputDriver for CpalOutput {
    fn resume(&mut self, graph: &SharedGraph) -> Result<()> {
        if self.stream.is_none() {
            self.stream = Some(Self::build(graph)?);
        }
        if let Some(stream) = &self.stream {
            stream.play().map_err(device_error)?;
        }
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        if let Some(stream) = &self.stream {
            stream.pause().map_err(device_error)?;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
    }

    fn name(&self) -> &'static str {
        "cpal"
    }
}

impl AudioContext {
    /// Context on the default output device
    pub fn with_default_device(config: &EngineConfig) -> Self {
        AudioContext::new(config, Box::new(CpalOutput::new()), Box::new(WavDecoder))
    }
}

/// Default input device
#[derive(Debug, Default)]
pub struct CpalCapture;

impl CaptureDevice for CpalCapture {
    fn open(&mut self, sink: Sender<CaptureChunk>) -> Result<Box<dyn CaptureStream>> {
        let unavailable = |reason: String| VibelabError::MicrophoneUnavailable { reason };

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| unavailable("no input device available".to_string()))?;
        let supported = device
            .default_input_config()
            .map_err(|e| unavailable(e.to_string()))?;
        if supported.sample_format() != SampleFormat::F32 {
            return Err(unavailable(format!(
                "unsupported input sample format {:?}",
                supported.sample_format()
            )));
        }

        let config: StreamConfig = supported.into();
        let channels = config.channels;
        let sample_rate = config.sample_rate.0;
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = sink.send(CaptureChunk {
                        samples: data.to_vec(),
                        channels,
                        sample_rate,
                    });
                },
                |err| tracing::error!(error = %err, "audio input stream error"),
                None,
            )
            .map_err(|e| unavailable(e.to_string()))?;
        stream.play().map_err(|e| unavailable(e.to_string()))?;

        tracing::info!(sample_rate, channels, "opened input stream");
        Ok(Box::new(CpalInputStream {
            stream: Some(stream),
        }))
    }

    fn name(&self) -> &'static str {
        "cpal"
    }
}

struct CpalInputStream {
    stream: Option<Stream>,
}

impl CaptureStream for CpalInputStream {
    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            tracing::debug!("input stream released");
        }
    }

    fn is_released(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        self.release();
    }
}

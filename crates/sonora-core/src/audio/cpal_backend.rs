//! CPAL audio backend
//!
//! One stereo output stream whose callback owns the graph renderer.
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  Control Thread  │───push()───────────►│   Command Queue     │
//! │ (state machine)  │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         │                                           │
//!         │ Relaxed atomics                           │ pop()
//!         ▼                                           ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │ LiveParams /     │◄───────────────────►│  CPAL Audio Thread  │
//! │ GraphAtomics     │                     │ (owns GraphRenderer)│
//! └──────────────────┘                     └─────────────────────┘
//! ```

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::backend::{AudioBackend, OutputStream, StreamSpec};
use super::config::{AudioConfig, MAX_BUFFER_SIZE};
use super::device::{find_device_by_id, get_default_device};
use super::error::{AudioError, AudioResult};
use crate::engine::GraphRenderer;
use crate::types::StereoBuffer;

/// Hardware output through cpal
pub struct CpalBackend {
    config: AudioConfig,
    negotiated: Option<(cpal::Device, StreamConfig)>,
}

impl CpalBackend {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            negotiated: None,
        }
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn negotiate(&mut self) -> AudioResult<StreamSpec> {
        let device = match &self.config.device {
            Some(id) => find_device_by_id(id)?,
            None => get_default_device()?,
        };

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using audio device: {}", device_name);

        let supported = get_output_config(&device, &self.config)?;
        let buffer_size = self.config.buffer_size.frames();
        let stream_config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: CpalBufferSize::Fixed(buffer_size),
        };

        let spec = StreamSpec {
            sample_rate: supported.sample_rate().0,
            buffer_size,
        };
        log::info!(
            "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
            stream_config.channels,
            spec.sample_rate,
            spec.buffer_size,
            spec.latency_ms()
        );

        self.negotiated = Some((device, stream_config));
        Ok(spec)
    }

    fn start(&mut self, renderer: GraphRenderer) -> AudioResult<Box<dyn OutputStream>> {
        let (device, stream_config) = self.negotiated.take().ok_or(AudioError::NotNegotiated)?;

        let state = Arc::new(Mutex::new(CallbackState::new(renderer)));
        let stream = build_output_stream(&device, &stream_config, state)?;
        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        log::info!("Audio stream started");
        Ok(Box::new(CpalStream { stream }))
    }
}

/// Keeps the cpal stream alive; dropping it stops the callback
struct CpalStream {
    stream: Stream,
}

impl OutputStream for CpalStream {
    fn suspend(&self) -> AudioResult<()> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamPauseError(e.to_string()))
    }

    fn resume(&self) -> AudioResult<()> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))
    }
}

/// State owned exclusively by the output callback
struct CallbackState {
    renderer: GraphRenderer,
    /// Pre-allocated render block
    block: StereoBuffer,
}

impl CallbackState {
    fn new(renderer: GraphRenderer) -> Self {
        Self {
            renderer,
            block: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    fn process(&mut self, n_frames: usize) {
        // RT-safe: no allocation within MAX_BUFFER_SIZE
        self.block.set_len_from_capacity(n_frames.min(MAX_BUFFER_SIZE));
        self.renderer.render(&mut self.block);
    }
}

/// Pick the best output configuration for a device
///
/// Prefers f32 stereo at the requested sample rate, falling back to the
/// device's maximum rate when the request is out of range.
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target_sample_rate = config.target_sample_rate();
    let in_range = |c: &cpal::SupportedStreamConfigRange| {
        target_sample_rate >= c.min_sample_rate().0 && target_sample_rate <= c.max_sample_rate().0
    };

    let best_config = supported_configs
        .iter()
        .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2 && in_range(c))
        .or_else(|| {
            supported_configs
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        })
        .or_else(|| supported_configs.iter().find(|c| c.sample_format() == SampleFormat::F32))
        .ok_or_else(|| {
            AudioError::ConfigError("No f32 output configuration available".to_string())
        })?;

    let sample_rate = if in_range(best_config) {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best_config.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    Ok(best_config.clone().with_sample_rate(sample_rate))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    state: Arc<Mutex<CallbackState>>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                // Only this callback ever locks the state
                let mut state = match state.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                let n_frames = data.len() / channels;
                state.process(n_frames);

                let samples = state.block.as_slice();
                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    match samples.get(i) {
                        Some(sample) => {
                            frame[0] = sample.left;
                            if channels > 1 {
                                frame[1] = sample.right;
                            }
                            for ch in frame.iter_mut().skip(2) {
                                *ch = 0.0;
                            }
                        }
                        None => frame.fill(0.0),
                    }
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

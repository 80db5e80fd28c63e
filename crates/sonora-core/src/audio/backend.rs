//! Backend abstraction over the platform output stream
//!
//! The engine opens its output in two steps: `negotiate` picks the device and
//! stream format (so the renderer can be built for the real sample rate),
//! then `start` hands the renderer over to the audio thread for good.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::error::AudioResult;
use crate::engine::GraphRenderer;

/// Format agreed with the output device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    /// Frames per callback (as negotiated with the device)
    pub buffer_size: u32,
}

impl StreamSpec {
    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// A running output stream. Dropping it stops audio and releases the renderer.
pub trait OutputStream {
    fn suspend(&self) -> AudioResult<()>;
    fn resume(&self) -> AudioResult<()>;
}

/// Something that can drive a `GraphRenderer`
pub trait AudioBackend {
    fn name(&self) -> &str;

    /// Choose the device and stream format
    fn negotiate(&mut self) -> AudioResult<StreamSpec>;

    /// Move the renderer onto the audio thread and start pulling blocks
    fn start(&mut self, renderer: GraphRenderer) -> AudioResult<Box<dyn OutputStream>>;
}

/// Latch recording that the user has interacted with the application
///
/// Opening the audio device before the first gesture is refused; the gate is
/// shared between the UI (which records gestures) and the engine (which
/// checks it on activation). Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct ActivationGate {
    interacted: Arc<AtomicBool>,
}

impl ActivationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_interaction(&self) {
        if !self.interacted.swap(true, Ordering::AcqRel) {
            log::debug!("First user interaction recorded, audio activation allowed");
        }
    }

    pub fn has_interacted(&self) -> bool {
        self.interacted.load(Ordering::Acquire)
    }
}

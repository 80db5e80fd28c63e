//! Pull-based backend for tests and headless rendering
//!
//! No device and no thread: whoever holds an `OfflineOutput` renders blocks
//! on demand, exactly as the cpal callback would.

use std::sync::{Arc, Mutex, MutexGuard};

use super::backend::{AudioBackend, OutputStream, StreamSpec};
use super::config::DEFAULT_BUFFER_SIZE;
use super::error::{AudioError, AudioResult};
use crate::engine::GraphRenderer;
use crate::types::StereoBuffer;

type RendererSlot = Arc<Mutex<Option<GraphRenderer>>>;

fn lock(slot: &RendererSlot) -> MutexGuard<'_, Option<GraphRenderer>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct OfflineBackend {
    sample_rate: u32,
    slot: RendererSlot,
    /// Fails the next `negotiate` (simulates a missing device)
    fail_next_open: bool,
}

impl OfflineBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            slot: Arc::new(Mutex::new(None)),
            fail_next_open: false,
        }
    }

    /// Handle used to pull audio out of the running graph
    pub fn output(&self) -> OfflineOutput {
        OfflineOutput {
            slot: self.slot.clone(),
        }
    }

    pub fn fail_next_open(&mut self) {
        self.fail_next_open = true;
    }
}

impl AudioBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    fn negotiate(&mut self) -> AudioResult<StreamSpec> {
        if std::mem::take(&mut self.fail_next_open) {
            return Err(AudioError::NoDevices);
        }
        Ok(StreamSpec {
            sample_rate: self.sample_rate,
            buffer_size: DEFAULT_BUFFER_SIZE,
        })
    }

    fn start(&mut self, renderer: GraphRenderer) -> AudioResult<Box<dyn OutputStream>> {
        *lock(&self.slot) = Some(renderer);
        Ok(Box::new(OfflineStream {
            slot: self.slot.clone(),
        }))
    }
}

/// Dropping the stream releases the renderer, like closing a device
struct OfflineStream {
    slot: RendererSlot,
}

impl OutputStream for OfflineStream {
    // Suspension is carried by the graph atomics; nothing to pause here
    fn suspend(&self) -> AudioResult<()> {
        Ok(())
    }

    fn resume(&self) -> AudioResult<()> {
        Ok(())
    }
}

impl Drop for OfflineStream {
    fn drop(&mut self) {
        lock(&self.slot).take();
    }
}

#[derive(Clone)]
pub struct OfflineOutput {
    slot: RendererSlot,
}

impl OfflineOutput {
    /// Render `frames` frames; silence when no graph is running
    pub fn render(&self, frames: usize) -> StereoBuffer {
        let mut block = StereoBuffer::silence(frames);
        if let Some(renderer) = lock(&self.slot).as_mut() {
            renderer.render(&mut block);
        }
        block
    }

    pub fn is_running(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

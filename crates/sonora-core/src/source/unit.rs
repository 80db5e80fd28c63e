//! Single-use source units
//!
//! A `SourceUnit` is built for exactly one decoded buffer. `start` consumes
//! it and splits it into the `SourceVoice` that goes to the render thread
//! and the `SourceHandle` the control thread keeps. A stopped unit cannot be
//! restarted; the next track gets a new unit.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use super::DecodedBuffer;
use crate::engine::params::{clamp_pitch, AtomicF32};
use crate::types::StereoSample;

/// Identity of one source unit (never reused within a process)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

/// State shared between a voice and its handle
#[derive(Debug)]
pub struct SourceAtomics {
    playback_rate: AtomicF32,
    /// Current read position in frames of the buffer
    position: AtomicU64,
    finished: AtomicBool,
    stopped: AtomicBool,
}

impl SourceAtomics {
    fn new() -> Self {
        Self {
            playback_rate: AtomicF32::new(1.0),
            position: AtomicU64::new(0),
            finished: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }
}

pub struct SourceUnit {
    id: SourceId,
    buffer: Shared<DecodedBuffer>,
    output_sample_rate: u32,
    atomics: Arc<SourceAtomics>,
}

impl SourceUnit {
    pub fn new(id: SourceId, buffer: Shared<DecodedBuffer>, output_sample_rate: u32) -> Self {
        Self {
            id,
            buffer,
            output_sample_rate,
            atomics: Arc::new(SourceAtomics::new()),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Rate ratio applied on top of sample-rate conversion, clamped to 0.5-2.0
    pub fn set_playback_rate(&self, rate: f32) {
        self.atomics.playback_rate.store(clamp_pitch(rate));
    }

    /// Start playback from the beginning. The unit is consumed.
    pub fn start(self) -> (SourceVoice, SourceHandle) {
        let rate_scale = if self.output_sample_rate == 0 {
            1.0
        } else {
            self.buffer.sample_rate() as f64 / self.output_sample_rate as f64
        };
        let voice = SourceVoice {
            id: self.id,
            buffer: self.buffer,
            position: 0.0,
            rate_scale,
            atomics: self.atomics.clone(),
        };
        let handle = SourceHandle {
            id: self.id,
            atomics: self.atomics,
            live: true,
        };
        (voice, handle)
    }
}

/// Render-side half of a started source
pub struct SourceVoice {
    id: SourceId,
    buffer: Shared<DecodedBuffer>,
    /// Fractional read position in buffer frames
    position: f64,
    /// buffer rate / output rate
    rate_scale: f64,
    atomics: Arc<SourceAtomics>,
}

impl SourceVoice {
    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Produce the next output frame, linearly interpolating the buffer
    #[inline]
    pub fn next_frame(&mut self) -> StereoSample {
        if self.atomics.stopped.load(Ordering::Relaxed) {
            return StereoSample::silence();
        }

        let index = self.position as usize;
        let Some(current) = self.buffer.frame(index) else {
            self.atomics.finished.store(true, Ordering::Relaxed);
            return StereoSample::silence();
        };
        let next = self.buffer.frame(index + 1).unwrap_or(current);
        let frac = (self.position - index as f64) as f32;
        let out = current.lerp(next, frac);

        let rate = self.atomics.playback_rate.load() as f64;
        self.position += rate * self.rate_scale;
        self.atomics.position.store(self.position as u64, Ordering::Relaxed);
        out
    }
}

/// Control-side half of a started source
///
/// Becomes invalid once stopped; stopping an invalid handle is a no-op.
#[derive(Debug)]
pub struct SourceHandle {
    id: SourceId,
    atomics: Arc<SourceAtomics>,
    live: bool,
}

impl SourceHandle {
    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Change the live playback rate (pitch) of the running source
    pub fn set_playback_rate(&self, rate: f32) {
        if self.live {
            self.atomics.playback_rate.store(clamp_pitch(rate));
        }
    }

    pub fn playback_rate(&self) -> f32 {
        self.atomics.playback_rate.load()
    }

    /// The source played through the end of its buffer
    pub fn is_finished(&self) -> bool {
        self.atomics.finished.load(Ordering::Relaxed)
    }

    pub fn position_frames(&self) -> u64 {
        self.atomics.position.load(Ordering::Relaxed)
    }

    /// Silence the voice immediately and invalidate the handle
    pub(crate) fn stop(&mut self) {
        self.atomics.stopped.store(true, Ordering::Relaxed);
        self.live = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc_handle;
    use crate::types::StereoBuffer;

    fn ramp(frames: usize, sample_rate: u32) -> Shared<DecodedBuffer> {
        let audio = StereoBuffer::from_vec((0..frames).map(|i| StereoSample::mono(i as f32)).collect());
        Shared::new(&gc_handle(), DecodedBuffer::new(audio, sample_rate))
    }

    #[test]
    fn test_plays_buffer_then_finishes() {
        let unit = SourceUnit::new(SourceId(1), ramp(4, 48000), 48000);
        let (mut voice, handle) = unit.start();
        let out: Vec<f32> = (0..6).map(|_| voice.next_frame().left).collect();
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0]);
        assert!(handle.is_finished());
    }

    #[test]
    fn test_rate_interpolates() {
        let unit = SourceUnit::new(SourceId(2), ramp(8, 48000), 48000);
        unit.set_playback_rate(0.5);
        let (mut voice, handle) = unit.start();
        let out: Vec<f32> = (0..4).map(|_| voice.next_frame().left).collect();
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.5]);
        assert_eq!(handle.playback_rate(), 0.5);
    }

    #[test]
    fn test_sample_rate_compensation() {
        // 24kHz buffer on a 48kHz output advances half a frame per output frame
        let unit = SourceUnit::new(SourceId(3), ramp(8, 24000), 48000);
        let (mut voice, _handle) = unit.start();
        let out: Vec<f32> = (0..3).map(|_| voice.next_frame().left).collect();
        assert_eq!(out, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_pitch_clamped_and_live() {
        let unit = SourceUnit::new(SourceId(4), ramp(64, 48000), 48000);
        unit.set_playback_rate(5.0);
        let (mut voice, handle) = unit.start();
        assert_eq!(handle.playback_rate(), 2.0);

        voice.next_frame();
        handle.set_playback_rate(1.0);
        voice.next_frame();
        assert_eq!(voice.next_frame().left, 3.0);
    }

    #[test]
    fn test_stopped_voice_is_silent() {
        let unit = SourceUnit::new(SourceId(5), ramp(64, 48000), 48000);
        let (mut voice, mut handle) = unit.start();
        voice.next_frame();
        handle.stop();
        assert!(!handle.is_live());
        assert_eq!(voice.next_frame(), StereoSample::silence());
        assert!(!handle.is_finished());
    }
}

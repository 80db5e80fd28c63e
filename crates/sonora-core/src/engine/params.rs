//! Live parameters shared between the control thread and the renderer
//!
//! Each scalar is its own atomic. The control thread publishes a clamped
//! `ParamSnapshot` field by field; the renderer reads all fields once per
//! block. Ordering is `Relaxed`: per field the last write wins, and there is
//! no atomicity across fields.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::effect::{EffectsState, NUM_EQ_BANDS};

/// Longest delay the delay line is allocated for
pub const MAX_DELAY_SECONDS: f32 = 1.0;
/// Feedback is kept below unity so the loop always decays
pub const MAX_DELAY_FEEDBACK: f32 = 0.9;
pub const EQ_GAIN_LIMIT_DB: f32 = 40.0;
pub const MIN_EQ_FREQUENCY_HZ: f32 = 10.0;
pub const MIN_PITCH: f32 = 0.5;
pub const MAX_PITCH: f32 = 2.0;

/// f32 stored as its bit pattern in an AtomicU32
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Clamp to `[lo, hi]`, replacing NaN and infinities with `fallback`
#[inline]
fn sanitize(value: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        fallback
    }
}

/// Playback rate the source will actually use for a requested pitch
pub fn clamp_pitch(pitch: f32) -> f32 {
    sanitize(pitch, MIN_PITCH, MAX_PITCH, 1.0)
}

/// Plain copy of the values the renderer works with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    pub eq_gain_db: [f32; NUM_EQ_BANDS],
    pub eq_frequency_hz: [f32; NUM_EQ_BANDS],
    pub delay_time_seconds: f32,
    pub delay_feedback: f32,
    pub delay_mix: f32,
    pub reverb_mix: f32,
    pub master_gain: f32,
}

impl ParamSnapshot {
    /// Clamp every field of `state` to what the graph can render at `sample_rate`
    pub fn from_state(state: &EffectsState, master_gain: f32, sample_rate: u32) -> Self {
        let defaults = EffectsState::default();
        let max_frequency = sample_rate as f32 * 0.49;

        let mut eq_gain_db = [0.0; NUM_EQ_BANDS];
        let mut eq_frequency_hz = [0.0; NUM_EQ_BANDS];
        for (i, band) in state.eq_bands.iter().enumerate() {
            eq_gain_db[i] = sanitize(band.gain_db, -EQ_GAIN_LIMIT_DB, EQ_GAIN_LIMIT_DB, 0.0);
            eq_frequency_hz[i] = sanitize(
                band.frequency_hz,
                MIN_EQ_FREQUENCY_HZ,
                max_frequency,
                defaults.eq_bands[i].frequency_hz.min(max_frequency),
            );
        }

        Self {
            eq_gain_db,
            eq_frequency_hz,
            delay_time_seconds: sanitize(state.delay.time_seconds, 0.0, MAX_DELAY_SECONDS, 0.0),
            delay_feedback: sanitize(state.delay.feedback, 0.0, MAX_DELAY_FEEDBACK, 0.0),
            delay_mix: sanitize(state.delay.mix, 0.0, 1.0, 0.0),
            reverb_mix: sanitize(state.reverb.mix, 0.0, 1.0, 0.0),
            master_gain: sanitize(master_gain, 0.0, 4.0, 1.0),
        }
    }
}

/// Atomic home of the published parameters
#[derive(Debug)]
pub struct LiveParams {
    eq_gain_db: [AtomicF32; NUM_EQ_BANDS],
    eq_frequency_hz: [AtomicF32; NUM_EQ_BANDS],
    delay_time_seconds: AtomicF32,
    delay_feedback: AtomicF32,
    delay_mix: AtomicF32,
    reverb_mix: AtomicF32,
    master_gain: AtomicF32,
}

impl LiveParams {
    pub fn new(initial: &ParamSnapshot) -> Self {
        Self {
            eq_gain_db: initial.eq_gain_db.map(AtomicF32::new),
            eq_frequency_hz: initial.eq_frequency_hz.map(AtomicF32::new),
            delay_time_seconds: AtomicF32::new(initial.delay_time_seconds),
            delay_feedback: AtomicF32::new(initial.delay_feedback),
            delay_mix: AtomicF32::new(initial.delay_mix),
            reverb_mix: AtomicF32::new(initial.reverb_mix),
            master_gain: AtomicF32::new(initial.master_gain),
        }
    }

    /// Store every field (called from the control thread)
    pub fn publish(&self, snapshot: &ParamSnapshot) {
        for i in 0..NUM_EQ_BANDS {
            self.eq_gain_db[i].store(snapshot.eq_gain_db[i]);
            self.eq_frequency_hz[i].store(snapshot.eq_frequency_hz[i]);
        }
        self.delay_time_seconds.store(snapshot.delay_time_seconds);
        self.delay_feedback.store(snapshot.delay_feedback);
        self.delay_mix.store(snapshot.delay_mix);
        self.reverb_mix.store(snapshot.reverb_mix);
        self.master_gain.store(snapshot.master_gain);
    }

    /// Read every field (called from the render thread once per block)
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            eq_gain_db: std::array::from_fn(|i| self.eq_gain_db[i].load()),
            eq_frequency_hz: std::array::from_fn(|i| self.eq_frequency_hz[i].load()),
            delay_time_seconds: self.delay_time_seconds.load(),
            delay_feedback: self.delay_feedback.load(),
            delay_mix: self.delay_mix.load(),
            reverb_mix: self.reverb_mix.load(),
            master_gain: self.master_gain.load(),
        }
    }
}

/// Render-side status, written by the audio thread and read by the UI
///
/// Mirrors what the renderer actually holds, as opposed to what the control
/// thread has queued.
#[derive(Debug, Default)]
pub struct GraphAtomics {
    /// Raw id of the connected source (0 = none)
    connected_source: AtomicU64,
    /// Number of connected sources (0 or 1)
    connected_count: AtomicU32,
    /// Highest `connected_count` ever observed
    max_connected: AtomicU32,
    frames_rendered: AtomicU64,
    suspended: AtomicBool,
}

impl GraphAtomics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected_source(&self) -> Option<u64> {
        match self.connected_source.load(Ordering::Relaxed) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn connected_count(&self) -> u32 {
        self.connected_count.load(Ordering::Relaxed)
    }

    pub fn max_connected(&self) -> u32 {
        self.max_connected.load(Ordering::Relaxed)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Relaxed)
    }

    pub(crate) fn set_suspended(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::Relaxed);
    }

    pub(crate) fn set_connected(&self, source: Option<u64>) {
        let count = u32::from(source.is_some());
        self.connected_source.store(source.unwrap_or(0), Ordering::Relaxed);
        self.connected_count.store(count, Ordering::Relaxed);
        self.max_connected.fetch_max(count, Ordering::Relaxed);
    }

    pub(crate) fn add_frames(&self, frames: u64) {
        self.frames_rendered.fetch_add(frames, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.set_connected(None);
        self.set_suspended(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f32_roundtrip() {
        let value = AtomicF32::new(0.25);
        assert_eq!(value.load(), 0.25);
        value.store(-3.5);
        assert_eq!(value.load(), -3.5);
    }

    #[test]
    fn test_feedback_clamped_below_unity() {
        let mut state = EffectsState::default();
        state.delay.feedback = 1.5;
        let snapshot = ParamSnapshot::from_state(&state, 1.0, 48000);
        assert_eq!(snapshot.delay_feedback, 0.9);

        state.delay.feedback = -0.2;
        let snapshot = ParamSnapshot::from_state(&state, 1.0, 48000);
        assert_eq!(snapshot.delay_feedback, 0.0);
    }

    #[test]
    fn test_ranges_clamped() {
        let mut state = EffectsState::default();
        state.delay.time_seconds = 3.0;
        state.delay.mix = 2.0;
        state.reverb.mix = -1.0;
        state.eq_bands[0].gain_db = -90.0;
        state.eq_bands[2].frequency_hz = 30000.0;
        state.eq_bands[1].frequency_hz = 1.0;

        let snapshot = ParamSnapshot::from_state(&state, 1.0, 44100);
        assert_eq!(snapshot.delay_time_seconds, 1.0);
        assert_eq!(snapshot.delay_mix, 1.0);
        assert_eq!(snapshot.reverb_mix, 0.0);
        assert_eq!(snapshot.eq_gain_db[0], -40.0);
        assert_eq!(snapshot.eq_frequency_hz[1], 10.0);
        assert!((snapshot.eq_frequency_hz[2] - 21609.0).abs() < 0.01);
    }

    #[test]
    fn test_non_finite_values_fall_back_to_defaults() {
        let mut state = EffectsState::default();
        state.delay.feedback = f32::NAN;
        state.eq_bands[1].frequency_hz = f32::INFINITY;
        state.eq_bands[1].gain_db = f32::NEG_INFINITY;

        let snapshot = ParamSnapshot::from_state(&state, f32::NAN, 48000);
        assert_eq!(snapshot.delay_feedback, 0.0);
        assert_eq!(snapshot.eq_frequency_hz[1], 1000.0);
        assert_eq!(snapshot.eq_gain_db[1], 0.0);
        assert_eq!(snapshot.master_gain, 1.0);
    }

    #[test]
    fn test_pitch_clamp() {
        assert_eq!(clamp_pitch(3.0), 2.0);
        assert_eq!(clamp_pitch(0.1), 0.5);
        assert_eq!(clamp_pitch(f32::NAN), 1.0);
        assert_eq!(clamp_pitch(1.25), 1.25);
    }

    #[test]
    fn test_publish_then_snapshot() {
        let initial = ParamSnapshot::from_state(&EffectsState::default(), 1.0, 48000);
        let live = LiveParams::new(&initial);
        assert_eq!(live.snapshot(), initial);

        let mut state = EffectsState::default();
        state.eq_bands[0].gain_db = -6.0;
        state.reverb.mix = 0.3;
        let next = ParamSnapshot::from_state(&state, 0.8, 48000);
        live.publish(&next);
        assert_eq!(live.snapshot(), next);
    }

    #[test]
    fn test_graph_atomics_connection_tracking() {
        let atomics = GraphAtomics::new();
        assert_eq!(atomics.connected_source(), None);
        atomics.set_connected(Some(4));
        assert_eq!(atomics.connected_source(), Some(4));
        assert_eq!(atomics.connected_count(), 1);
        atomics.set_connected(None);
        assert_eq!(atomics.connected_count(), 0);
        assert_eq!(atomics.max_connected(), 1);
    }
}

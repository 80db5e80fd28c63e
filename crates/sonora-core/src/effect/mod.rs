//! Effect parameters
//!
//! `EffectsState` is the desired value of every effect parameter. It is pure
//! data: the store keeps the current snapshot, the engine clamps and
//! publishes it to the render thread, the source controller reads `pitch`.

mod path;
mod store;

use serde::{Deserialize, Serialize};

pub use path::EffectPath;
pub use store::EffectParameterStore;

/// Number of equalizer bands, chained in series
pub const NUM_EQ_BANDS: usize = 3;

/// Filter response of an EQ band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterShape {
    LowShelf,
    Peaking,
    HighShelf,
}

impl FilterShape {
    /// Shapes are fixed per band position
    pub const BANDS: [FilterShape; NUM_EQ_BANDS] =
        [FilterShape::LowShelf, FilterShape::Peaking, FilterShape::HighShelf];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    pub frequency_hz: f32,
    pub gain_db: f32,
    pub shape: FilterShape,
}

impl EqBand {
    pub const fn new(frequency_hz: f32, shape: FilterShape) -> Self {
        Self {
            frequency_hz,
            gain_db: 0.0,
            shape,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayParams {
    /// Seconds (0.0-1.0)
    pub time_seconds: f32,
    /// Amount recirculated into the delay line (0.0-0.9)
    pub feedback: f32,
    /// Wet level of the delay branch (0.0-1.0)
    pub mix: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbParams {
    /// Wet level of the reverb branch (0.0-1.0)
    pub mix: f32,
}

/// Desired value of every effect parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsState {
    pub eq_bands: [EqBand; NUM_EQ_BANDS],
    /// Playback rate ratio (0.5-2.0)
    pub pitch: f32,
    pub delay: DelayParams,
    pub reverb: ReverbParams,
}

impl Default for EffectsState {
    fn default() -> Self {
        Self {
            eq_bands: [
                EqBand::new(150.0, FilterShape::LowShelf),
                EqBand::new(1000.0, FilterShape::Peaking),
                EqBand::new(5000.0, FilterShape::HighShelf),
            ],
            pitch: 1.0,
            delay: DelayParams::default(),
            reverb: ReverbParams::default(),
        }
    }
}

//! Dotted parameter paths such as `delay.feedback` or `eqBands.1.gain`

use std::fmt;
use std::str::FromStr;

use super::{EffectsState, NUM_EQ_BANDS};
use crate::engine::EngineError;

/// One addressable scalar in `EffectsState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectPath {
    EqGain(usize),
    EqFrequency(usize),
    Pitch,
    DelayTime,
    DelayFeedback,
    DelayMix,
    ReverbMix,
}

impl EffectPath {
    /// Write `value` into the addressed field; no clamping happens here
    pub fn apply(self, state: &mut EffectsState, value: f32) {
        match self {
            EffectPath::EqGain(band) => state.eq_bands[band].gain_db = value,
            EffectPath::EqFrequency(band) => state.eq_bands[band].frequency_hz = value,
            EffectPath::Pitch => state.pitch = value,
            EffectPath::DelayTime => state.delay.time_seconds = value,
            EffectPath::DelayFeedback => state.delay.feedback = value,
            EffectPath::DelayMix => state.delay.mix = value,
            EffectPath::ReverbMix => state.reverb.mix = value,
        }
    }

    pub fn get(self, state: &EffectsState) -> f32 {
        match self {
            EffectPath::EqGain(band) => state.eq_bands[band].gain_db,
            EffectPath::EqFrequency(band) => state.eq_bands[band].frequency_hz,
            EffectPath::Pitch => state.pitch,
            EffectPath::DelayTime => state.delay.time_seconds,
            EffectPath::DelayFeedback => state.delay.feedback,
            EffectPath::DelayMix => state.delay.mix,
            EffectPath::ReverbMix => state.reverb.mix,
        }
    }
}

impl FromStr for EffectPath {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidParameter(s.to_string());

        // eqBands[1].gain and eqBands.1.gain are the same path
        let normalized = s.trim().replace('[', ".").replace(']', "");
        let segments: Vec<&str> = normalized.split('.').collect();

        match segments.as_slice() {
            ["pitch"] => Ok(EffectPath::Pitch),
            ["delay", "time" | "time_seconds"] => Ok(EffectPath::DelayTime),
            ["delay", "feedback"] => Ok(EffectPath::DelayFeedback),
            ["delay", "mix"] => Ok(EffectPath::DelayMix),
            ["reverb", "mix"] => Ok(EffectPath::ReverbMix),
            ["eqBands" | "eq_bands", index, field] => {
                let band: usize = index.parse().map_err(|_| invalid())?;
                if band >= NUM_EQ_BANDS {
                    return Err(invalid());
                }
                match *field {
                    "gain" | "gain_db" => Ok(EffectPath::EqGain(band)),
                    "frequency" | "frequency_hz" => Ok(EffectPath::EqFrequency(band)),
                    _ => Err(invalid()),
                }
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for EffectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectPath::EqGain(band) => write!(f, "eqBands.{}.gain", band),
            EffectPath::EqFrequency(band) => write!(f, "eqBands.{}.frequency", band),
            EffectPath::Pitch => f.write_str("pitch"),
            EffectPath::DelayTime => f.write_str("delay.time"),
            EffectPath::DelayFeedback => f.write_str("delay.feedback"),
            EffectPath::DelayMix => f.write_str("delay.mix"),
            EffectPath::ReverbMix => f.write_str("reverb.mix"),
        }
    }
}

//! Top-level configuration document

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::effect::EffectsState;

/// Master output gain applied after the mixer (linear)
pub const DEFAULT_MASTER_GAIN: f32 = 1.0;

/// Character of the reverb tank
///
/// Only the wet/dry mix is a live effect parameter; the room itself is fixed
/// for the lifetime of an activation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    /// Decay length (0.0-1.0)
    pub room_size: f32,
    /// High frequency damping (0.0 = bright, 1.0 = dark)
    pub damping: f32,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            room_size: 0.6,
            damping: 0.5,
        }
    }
}

/// Configuration read by sonora-player at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SonoraConfig {
    pub audio: AudioConfig,
    pub reverb: ReverbConfig,
    pub master_gain: f32,
    /// Effect values installed in the parameter store before activation
    pub effects: EffectsState,
}

impl Default for SonoraConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            reverb: ReverbConfig::default(),
            master_gain: DEFAULT_MASTER_GAIN,
            effects: EffectsState::default(),
        }
    }
}

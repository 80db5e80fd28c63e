use std::sync::Arc;

use super::PlaybackState;
use crate::effect::EffectsState;
use crate::track::{Track, TrackId};

/// Notices sent from the state machine to the UI
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    StateChanged {
        from: PlaybackState,
        to: PlaybackState,
    },

    /// Current track changed (`None` once nothing is loaded)
    TrackChanged(Option<Track>),

    /// The selected track could not be decoded; playback stays usable
    TrackUnplayable {
        track_id: TrackId,
        title: String,
        reason: String,
    },

    /// The source played through the end of its buffer
    TrackEnded(TrackId),

    /// New desired effect parameters
    EffectsChanged(Arc<EffectsState>),
}

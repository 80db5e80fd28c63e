use std::fmt;

use super::machine::LoadTicket;
use crate::source::SourceHandle;
use crate::track::Track;

/// Lifecycle states of the player
///
/// `Idle → Activating → Ready → Loading → Playing ⇄ Paused`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Audio not opened yet
    #[default]
    Idle,
    Activating,
    /// Engine running, nothing playing
    Ready,
    /// A decode is in flight
    Loading,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Whether the signal graph exists in this state
    pub fn engine_active(self) -> bool {
        !matches!(self, PlaybackState::Idle | PlaybackState::Activating)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Activating => "activating",
            PlaybackState::Ready => "ready",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// What is loaded right now
#[derive(Debug, Default)]
pub struct PlaybackSession {
    /// Selected track, kept while it loads and plays
    pub current_track: Option<Track>,
    /// Handle of the connected source
    pub source: Option<SourceHandle>,
    /// The only load whose result will be accepted
    pub pending: Option<LoadTicket>,
    /// Track that was current before the pending load, restored if it fails
    pub fallback_track: Option<Track>,
}

impl PlaybackSession {
    pub fn has_source(&self) -> bool {
        self.source.as_ref().is_some_and(SourceHandle::is_live)
    }
}

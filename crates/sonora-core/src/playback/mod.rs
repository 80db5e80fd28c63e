//! Playback lifecycle: user intent in, engine and source calls out

mod events;
mod machine;
mod state;

pub use events::PlaybackEvent;
pub use machine::{LoadOutcome, LoadRequest, LoadTicket, PlaybackStateMachine};
pub use state::{PlaybackSession, PlaybackState};

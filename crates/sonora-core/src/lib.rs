//! Sonora Core - real-time effect graph and playback lifecycle
//!
//! This crate contains everything below the terminal front end:
//! - `engine`: persistent signal graph (EQ → delay/reverb → mix → master) rendered on the audio thread
//! - `effect`: desired effect parameters and the snapshot store
//! - `source`: decoding and single-use source units feeding the graph
//! - `playback`: the state machine coordinating user intent with the engine
//! - `audio`: output backends (cpal hardware stream, offline renderer)
//! - `ingest`: dropped-file acceptance and library track creation

pub mod audio;
pub mod config;
pub mod effect;
pub mod engine;
pub mod ingest;
pub mod library;
pub mod playback;
pub mod source;
pub mod track;
pub mod types;

pub use engine::{EngineError, SignalGraphEngine};
pub use playback::{PlaybackEvent, PlaybackState, PlaybackStateMachine};

//! Errors raised by the engine and the playback controller

use thiserror::Error;

use crate::audio::AudioError;
use crate::source::DecodeError;

/// Recoverable failures of the playback engine
///
/// None of these is fatal: the state machine stays continuable after every
/// one of them.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Audio cannot be opened yet (no user gesture) or is not running
    #[error("audio engine unavailable: activation requires a prior user interaction")]
    EngineUnavailable,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An operation that would leave the graph in an invalid state
    #[error("graph misuse: {0}")]
    GraphMisuse(String),

    /// Unknown effect parameter path
    #[error("invalid effect parameter: {0:?}")]
    InvalidParameter(String),

    #[error("audio backend: {0}")]
    Audio(#[from] AudioError),
}

impl EngineError {
    /// Build a `GraphMisuse` and log the refusal where it happens
    pub(crate) fn misuse(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        log::error!("Refusing graph operation: {}", reason);
        EngineError::GraphMisuse(reason)
    }
}

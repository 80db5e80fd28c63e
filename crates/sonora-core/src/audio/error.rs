//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while opening or driving an output stream
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output devices found")]
    NoDevices,

    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start or resume the stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    #[error("Failed to pause audio stream: {0}")]
    StreamPauseError(String),

    /// `start` was called before `negotiate`
    #[error("Output stream was not negotiated")]
    NotNegotiated,
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;

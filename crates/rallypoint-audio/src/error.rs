//! Error types for rallypoint-audio

use thiserror::Error;

/// Audio/dictation error type
#[derive(Debug, Error)]
pub enum Error {
    /// Audio device error
    #[error("audio device error: {0}")]
    AudioDevice(String),

    /// Audio stream error
    #[error("audio stream error: {0}")]
    AudioStream(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Capability not available on this install
    #[error("not available: {0}")]
    NotAvailable(String),

    /// A recognition run is already active
    #[error("busy: {0}")]
    Busy(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for rflink.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RflinkError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio capture stalled: no audio for {stalled_ms}ms")]
    CaptureStalled { stalled_ms: u64 },

    // Playback errors
    #[error("Audio playback failed: {message}")]
    Playback { message: String },

    // Transcription errors
    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    #[error("Transcription timed out after {timeout_ms}ms")]
    TranscriptionTimeout { timeout_ms: u64 },

    // Speech synthesis errors
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Agent dispatch errors
    #[error("Agent dispatch failed: {message}")]
    AgentDispatch { message: String },

    // Keying errors
    #[error("Key line open failed: {message}")]
    KeyLineOpen { message: String },

    #[error("Key line assert failed: {message}")]
    KeyAssert { message: String },

    /// The key line could not be deasserted after a transmission.
    /// A stuck transmitter is a fatal operational condition, not a
    /// recoverable turn failure.
    #[error("Key line deassert failed, transmitter may be stuck: {message}")]
    KeyDeassert { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RflinkError>;

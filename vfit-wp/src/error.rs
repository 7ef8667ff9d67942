//! Error types for vfit-wp
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the workout player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP server or client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    Audio(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Speech synthesis errors (cloud or on-device)
    #[error("Speech error: {0}")]
    Speech(String),

    /// Workout produced no playable steps
    #[error("Workout '{0}' has no playable steps")]
    EmptyWorkout(String),

    /// Workout produced a step that cannot be played
    #[error("Invalid workout: {0}")]
    InvalidWorkout(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Step index outside the sequence
    #[error("Step index {index} out of range (sequence has {len} steps)")]
    StepOutOfRange { index: usize, len: usize },

    /// Playback engine task is no longer running
    #[error("Playback engine stopped")]
    EngineStopped,

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] vfit_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

/// Convenience Result type using the vfit-wp Error
pub type Result<T> = std::result::Result<T, Error>;

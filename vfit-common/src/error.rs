//! Common error types for vfit

use thiserror::Error;

/// Common result type for vfit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across vfit components
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON payload could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// TOML document could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

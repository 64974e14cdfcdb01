//! Error types for the rep-sensing core.
//!
//! Numeric processing never fails. Only configuration loading and exercise
//! lookup by key can produce an error.

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Rep-sensing error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Exercise key does not name a supported exercise
    #[error("Unknown exercise: {0:?}")]
    UnknownExercise(String),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

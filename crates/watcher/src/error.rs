//! Error types for the monitor

use thiserror::Error;

/// Errors surfaced synchronously to monitor callers
///
/// Failures that happen inside a poll cycle never show up here; they go to
/// the diagnostic channel instead.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The monitor has been closed and cannot be used again
    #[error("Monitor is closed")]
    Closed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while loading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration file
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// The background poll thread could not be started
    #[error("Failed to spawn poll thread: {0}")]
    Spawn(String),
}

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

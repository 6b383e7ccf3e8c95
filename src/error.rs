//! # Error Types
//!
//! Custom error types for the telemetry unit using `thiserror`.

use thiserror::Error;

/// Main error type for the telemetry unit
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Telemetry frame encoding errors
    #[error("frame encoding error: {0}")]
    Frame(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the telemetry unit
pub type Result<T> = std::result::Result<T, TelemetryError>;

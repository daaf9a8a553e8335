//! Error types for kaotrack

use thiserror::Error;

/// Main error type for kaotrack
#[derive(Error, Debug)]
pub enum KaotrackError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Frame and packet decoding errors
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Frame parse error: {0}")]
    FrameParse(String),

    #[error("Packet parse error: {0}")]
    PacketParse(String),
}

/// Calibration misuse. Never fatal: the session stays usable for retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("No calibration session is collecting samples")]
    NotCollecting,

    #[error("Not enough calibration samples: {collected}/{required}")]
    InsufficientSamples { collected: usize, required: usize },
}

/// Result type alias for kaotrack operations
pub type Result<T> = std::result::Result<T, KaotrackError>;

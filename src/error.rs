//! # Error Types
//!
//! Custom error types for the station core using `thiserror`.
//!
//! Propagation policy: link and frame errors degrade to stale/fallback data
//! and are never fatal; persistence errors are logged through the notice
//! channel and swallowed; capacity and configuration errors are structural
//! and abort the affected subsystem.

use thiserror::Error;

/// Main error type for the station core
#[derive(Debug, Error)]
pub enum StationError {
    /// Serial link errors (open failure, read failure, device loss)
    #[error("link error: {0}")]
    Link(String),

    /// No enumerated serial port matched the configured device hint
    #[error("no serial port matching {0:?} was found")]
    PortNotFound(String),

    /// A telemetry frame field could not be parsed
    #[error("malformed telemetry field: {0}")]
    Frame(String),

    /// A channel series reached its fixed capacity
    #[error("series for {channel} is full ({capacity} samples)")]
    Capacity {
        channel: &'static str,
        capacity: usize,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// The unit conversion table is missing an ordered pair
    #[error("no conversion from {from} to {to} in the unit table")]
    MissingConversion {
        from: &'static str,
        to: &'static str,
    },

    /// Record store errors
    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the station core
pub type Result<T> = std::result::Result<T, StationError>;

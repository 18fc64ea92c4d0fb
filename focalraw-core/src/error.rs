//! Error types for focalraw-core.

use thiserror::Error;

/// Result type alias for focalraw operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types shared by all focalraw crates.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent start-up configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Calibration lookup failure.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Calibration or configuration file could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while loading tables.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a per-channel calibration lookup.
///
/// Callers decide whether a miss fails open or closed; both pad lookups
/// fail open.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    /// No entry for the requested (ASIC, channel).
    #[error("no calibration entry for ASIC {asic}, channel {channel}")]
    NotFound { asic: usize, channel: usize },
}

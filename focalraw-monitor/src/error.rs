//! Monitor error types.

use thiserror::Error;

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that escape the monitor.
///
/// Lost intervals and decode-local problems are absorbed into metrics and
/// logs; only start-up configuration problems and structural corruption
/// of a cycle input reach the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// A cycle input could not be walked. The cycle was aborted after
    /// flushing what had been aggregated so far.
    #[error("cycle aborted, source {source_name} is corrupted: {source}")]
    Corrupted {
        source_name: String,
        #[source]
        source: focalraw_io::Error,
    },

    /// I/O layer error outside of a cycle.
    #[error("I/O error: {0}")]
    IoError(#[from] focalraw_io::Error),

    /// Core library error, including invalid configuration.
    #[error("core error: {0}")]
    CoreError(#[from] focalraw_core::Error),
}

impl Error {
    /// Whether this error aborted a single cycle rather than start-up.
    #[must_use]
    pub fn is_cycle_error(&self) -> bool {
        matches!(self, Error::Corrupted { .. })
    }
}

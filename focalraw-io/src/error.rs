//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
///
/// Everything except [`Error::Io`] describes structural corruption of a
/// raw page stream.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Page header with `offset_to_next == 0`.
    #[error("page at offset {offset} does not advance (offset to next page is 0)")]
    StalledStream { offset: usize },

    /// Page header fields out of their declared bounds.
    #[error("malformed page header at offset {offset}: {reason}")]
    MalformedHeader { offset: usize, reason: String },

    /// Fewer bytes left than one page header.
    #[error("truncated page header at offset {offset}: {available} bytes left")]
    TruncatedHeader { offset: usize, available: usize },

    /// Page extends past the end of the buffer.
    #[error("page at offset {offset} ends at {end}, past buffer length {len}")]
    PageOverrun {
        offset: usize,
        end: usize,
        len: usize,
    },

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] focalraw_core::Error),
}

impl Error {
    /// Whether this error is structural corruption of the page stream.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !matches!(self, Error::Io(_) | Error::CoreError(_))
    }
}

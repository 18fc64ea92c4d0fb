//! Decoder error types.

use thiserror::Error;

/// Result type for decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by decoder and mapper calls.
#[derive(Error, Debug)]
pub enum Error {
    /// Pad decoder was handed a slice that is not exactly one event.
    #[error("pad event must be {expected} bytes, got {actual}")]
    PadEventSize { expected: usize, actual: usize },

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] focalraw_core::Error),
}

/// Decode-local pixel problems.
///
/// These never abort a decode call: the affected chip (or lane chunk) is
/// dropped and decoding resumes at the next chip header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PixelDecodeError {
    /// Byte outside a chip frame that is neither idle, busy nor padding.
    #[error("lane {lane}: unexpected byte {byte:#04x} outside chip frame")]
    UnexpectedByte { lane: u8, byte: u8 },

    /// Data word seen before any region header of the chip.
    #[error("lane {lane}, chip {chip_id}: data word before region header")]
    MissingRegion { lane: u8, chip_id: u8 },

    /// Chip frame not closed by a trailer.
    #[error("lane {lane}, chip {chip_id}: chip frame not terminated")]
    MissingTrailer { lane: u8, chip_id: u8 },

    /// Lane stream ends inside a multi-byte word.
    #[error("lane {lane}, chip {chip_id}: truncated data word")]
    Truncated { lane: u8, chip_id: u8 },

    /// DATA LONG hit map with the reserved top bit set.
    #[error("lane {lane}, chip {chip_id}: invalid hit map {hitmap:#04x}")]
    InvalidHitMap { lane: u8, chip_id: u8, hitmap: u8 },

    /// Pixel address past the end of the priority encoder.
    #[error("lane {lane}, chip {chip_id}: pixel address {address} out of range")]
    AddressOutOfRange { lane: u8, chip_id: u8, address: u16 },

    /// Lane data without an enclosing trigger header.
    #[error("lane {lane}: data before first trigger header")]
    DataBeforeTrigger { lane: u8 },

    /// GBT word with an id this decoder does not know.
    #[error("unknown GBT word id {0:#04x}")]
    UnknownWord(u8),

    /// Payload length is not a whole number of GBT words.
    #[error("payload ends with a partial GBT word of {0} bytes")]
    PartialWord(usize),
}

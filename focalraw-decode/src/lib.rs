//! focalraw-decode: FOCAL pad and pixel payload decoders.
//!
//! This crate turns reassembled payload bytes into records and maps pixel
//! chips onto the layer geometry.
//!
//! # Key Components
//!
//! - [`PadDecoder`] - Fixed-layout pad events, 18 ASICs of 80 records
//! - [`PixelDecoder`] - GBT words carrying ALPIDE lane streams
//! - [`PixelMapper`] - Chip positions and segment buckets for `IB`/`OB`
//! - [`PadMapper`] - Pad channel to pad cell layout
//!
//! # Word sizes
//!
//! Pad payloads are counted in [`PAD_WORD_SIZE`]-byte words, pixel payloads
//! in [`GBT_WORD_SIZE`]-byte GBT words. [`WordKind::count`] is the single
//! place that divides a payload length by either.

pub mod alpide;
mod error;
pub mod gbt;
pub mod mapping;
pub mod pad;
pub mod pixel;

pub use error::{Error, PixelDecodeError, Result};
pub use gbt::GBT_WORD_SIZE;
pub use mapping::{
    segment_grid_shape, segment_of, ChipPosition, InvalidChip, MappingVariant, PadMapper,
    PixelMapper, SensorGeometry,
};
pub use pad::PadDecoder;
pub use pixel::{PixelDecoder, PixelPayloadBuilder};

pub use focalraw_core::pad::PAD_WORD_SIZE;

/// Native word of a detector family's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    Pad,
    Gbt,
}

impl WordKind {
    /// Word size in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            WordKind::Pad => PAD_WORD_SIZE,
            WordKind::Gbt => GBT_WORD_SIZE,
        }
    }

    /// Splits `bytes` into `(whole words, leftover bytes)`.
    ///
    /// Callers should treat a non-zero remainder as a framing problem
    /// rather than trusting the word count.
    #[must_use]
    pub const fn count(self, bytes: usize) -> (usize, usize) {
        let size = self.size();
        (bytes / size, bytes % size)
    }
}

const _: () = {
    assert!(PAD_WORD_SIZE == 4);
    assert!(GBT_WORD_SIZE == 16);
    assert!(focalraw_core::pad::PAD_EVENT_BYTES % PAD_WORD_SIZE == 0);
};

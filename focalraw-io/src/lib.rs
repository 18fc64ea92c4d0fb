//! focalraw-io: Raw page streams for focalraw.
//!
//! This crate parses RDH page headers, reassembles per-trigger payloads
//! from multi-page streams, classifies lost intervals, and maps raw page
//! files into memory via memmap2.
//!

mod error;
pub mod rdh;
pub mod reassembler;
mod reader;
pub mod source;

pub use error::{Error, Result};
pub use rdh::{PageIter, RawPage, RawPageHeader, TriggerFlags, RDH_SIZE};
pub use reader::RawFileReader;
pub use reassembler::{
    word_kind_of, CompletePayload, PageWalker, ReassemblyState, Reassembler, PAD_LINK_ID,
};
pub use source::{is_lost_interval, RawSource, SourceKind};

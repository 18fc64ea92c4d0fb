//! focalraw-core: Shared record types and collaborator contracts for
//! FOCAL raw-data decoding.
//!
//! This crate provides the decoded pad and pixel records, the error
//! taxonomy shared by every focalraw crate, the [`MetricsSink`] contract
//! the pipeline fills, and the calibration lookups it queries.
//!

pub mod calibration;
pub mod error;
pub mod pad;
pub mod pixel;
pub mod sink;

pub use calibration::{
    Calibration, ChannelStatus, ChannelStatusSource, PadBadChannelMap, PedestalSource,
    PedestalTable,
};
pub use error::{Error, LookupError, Result};
pub use pad::{PadAsicEvent, PadAsicHeader, PadChannelKind, PadChannelRecord, PadEvent};
pub use pixel::{PixelChipRecord, PixelHit, PixelTriggerGroup};
pub use sink::{Fill, MetricSummary, MetricsSink, RecordingSink, SummarySink};

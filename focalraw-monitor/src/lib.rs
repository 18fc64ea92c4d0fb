//! focalraw-monitor: Cycle orchestration for FOCAL raw data.
//!
//! This crate drives the reassembler over the sources of a processing
//! cycle, routes every completed payload to the pad or pixel decoder and
//! turns the decoded records into metric fills.
//!
//! # Example
//!
//! ```ignore
//! use focalraw_core::{Calibration, SummarySink};
//! use focalraw_io::RawSource;
//! use focalraw_monitor::{MonitorConfig, RawMonitor};
//!
//! let mut monitor = RawMonitor::new(MonitorConfig::default(), Calibration::new())?;
//! let mut sink = SummarySink::new();
//! let summary = monitor.process_cycle(&[RawSource::direct("raw", &bytes)], &mut sink)?;
//! ```

pub mod config;
mod error;
pub mod metrics;
mod monitor;
pub mod pad;
pub mod pixel;

pub use config::MonitorConfig;
pub use error::{Error, Result};
pub use monitor::{CyclePhase, CycleSummary, RawMonitor};
pub use pad::{adc_is_valid, PadAggregator, PadPayloadStats};
pub use pixel::{PixelAggregator, PixelLink, PixelPayloadStats};

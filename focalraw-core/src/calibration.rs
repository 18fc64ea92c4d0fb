//! Calibration collaborators: pedestal values and pad channel status.
//!
//! Both are queried per channel per event. A miss is reported as
//! [`LookupError::NotFound`]; whether that fails open or closed is the
//! caller's policy.

use crate::error::LookupError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Source of per-channel pedestal values.
pub trait PedestalSource {
    /// Returns the pedestal of `(asic, channel)`.
    ///
    /// # Errors
    /// Returns [`LookupError::NotFound`] if the channel has no entry.
    fn get_pedestal(&self, asic: usize, channel: usize) -> std::result::Result<f64, LookupError>;
}

/// Quality status of a pad channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    #[default]
    Good,
    Bad,
    Dead,
}

impl ChannelStatus {
    /// Whether readings from this channel should be dropped.
    #[must_use]
    pub fn is_masked(self) -> bool {
        !matches!(self, ChannelStatus::Good)
    }
}

/// Source of per-channel quality status.
pub trait ChannelStatusSource {
    /// Returns the status of `(asic, channel)`.
    ///
    /// # Errors
    /// Returns [`LookupError::NotFound`] if the channel has no entry.
    fn get_channel_status(
        &self,
        asic: usize,
        channel: usize,
    ) -> std::result::Result<ChannelStatus, LookupError>;
}

#[derive(Deserialize)]
struct JsonPedestals {
    pedestals: Vec<JsonPedestal>,
}

#[derive(Deserialize)]
struct JsonPedestal {
    asic: usize,
    channel: usize,
    value: f64,
}

/// In-memory pedestal table keyed by `(asic, channel)`.
#[derive(Debug, Clone, Default)]
pub struct PedestalTable {
    values: HashMap<(usize, usize), f64>,
}

impl PedestalTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pedestal of one channel.
    #[must_use]
    pub fn with_pedestal(mut self, asic: usize, channel: usize, value: f64) -> Self {
        self.insert(asic, channel, value);
        self
    }

    pub fn insert(&mut self, asic: usize, channel: usize, value: f64) {
        self.values.insert((asic, channel), value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Loads a table from a JSON file of the form
    /// `{"pedestals": [{"asic": 0, "channel": 5, "value": 42.5}, ...]}`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let json: JsonPedestals = serde_json::from_reader(reader)?;
        Ok(Self::from_entries(json))
    }

    /// Parses a table from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid pedestal table.
    pub fn from_json(json: &str) -> Result<Self> {
        let json: JsonPedestals = serde_json::from_str(json)?;
        Ok(Self::from_entries(json))
    }

    fn from_entries(json: JsonPedestals) -> Self {
        let mut table = Self::new();
        for p in json.pedestals {
            table.insert(p.asic, p.channel, p.value);
        }
        table
    }
}

impl PedestalSource for PedestalTable {
    fn get_pedestal(&self, asic: usize, channel: usize) -> std::result::Result<f64, LookupError> {
        self.values
            .get(&(asic, channel))
            .copied()
            .ok_or(LookupError::NotFound { asic, channel })
    }
}

#[derive(Deserialize)]
struct JsonChannelMap {
    channels: Vec<JsonChannel>,
}

#[derive(Deserialize)]
struct JsonChannel {
    asic: usize,
    channel: usize,
    status: ChannelStatus,
}

/// In-memory bad-channel map keyed by `(asic, channel)`.
#[derive(Debug, Clone, Default)]
pub struct PadBadChannelMap {
    status: HashMap<(usize, usize), ChannelStatus>,
}

impl PadBadChannelMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_status(mut self, asic: usize, channel: usize, status: ChannelStatus) -> Self {
        self.insert(asic, channel, status);
        self
    }

    pub fn insert(&mut self, asic: usize, channel: usize, status: ChannelStatus) {
        self.status.insert((asic, channel), status);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.status.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_empty()
    }

    /// Loads a map from a JSON file of the form
    /// `{"channels": [{"asic": 0, "channel": 5, "status": "bad"}, ...]}`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let json: JsonChannelMap = serde_json::from_reader(reader)?;
        Ok(Self::from_entries(json))
    }

    /// Parses a map from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid channel map.
    pub fn from_json(json: &str) -> Result<Self> {
        let json: JsonChannelMap = serde_json::from_str(json)?;
        Ok(Self::from_entries(json))
    }

    fn from_entries(json: JsonChannelMap) -> Self {
        let mut map = Self::new();
        for c in json.channels {
            map.insert(c.asic, c.channel, c.status);
        }
        map
    }
}

impl ChannelStatusSource for PadBadChannelMap {
    fn get_channel_status(
        &self,
        asic: usize,
        channel: usize,
    ) -> std::result::Result<ChannelStatus, LookupError> {
        self.status
            .get(&(asic, channel))
            .copied()
            .ok_or(LookupError::NotFound { asic, channel })
    }
}

/// The calibration collaborators handed to the monitor at start-up.
///
/// Either part may be absent; the matching correction is then skipped.
#[derive(Default)]
pub struct Calibration {
    pub pedestals: Option<Box<dyn PedestalSource>>,
    pub channel_status: Option<Box<dyn ChannelStatusSource>>,
}

impl Calibration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pedestals(mut self, source: impl PedestalSource + 'static) -> Self {
        self.pedestals = Some(Box::new(source));
        self
    }

    #[must_use]
    pub fn with_channel_status(mut self, source: impl ChannelStatusSource + 'static) -> Self {
        self.channel_status = Some(Box::new(source));
        self
    }
}

impl std::fmt::Debug for Calibration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Calibration")
            .field("pedestals", &self.pedestals.is_some())
            .field("channel_status", &self.channel_status.is_some())
            .finish()
    }
}

//! Pixel (digital chip) record types.

use serde::{Deserialize, Serialize};

/// A fired pixel in local chip coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelHit {
    pub column: u16,
    pub row: u16,
}

impl PixelHit {
    #[inline]
    #[must_use]
    pub fn new(column: u16, row: u16) -> Self {
        Self { column, row }
    }
}

/// Hits of one chip within one trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelChipRecord {
    pub chip_id: u8,
    pub lane_id: u8,
    pub hits: Vec<PixelHit>,
}

impl PixelChipRecord {
    #[must_use]
    pub fn new(chip_id: u8, lane_id: u8) -> Self {
        Self {
            chip_id,
            lane_id,
            hits: Vec::new(),
        }
    }
}

/// All chips read out for one trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelTriggerGroup {
    /// `(orbit << 12) | bunch_crossing`, wrapping.
    pub trigger_id: u32,
    pub chips: Vec<PixelChipRecord>,
}

impl PixelTriggerGroup {
    #[must_use]
    pub fn new(trigger_id: u32) -> Self {
        Self {
            trigger_id,
            chips: Vec::new(),
        }
    }

    /// Packs orbit and bunch crossing into a trigger id.
    #[inline]
    #[must_use]
    pub fn trigger_id_of(orbit: u32, bunch_crossing: u16) -> u32 {
        (orbit << 12) | u32::from(bunch_crossing & 0x0FFF)
    }

    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.chips.iter().map(|c| c.hits.len()).sum()
    }
}

//! Pad (analog ASIC) record types and layout constants.

use serde::{Deserialize, Serialize};

/// Regular channels read out per ASIC.
pub const PAD_CHANNELS: usize = 76;
/// Common-mode noise words per ASIC (channel indices 76, 77).
pub const PAD_CMN_CHANNELS: usize = 2;
/// Calibration words per ASIC (channel indices 78, 79).
pub const PAD_CALIB_CHANNELS: usize = 2;
/// Records produced per ASIC block.
pub const PAD_RECORDS_PER_ASIC: usize = PAD_CHANNELS + PAD_CMN_CHANNELS + PAD_CALIB_CHANNELS;
/// Header words at the start of each ASIC block.
pub const PAD_HEADER_WORDS: usize = 2;
/// Words per ASIC block.
pub const PAD_WORDS_PER_ASIC: usize = PAD_HEADER_WORDS + PAD_RECORDS_PER_ASIC;
/// ASICs in one pad event.
pub const PAD_ASICS: usize = 18;
/// Words per pad event.
///
/// This is the crate's own 32-bit word framing of an event, not the count
/// of upstream 80-bit GBT words.
pub const PAD_WORDS_PER_EVENT: usize = PAD_WORDS_PER_ASIC * PAD_ASICS;
/// Size in bytes of one pad word.
pub const PAD_WORD_SIZE: usize = 4;
/// Size in bytes of one pad event.
pub const PAD_EVENT_BYTES: usize = PAD_WORDS_PER_EVENT * PAD_WORD_SIZE;

const _: () = assert!(PAD_EVENT_BYTES % PAD_WORD_SIZE == 0);

/// Role of a record inside an ASIC block, derived from its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadChannelKind {
    /// One of the 76 readout channels.
    Regular,
    /// Common-mode noise word.
    CommonMode,
    /// Calibration word.
    Calibration,
}

/// One decoded channel word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadChannelRecord {
    /// Position in the ASIC block, 0..80.
    pub channel_index: u8,
    pub adc: u16,
    pub toa: u16,
    pub tot: u16,
}

impl PadChannelRecord {
    #[must_use]
    pub fn new(channel_index: u8, adc: u16, toa: u16, tot: u16) -> Self {
        Self {
            channel_index,
            adc,
            toa,
            tot,
        }
    }

    /// TOT of zero marks a channel without signal.
    #[inline]
    #[must_use]
    pub fn has_signal(&self) -> bool {
        self.tot != 0
    }

    #[must_use]
    pub fn kind(&self) -> PadChannelKind {
        let idx = usize::from(self.channel_index);
        if idx < PAD_CHANNELS {
            PadChannelKind::Regular
        } else if idx < PAD_CHANNELS + PAD_CMN_CHANNELS {
            PadChannelKind::CommonMode
        } else {
            PadChannelKind::Calibration
        }
    }
}

/// Decoded ASIC header word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadAsicHeader {
    pub bunch_crossing: u16,
    pub event_count: u8,
    pub orbit: u8,
}

/// All records of one ASIC in one pad event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadAsicEvent {
    pub asic: usize,
    pub headers: [PadAsicHeader; PAD_HEADER_WORDS],
    /// Exactly [`PAD_RECORDS_PER_ASIC`] records in block order.
    pub channels: Vec<PadChannelRecord>,
}

impl PadAsicEvent {
    #[must_use]
    pub fn regular(&self) -> &[PadChannelRecord] {
        &self.channels[..PAD_CHANNELS.min(self.channels.len())]
    }

    #[must_use]
    pub fn extra(&self) -> &[PadChannelRecord] {
        &self.channels[PAD_CHANNELS.min(self.channels.len())..]
    }
}

/// One pad event: one [`PadAsicEvent`] per ASIC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadEvent {
    pub asics: Vec<PadAsicEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_layout() {
        assert_eq!(PAD_WORDS_PER_ASIC, 82);
        assert_eq!(PAD_WORDS_PER_EVENT, 1476);
        assert_eq!(PAD_EVENT_BYTES, 5904);
    }

    #[test]
    fn test_channel_kind() {
        assert_eq!(
            PadChannelRecord::new(0, 0, 0, 0).kind(),
            PadChannelKind::Regular
        );
        assert_eq!(
            PadChannelRecord::new(75, 0, 0, 0).kind(),
            PadChannelKind::Regular
        );
        assert_eq!(
            PadChannelRecord::new(77, 0, 0, 0).kind(),
            PadChannelKind::CommonMode
        );
        assert_eq!(
            PadChannelRecord::new(78, 0, 0, 0).kind(),
            PadChannelKind::Calibration
        );
    }

    #[test]
    fn test_zero_tot_has_no_signal() {
        assert!(!PadChannelRecord::new(5, 100, 200, 0).has_signal());
        assert!(PadChannelRecord::new(5, 100, 200, 1).has_signal());
    }
}

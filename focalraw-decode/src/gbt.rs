//! GBT word classification for pixel payloads.
//!
//! Each GBT word occupies 16 bytes in the payload, of which the first 10
//! are significant. Byte 9 carries the word id.

/// Bytes per GBT word in memory (10 significant + 6 padding).
pub const GBT_WORD_SIZE: usize = 16;
/// ALPIDE bytes carried by one data word.
pub const GBT_DATA_BYTES: usize = 9;

/// ITS header word id.
pub const ID_ITS_HEADER: u8 = 0xE0;
/// Trigger data header id.
pub const ID_TRIGGER_HEADER: u8 = 0xE8;
/// Trigger data trailer id.
pub const ID_TRIGGER_TRAILER: u8 = 0xF0;
/// Diagnostic data word id.
pub const ID_DIAGNOSTIC: u8 = 0xE4;
/// Calibration data word id.
pub const ID_CALIBRATION: u8 = 0xF8;

/// Number of lanes per OB connector.
const OB_LANES_PER_CONNECTOR: u8 = 7;

/// A classified GBT word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GbtWord<'a> {
    ItsHeader,
    TriggerHeader {
        trigger_type: u16,
        bunch_crossing: u16,
        orbit: u32,
    },
    TriggerTrailer,
    Diagnostic,
    Calibration,
    /// ALPIDE bytes for one lane.
    Data {
        lane: u8,
        bytes: &'a [u8],
    },
    Unknown(u8),
}

impl<'a> GbtWord<'a> {
    /// Classifies one 16-byte GBT word.
    ///
    /// # Panics
    /// Panics if `word` is shorter than 10 bytes.
    #[must_use]
    pub fn parse(word: &'a [u8]) -> Self {
        let id = word[9];
        match id {
            ID_ITS_HEADER => GbtWord::ItsHeader,
            ID_TRIGGER_HEADER => GbtWord::TriggerHeader {
                trigger_type: u16::from_le_bytes([word[0], word[1]]) & 0x0FFF,
                bunch_crossing: u16::from_le_bytes([word[2], word[3]]) & 0x0FFF,
                orbit: u32::from_le_bytes([word[4], word[5], word[6], word[7]]),
            },
            ID_TRIGGER_TRAILER => GbtWord::TriggerTrailer,
            ID_DIAGNOSTIC => GbtWord::Diagnostic,
            ID_CALIBRATION => GbtWord::Calibration,
            // IB: 0b001l_llll
            0x20..=0x3F => GbtWord::Data {
                lane: id & 0x1F,
                bytes: &word[..GBT_DATA_BYTES],
            },
            // OB: 0b01cc_clll
            0x40..=0x7F => {
                let connector = (id >> 3) & 0x7;
                GbtWord::Data {
                    lane: connector * OB_LANES_PER_CONNECTOR + (id & 0x7),
                    bytes: &word[..GBT_DATA_BYTES],
                }
            }
            other => GbtWord::Unknown(other),
        }
    }
}

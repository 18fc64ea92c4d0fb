//! Pad payload decoding.
//!
//! A pad event is a fixed run of 32-bit little-endian words: for every ASIC
//! two header words followed by 76 channel words, two common-mode words and
//! two calibration words. Decoding is purely positional.

use crate::{Error, Result};
use focalraw_core::pad::{
    PAD_ASICS, PAD_EVENT_BYTES, PAD_HEADER_WORDS, PAD_RECORDS_PER_ASIC, PAD_WORDS_PER_ASIC,
    PAD_WORD_SIZE,
};
use focalraw_core::{PadAsicEvent, PadAsicHeader, PadChannelRecord, PadEvent};

const ADC_MASK: u32 = 0x3FF;
const TOA_SHIFT: u32 = 10;
const TOA_MASK: u32 = 0x3FF;
const TOT_SHIFT: u32 = 20;
const TOT_MASK: u32 = 0xFFF;

/// Extracts ADC/TOA/TOT from a channel word.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn decode_channel_word(channel_index: u8, word: u32) -> PadChannelRecord {
    PadChannelRecord {
        channel_index,
        adc: (word & ADC_MASK) as u16,
        toa: ((word >> TOA_SHIFT) & TOA_MASK) as u16,
        tot: ((word >> TOT_SHIFT) & TOT_MASK) as u16,
    }
}

/// Packs ADC/TOA/TOT into a channel word. Out-of-range bits are dropped.
#[inline]
#[must_use]
pub fn encode_channel_word(adc: u16, toa: u16, tot: u16) -> u32 {
    (u32::from(adc) & ADC_MASK)
        | ((u32::from(toa) & TOA_MASK) << TOA_SHIFT)
        | ((u32::from(tot) & TOT_MASK) << TOT_SHIFT)
}

/// Extracts bunch crossing, event counter and orbit from a header word.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn decode_header_word(word: u32) -> PadAsicHeader {
    PadAsicHeader {
        bunch_crossing: ((word >> 16) & 0xFFF) as u16,
        event_count: ((word >> 10) & 0x3F) as u8,
        orbit: ((word >> 7) & 0x7) as u8,
    }
}

/// Packs a header word.
#[inline]
#[must_use]
pub fn encode_header_word(header: PadAsicHeader) -> u32 {
    ((u32::from(header.bunch_crossing) & 0xFFF) << 16)
        | ((u32::from(header.event_count) & 0x3F) << 10)
        | ((u32::from(header.orbit) & 0x7) << 7)
}

#[inline]
fn read_word(bytes: &[u8], index: usize) -> u32 {
    let o = index * PAD_WORD_SIZE;
    u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]])
}

/// Splits a payload into whole pad events and the leftover tail.
#[must_use]
pub fn split_events(payload: &[u8]) -> (std::slice::ChunksExact<'_, u8>, usize) {
    let chunks = payload.chunks_exact(PAD_EVENT_BYTES);
    let rest = chunks.remainder().len();
    (chunks, rest)
}

/// Decoder for single pad events.
///
/// Holds one pre-sized [`PadEvent`] that is overwritten on every call.
#[derive(Debug, Clone)]
pub struct PadDecoder {
    event: PadEvent,
}

impl Default for PadDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PadDecoder {
    #[must_use]
    pub fn new() -> Self {
        let asics = (0..PAD_ASICS)
            .map(|asic| PadAsicEvent {
                asic,
                headers: [PadAsicHeader::default(); PAD_HEADER_WORDS],
                channels: Vec::with_capacity(PAD_RECORDS_PER_ASIC),
            })
            .collect();
        Self {
            event: PadEvent { asics },
        }
    }

    /// Decodes exactly one pad event.
    ///
    /// # Errors
    /// Returns [`Error::PadEventSize`] if `bytes` is not one event long.
    #[allow(clippy::cast_possible_truncation)]
    pub fn decode_event(&mut self, bytes: &[u8]) -> Result<&PadEvent> {
        if bytes.len() != PAD_EVENT_BYTES {
            return Err(Error::PadEventSize {
                expected: PAD_EVENT_BYTES,
                actual: bytes.len(),
            });
        }

        for (asic_index, asic) in self.event.asics.iter_mut().enumerate() {
            let base = asic_index * PAD_WORDS_PER_ASIC;
            for (h, header) in asic.headers.iter_mut().enumerate() {
                *header = decode_header_word(read_word(bytes, base + h));
            }
            asic.channels.clear();
            let first = base + PAD_HEADER_WORDS;
            for ch in 0..PAD_RECORDS_PER_ASIC {
                asic.channels
                    .push(decode_channel_word(ch as u8, read_word(bytes, first + ch)));
            }
        }

        Ok(&self.event)
    }

    /// The most recently decoded event.
    #[must_use]
    pub fn event(&self) -> &PadEvent {
        &self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use focalraw_core::pad::{PAD_CHANNELS, PAD_WORDS_PER_EVENT};

    fn blank_event() -> Vec<u32> {
        vec![0u32; PAD_WORDS_PER_EVENT]
    }

    fn to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_channel_word_bit_fields() {
        let word = encode_channel_word(100, 200, 1);
        assert_eq!(word, 100 | (200 << 10) | (1 << 20));
        let rec = decode_channel_word(5, word);
        assert_eq!(rec, PadChannelRecord::new(5, 100, 200, 1));

        let full = decode_channel_word(0, 0xFFFF_FFFF);
        assert_eq!((full.adc, full.toa, full.tot), (1023, 1023, 4095));
    }

    #[test]
    fn test_header_word_bit_fields() {
        let header = PadAsicHeader {
            bunch_crossing: 0xABC,
            event_count: 0x2A,
            orbit: 5,
        };
        assert_eq!(decode_header_word(encode_header_word(header)), header);
    }

    #[test]
    fn test_decode_positions() {
        let mut words = blank_event();
        // ASIC 0, channel 5
        words[PAD_HEADER_WORDS + 5] = encode_channel_word(100, 200, 1);
        // ASIC 17, second calibration word
        words[17 * PAD_WORDS_PER_ASIC + PAD_HEADER_WORDS + 79] = encode_channel_word(7, 8, 9);
        // ASIC 3, first header
        words[3 * PAD_WORDS_PER_ASIC] = encode_header_word(PadAsicHeader {
            bunch_crossing: 12,
            event_count: 1,
            orbit: 2,
        });

        let mut decoder = PadDecoder::new();
        let event = decoder.decode_event(&to_bytes(&words)).unwrap();

        assert_eq!(event.asics.len(), PAD_ASICS);
        assert_eq!(event.asics[0].channels.len(), PAD_RECORDS_PER_ASIC);
        assert_eq!(event.asics[0].channels[5], PadChannelRecord::new(5, 100, 200, 1));
        assert_eq!(event.asics[17].channels[79], PadChannelRecord::new(79, 7, 8, 9));
        assert_eq!(event.asics[3].headers[0].bunch_crossing, 12);
        assert_eq!(event.asics[0].regular().len(), PAD_CHANNELS);
        assert_eq!(event.asics[0].extra().len(), 4);
    }

    #[test]
    fn test_wrong_size_rejected() {
        let mut decoder = PadDecoder::new();
        let err = decoder.decode_event(&[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            Error::PadEventSize {
                expected: PAD_EVENT_BYTES,
                actual: 16
            }
        ));
    }

    #[test]
    fn test_split_events() {
        let payload = vec![0u8; PAD_EVENT_BYTES * 2 + 12];
        let (events, rest) = split_events(&payload);
        assert_eq!(events.count(), 2);
        assert_eq!(rest, 12);
    }

    #[test]
    fn test_decoder_reuse_overwrites() {
        let mut words = blank_event();
        words[PAD_HEADER_WORDS] = encode_channel_word(1, 1, 1);
        let mut decoder = PadDecoder::new();
        decoder.decode_event(&to_bytes(&words)).unwrap();

        let event = decoder.decode_event(&to_bytes(&blank_event())).unwrap();
        assert_eq!(event.asics[0].channels[0], PadChannelRecord::new(0, 0, 0, 0));
        assert_eq!(event.asics[0].channels.len(), PAD_RECORDS_PER_ASIC);
    }
}

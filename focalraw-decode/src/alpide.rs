//! ALPIDE lane stream decoding.
//!
//! Byte codes of the per-lane stream:
//!
//! | code          | word                                  |
//! |---------------|---------------------------------------|
//! | `1010 cccc`   | chip header, followed by a BC byte    |
//! | `1110 cccc`   | chip empty frame, followed by a BC byte |
//! | `1011 ffff`   | chip trailer                          |
//! | `110r rrrr`   | region header                         |
//! | `01ee eeaa`   | data short, one more address byte     |
//! | `00ee eeaa`   | data long, address byte + hit map     |
//! | `1111 0001`   | busy on                               |
//! | `1111 0000`   | busy off                              |
//! | `1111 1111`   | idle                                  |

use crate::error::PixelDecodeError;
use focalraw_core::{PixelChipRecord, PixelHit};

const IDLE: u8 = 0xFF;
const BUSY_ON: u8 = 0xF1;
const BUSY_OFF: u8 = 0xF0;
const PADDING: u8 = 0x00;

/// Highest pixel address of one priority encoder.
pub const MAX_ADDRESS: u16 = 1023;

/// Converts a priority-encoder address to local chip coordinates.
#[inline]
#[must_use]
pub fn address_to_pixel(region: u8, encoder: u8, address: u16) -> PixelHit {
    let row = address >> 1;
    let column = u16::from(region) * 32 + u16::from(encoder) * 2 + ((address & 1) ^ (row & 1));
    PixelHit { column, row }
}

/// Inverse of [`address_to_pixel`]: `(region, encoder, address)`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn pixel_to_address(hit: PixelHit) -> (u8, u8, u16) {
    let region = (hit.column / 32) as u8;
    let in_region = hit.column % 32;
    let encoder = (in_region / 2) as u8;
    let address = hit.row * 2 + ((in_region & 1) ^ (hit.row & 1));
    (region, encoder, address)
}

enum LaneState {
    Idle,
    InChip {
        record: PixelChipRecord,
        region: Option<u8>,
    },
    /// Dropping bytes of a corrupted chip until the next frame boundary.
    Skipping,
}

/// Decodes the concatenated ALPIDE bytes of one lane.
///
/// Completed chips are appended to `chips` in stream order. A corrupted
/// chip is dropped with an entry in `errors` and decoding resumes at the
/// next chip header.
pub fn decode_lane(
    lane: u8,
    bytes: &[u8],
    chips: &mut Vec<PixelChipRecord>,
    errors: &mut Vec<PixelDecodeError>,
) {
    let mut state = LaneState::Idle;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        state = match state {
            LaneState::Idle => match b {
                IDLE | BUSY_ON | BUSY_OFF | PADDING => {
                    i += 1;
                    LaneState::Idle
                }
                0xA0..=0xAF | 0xE0..=0xEF => {
                    let chip_id = b & 0x0F;
                    if i + 1 >= bytes.len() {
                        errors.push(PixelDecodeError::Truncated { lane, chip_id });
                        i = bytes.len();
                        LaneState::Idle
                    } else {
                        i += 2;
                        let record = PixelChipRecord::new(chip_id, lane);
                        if b & 0xF0 == 0xE0 {
                            chips.push(record);
                            LaneState::Idle
                        } else {
                            LaneState::InChip {
                                record,
                                region: None,
                            }
                        }
                    }
                }
                _ => {
                    errors.push(PixelDecodeError::UnexpectedByte { lane, byte: b });
                    i += 1;
                    LaneState::Idle
                }
            },
            LaneState::Skipping => match b {
                0xA0..=0xAF | 0xE0..=0xEF => LaneState::Idle,
                0xB0..=0xBF => {
                    i += 1;
                    LaneState::Idle
                }
                _ => {
                    i += 1;
                    LaneState::Skipping
                }
            },
            LaneState::InChip { mut record, region } => {
                let chip_id = record.chip_id;
                match b {
                    0xB0..=0xBF => {
                        chips.push(record);
                        i += 1;
                        LaneState::Idle
                    }
                    0xC0..=0xDF => {
                        i += 1;
                        LaneState::InChip {
                            record,
                            region: Some(b & 0x1F),
                        }
                    }
                    IDLE | BUSY_ON | BUSY_OFF => {
                        i += 1;
                        LaneState::InChip { record, region }
                    }
                    0xA0..=0xAF | 0xE0..=0xEF => {
                        // next frame starts without a trailer; reprocess b
                        errors.push(PixelDecodeError::MissingTrailer { lane, chip_id });
                        LaneState::Idle
                    }
                    0x00..=0x7F => match decode_data_word(lane, &mut record, region, &bytes[i..]) {
                        Ok(consumed) => {
                            i += consumed;
                            LaneState::InChip { record, region }
                        }
                        Err(e) => {
                            errors.push(e);
                            i += 1;
                            LaneState::Skipping
                        }
                    },
                    _ => {
                        errors.push(PixelDecodeError::UnexpectedByte { lane, byte: b });
                        i += 1;
                        LaneState::Skipping
                    }
                }
            }
        };
    }

    if let LaneState::InChip { record, .. } = state {
        errors.push(PixelDecodeError::MissingTrailer {
            lane,
            chip_id: record.chip_id,
        });
    }
}

/// Decodes one DATA SHORT or DATA LONG word at the start of `bytes`,
/// returning the number of bytes consumed.
fn decode_data_word(
    lane: u8,
    record: &mut PixelChipRecord,
    region: Option<u8>,
    bytes: &[u8],
) -> Result<usize, PixelDecodeError> {
    let chip_id = record.chip_id;
    let region = region.ok_or(PixelDecodeError::MissingRegion { lane, chip_id })?;
    let is_long = bytes[0] & 0x40 == 0;
    let len = if is_long { 3 } else { 2 };
    if bytes.len() < len {
        return Err(PixelDecodeError::Truncated { lane, chip_id });
    }

    let encoder = (bytes[0] >> 2) & 0x0F;
    let address = (u16::from(bytes[0] & 0x03) << 8) | u16::from(bytes[1]);
    record.hits.push(address_to_pixel(region, encoder, address));

    if is_long {
        let hitmap = bytes[2];
        if hitmap & 0x80 != 0 {
            return Err(PixelDecodeError::InvalidHitMap {
                lane,
                chip_id,
                hitmap,
            });
        }
        for k in 0..7u16 {
            if hitmap & (1 << k) != 0 {
                let next = address + k + 1;
                if next > MAX_ADDRESS {
                    return Err(PixelDecodeError::AddressOutOfRange {
                        lane,
                        chip_id,
                        address: next,
                    });
                }
                record.hits.push(address_to_pixel(region, encoder, next));
            }
        }
    }

    Ok(len)
}

/// Appends a complete chip frame for `hits` to `out`.
///
/// Hits are written as DATA SHORT words grouped by region; an empty hit
/// list produces a chip empty frame.
pub fn encode_chip_frame(chip_id: u8, bunch_crossing: u8, hits: &[PixelHit], out: &mut Vec<u8>) {
    let chip_id = chip_id & 0x0F;
    if hits.is_empty() {
        out.push(0xE0 | chip_id);
        out.push(bunch_crossing);
        return;
    }

    out.push(0xA0 | chip_id);
    out.push(bunch_crossing);

    let mut addressed: Vec<(u8, u8, u16)> = hits.iter().map(|h| pixel_to_address(*h)).collect();
    addressed.sort_unstable_by_key(|&(region, _, _)| region);

    let mut current_region = None;
    for (region, encoder, address) in addressed {
        if current_region != Some(region) {
            out.push(0xC0 | (region & 0x1F));
            current_region = Some(region);
        }
        #[allow(clippy::cast_possible_truncation)]
        let (hi, lo) = ((address >> 8) as u8 & 0x03, (address & 0xFF) as u8);
        out.push(0x40 | (encoder << 2) | hi);
        out.push(lo);
    }

    out.push(0xB0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> (Vec<PixelChipRecord>, Vec<PixelDecodeError>) {
        let mut chips = Vec::new();
        let mut errors = Vec::new();
        decode_lane(2, bytes, &mut chips, &mut errors);
        (chips, errors)
    }

    #[test]
    fn test_address_mapping_round_trip_corners() {
        for hit in [
            PixelHit::new(0, 0),
            PixelHit::new(1, 0),
            PixelHit::new(0, 1),
            PixelHit::new(1023, 511),
            PixelHit::new(10, 20),
            PixelHit::new(10, 21),
        ] {
            let (r, e, a) = pixel_to_address(hit);
            assert_eq!(address_to_pixel(r, e, a), hit);
        }
    }

    #[test]
    fn test_data_short() {
        // chip 3, region 1, encoder 2, address 5 -> row 2, col 32 + 4 + 1
        let bytes = [0xA3, 0x10, 0xC1, 0x40 | (2 << 2), 0x05, 0xB0];
        let (chips, errors) = decode(&bytes);
        assert!(errors.is_empty());
        assert_eq!(chips.len(), 1);
        assert_eq!(chips[0].chip_id, 3);
        assert_eq!(chips[0].lane_id, 2);
        assert_eq!(chips[0].hits, vec![PixelHit::new(37, 2)]);
    }

    #[test]
    fn test_data_long_hitmap() {
        // address 0 plus hit map bits 0 and 2 -> addresses 0, 1, 3
        let bytes = [0xA0, 0x00, 0xC0, 0x00, 0x00, 0b0000_0101, 0xB0];
        let (chips, errors) = decode(&bytes);
        assert!(errors.is_empty());
        assert_eq!(
            chips[0].hits,
            vec![
                address_to_pixel(0, 0, 0),
                address_to_pixel(0, 0, 1),
                address_to_pixel(0, 0, 3)
            ]
        );
    }

    #[test]
    fn test_empty_frame_and_idles() {
        let bytes = [0xFF, 0xF1, 0xE5, 0x22, 0xF0, 0x00, 0x00];
        let (chips, errors) = decode(&bytes);
        assert!(errors.is_empty());
        assert_eq!(chips.len(), 1);
        assert_eq!(chips[0].chip_id, 5);
        assert!(chips[0].hits.is_empty());
    }

    #[test]
    fn test_bad_chip_does_not_stop_next_chip() {
        let mut bytes = vec![
            // chip 1: data before region header
            0xA1, 0x00, 0x40, 0x01, 0xB0,
        ];
        encode_chip_frame(2, 0, &[PixelHit::new(4, 4)], &mut bytes);
        let (chips, errors) = decode(&bytes);
        assert_eq!(
            errors,
            vec![PixelDecodeError::MissingRegion {
                lane: 2,
                chip_id: 1
            }]
        );
        assert_eq!(chips.len(), 1);
        assert_eq!(chips[0].chip_id, 2);
        assert_eq!(chips[0].hits, vec![PixelHit::new(4, 4)]);
    }

    #[test]
    fn test_missing_trailer() {
        let mut bytes = vec![0xA1, 0x00, 0xC0];
        encode_chip_frame(4, 0, &[], &mut bytes);
        bytes.extend_from_slice(&[0xA6, 0x00, 0xC0]);
        let (chips, errors) = decode(&bytes);
        assert_eq!(chips.len(), 1);
        assert_eq!(chips[0].chip_id, 4);
        assert_eq!(
            errors,
            vec![
                PixelDecodeError::MissingTrailer {
                    lane: 2,
                    chip_id: 1
                },
                PixelDecodeError::MissingTrailer {
                    lane: 2,
                    chip_id: 6
                },
            ]
        );
    }

    #[test]
    fn test_invalid_hitmap_and_truncation() {
        let (chips, errors) = decode(&[0xA0, 0x00, 0xC0, 0x00, 0x00, 0x80, 0xB0]);
        assert!(chips.is_empty());
        assert!(matches!(
            errors[0],
            PixelDecodeError::InvalidHitMap { hitmap: 0x80, .. }
        ));

        let (chips, errors) = decode(&[0xA0, 0x00, 0xC0, 0x41]);
        assert!(chips.is_empty());
        assert_eq!(
            errors,
            vec![PixelDecodeError::Truncated {
                lane: 2,
                chip_id: 0
            }]
        );
    }

    #[test]
    fn test_unexpected_byte_outside_chip() {
        let (chips, errors) = decode(&[0x85, 0xFF]);
        assert!(chips.is_empty());
        assert_eq!(
            errors,
            vec![PixelDecodeError::UnexpectedByte {
                lane: 2,
                byte: 0x85
            }]
        );
    }

    #[test]
    fn test_encode_groups_regions() {
        let hits = [
            PixelHit::new(100, 3),
            PixelHit::new(1, 1),
            PixelHit::new(101, 3),
        ];
        let mut bytes = Vec::new();
        encode_chip_frame(7, 9, &hits, &mut bytes);
        let (chips, errors) = decode(&bytes);
        assert!(errors.is_empty());
        let mut decoded = chips[0].hits.clone();
        decoded.sort_by_key(|h| (h.column, h.row));
        let mut expected = hits.to_vec();
        expected.sort_by_key(|h| (h.column, h.row));
        assert_eq!(decoded, expected);
    }
}

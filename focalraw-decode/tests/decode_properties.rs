#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_lossless,
    clippy::unreadable_literal
)]
use focalraw_core::pad::{PAD_ASICS, PAD_HEADER_WORDS, PAD_WORDS_PER_ASIC, PAD_WORDS_PER_EVENT};
use focalraw_core::PixelHit;
use focalraw_decode::pad::encode_channel_word;
use focalraw_decode::{PadDecoder, PixelDecodeError, PixelDecoder, PixelMapper, PixelPayloadBuilder};
use focalraw_decode::MappingVariant;

// Every channel gets a distinct (adc, toa, tot) derived from its position.
fn patterned_pad_event() -> (Vec<u8>, Vec<(u16, u16, u16)>) {
    let mut words = vec![0u32; PAD_WORDS_PER_EVENT];
    let mut expected = Vec::new();
    for asic in 0..PAD_ASICS {
        for ch in 0..80 {
            let adc = ((asic * 80 + ch) % 1024) as u16;
            let toa = ((asic * 7 + ch * 3) % 1024) as u16;
            let tot = ((ch % 40) + 1) as u16;
            words[asic * PAD_WORDS_PER_ASIC + PAD_HEADER_WORDS + ch] =
                encode_channel_word(adc, toa, tot);
            expected.push((adc, toa, tot));
        }
    }
    (words.iter().flat_map(|w| w.to_le_bytes()).collect(), expected)
}

#[test]
fn test_pad_round_trip_with_permissive_cut() {
    let (bytes, expected) = patterned_pad_event();
    let tot_cut = 4096u16;

    let mut decoder = PadDecoder::new();
    let event = decoder.decode_event(&bytes).unwrap();

    let decoded: Vec<(u16, u16, u16)> = event
        .asics
        .iter()
        .flat_map(|a| a.channels.iter())
        .filter(|c| c.tot < tot_cut)
        .map(|c| (c.adc, c.toa, c.tot))
        .collect();
    assert_eq!(decoded, expected);
}

#[test]
fn test_pad_decoding_is_idempotent() {
    let (bytes, _) = patterned_pad_event();
    let mut decoder = PadDecoder::new();
    let first = decoder.decode_event(&bytes).unwrap().clone();
    let second = decoder.decode_event(&bytes).unwrap().clone();
    assert_eq!(first, second);

    let mut fresh = PadDecoder::new();
    assert_eq!(fresh.decode_event(&bytes).unwrap(), &first);
}

fn mixed_pixel_payload() -> Vec<u8> {
    PixelPayloadBuilder::new()
        .its_header()
        .trigger(3, 100)
        .chip(0, 0, &[PixelHit::new(1, 1)])
        // chip 1: trailer missing, next chip header starts a new frame
        .raw_lane(1, &[0xA1, 0x00, 0xC0, 0x40, 0x02])
        .chip(1, 2, &[PixelHit::new(2, 2), PixelHit::new(3, 3)])
        .chip(4, 4, &[])
        .trailer()
        .trigger(3, 101)
        .chip(5, 5, &[PixelHit::new(900, 400)])
        .trailer()
        .finish()
}

#[test]
fn test_pixel_corruption_is_isolated_to_one_chip() {
    let mut decoder = PixelDecoder::new();
    let groups = decoder.decode(&mixed_pixel_payload()).to_vec();

    assert_eq!(
        decoder.errors(),
        &[PixelDecodeError::MissingTrailer {
            lane: 1,
            chip_id: 1
        }]
    );
    assert_eq!(groups.len(), 2);

    let first: Vec<(u8, usize)> = groups[0]
        .chips
        .iter()
        .map(|c| (c.chip_id, c.hits.len()))
        .collect();
    assert_eq!(first, vec![(0, 1), (2, 2), (4, 0)]);
    assert_eq!(groups[1].chips[0].hits, vec![PixelHit::new(900, 400)]);
}

#[test]
fn test_pixel_decoding_is_idempotent() {
    let payload = mixed_pixel_payload();
    let mut decoder = PixelDecoder::new();
    let first = decoder.decode(&payload).to_vec();
    let first_errors = decoder.errors().to_vec();
    let second = decoder.decode(&payload).to_vec();
    assert_eq!(first, second);
    assert_eq!(first_errors, decoder.errors());
}

#[test]
fn test_out_of_table_chip_leaves_others_mapped() {
    let payload = PixelPayloadBuilder::new()
        .trigger(0, 1)
        .chip(0, 3, &[PixelHit::new(10, 20)])
        .chip(1, 12, &[PixelHit::new(5, 5)])
        .chip(2, 5, &[PixelHit::new(6, 6)])
        .trailer()
        .finish();

    let mut decoder = PixelDecoder::new();
    let groups = decoder.decode(&payload);
    let mapper = PixelMapper::new(MappingVariant::Ib);

    let results: Vec<bool> = groups[0]
        .chips
        .iter()
        .map(|c| mapper.position_of(c.chip_id, c.lane_id, 0x0001).is_ok())
        .collect();
    assert_eq!(results, vec![true, false, true]);
}

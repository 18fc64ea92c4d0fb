//! Pixel payload decoding.
//!
//! A pixel payload is a run of GBT words. Trigger data headers open a
//! trigger; data words carry ALPIDE bytes for one lane. Lane bytes are
//! collected until the trigger is closed (trailer, next header or end of
//! payload) and then decoded lane by lane.

use crate::alpide::{decode_lane, encode_chip_frame};
use crate::error::PixelDecodeError;
use crate::gbt::{
    GbtWord, GBT_DATA_BYTES, GBT_WORD_SIZE, ID_ITS_HEADER, ID_TRIGGER_HEADER, ID_TRIGGER_TRAILER,
};
use focalraw_core::{PixelChipRecord, PixelHit, PixelTriggerGroup};

struct LaneBuffer {
    lane: u8,
    bytes: Vec<u8>,
}

/// Decoder for pixel payloads.
///
/// Output of the last [`decode`](Self::decode) call stays available until
/// the next one.
#[derive(Default)]
pub struct PixelDecoder {
    groups: Vec<PixelTriggerGroup>,
    errors: Vec<PixelDecodeError>,
    lanes: Vec<LaneBuffer>,
    chips: Vec<PixelChipRecord>,
    current_trigger: Option<u32>,
}

impl PixelDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all output and scratch state.
    pub fn reset(&mut self) {
        self.groups.clear();
        self.errors.clear();
        self.lanes.clear();
        self.chips.clear();
        self.current_trigger = None;
    }

    /// Decodes one payload into trigger groups.
    ///
    /// Groups keep the order in which their triggers first appear; chips
    /// within a group keep lane order of first appearance, then stream
    /// order within the lane.
    pub fn decode(&mut self, payload: &[u8]) -> &[PixelTriggerGroup] {
        self.reset();

        let mut words = payload.chunks_exact(GBT_WORD_SIZE);
        for word in &mut words {
            match GbtWord::parse(word) {
                GbtWord::TriggerHeader {
                    bunch_crossing,
                    orbit,
                    ..
                } => {
                    self.flush();
                    self.current_trigger =
                        Some(PixelTriggerGroup::trigger_id_of(orbit, bunch_crossing));
                }
                GbtWord::TriggerTrailer => self.flush(),
                GbtWord::Data { lane, bytes } => self.push_lane(lane, bytes),
                GbtWord::ItsHeader | GbtWord::Diagnostic | GbtWord::Calibration => {}
                GbtWord::Unknown(id) => self.errors.push(PixelDecodeError::UnknownWord(id)),
            }
        }
        self.flush();

        let rest = words.remainder().len();
        if rest > 0 {
            self.errors.push(PixelDecodeError::PartialWord(rest));
        }

        &self.groups
    }

    /// Trigger groups of the last payload.
    #[must_use]
    pub fn groups(&self) -> &[PixelTriggerGroup] {
        &self.groups
    }

    /// Decode-local errors of the last payload.
    #[must_use]
    pub fn errors(&self) -> &[PixelDecodeError] {
        &self.errors
    }

    fn push_lane(&mut self, lane: u8, bytes: &[u8]) {
        match self.lanes.iter_mut().find(|l| l.lane == lane) {
            Some(buffer) => buffer.bytes.extend_from_slice(bytes),
            None => self.lanes.push(LaneBuffer {
                lane,
                bytes: bytes.to_vec(),
            }),
        }
    }

    fn flush(&mut self) {
        if self.lanes.is_empty() {
            return;
        }

        let Some(trigger_id) = self.current_trigger else {
            for buffer in &self.lanes {
                self.errors
                    .push(PixelDecodeError::DataBeforeTrigger { lane: buffer.lane });
            }
            self.lanes.clear();
            return;
        };

        self.chips.clear();
        for buffer in &self.lanes {
            decode_lane(buffer.lane, &buffer.bytes, &mut self.chips, &mut self.errors);
        }
        self.lanes.clear();

        let group = match self.groups.iter().position(|g| g.trigger_id == trigger_id) {
            Some(idx) => &mut self.groups[idx],
            None => {
                self.groups.push(PixelTriggerGroup::new(trigger_id));
                let last = self.groups.len() - 1;
                &mut self.groups[last]
            }
        };
        group.chips.append(&mut self.chips);
        log::trace!(
            "trigger {trigger_id:#010x}: {} chip(s) after flush",
            group.chips.len()
        );
    }
}

/// Builds pixel payloads from chip hit lists.
///
/// Lanes use inner-barrel data word ids (`0x20 | lane`); every ALPIDE
/// stream is padded with idles to whole data words.
#[derive(Debug, Default)]
pub struct PixelPayloadBuilder {
    bytes: Vec<u8>,
}

impl PixelPayloadBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push_word(&mut self, id: u8, payload: &[u8]) {
        let mut word = [0u8; GBT_WORD_SIZE];
        word[..payload.len()].copy_from_slice(payload);
        word[9] = id;
        self.bytes.extend_from_slice(&word);
    }

    /// ITS header word.
    #[must_use]
    pub fn its_header(mut self) -> Self {
        self.push_word(ID_ITS_HEADER, &[]);
        self
    }

    /// Trigger data header for `(orbit, bunch_crossing)`.
    #[must_use]
    pub fn trigger(mut self, orbit: u32, bunch_crossing: u16) -> Self {
        let mut payload = [0u8; 8];
        payload[2..4].copy_from_slice(&(bunch_crossing & 0x0FFF).to_le_bytes());
        payload[4..8].copy_from_slice(&orbit.to_le_bytes());
        self.push_word(ID_TRIGGER_HEADER, &payload);
        self
    }

    /// One chip frame on `lane`.
    #[must_use]
    pub fn chip(self, lane: u8, chip_id: u8, hits: &[PixelHit]) -> Self {
        let mut stream = Vec::new();
        encode_chip_frame(chip_id, 0, hits, &mut stream);
        self.raw_lane(lane, &stream)
    }

    /// Arbitrary ALPIDE bytes on `lane`, padded with idles.
    #[must_use]
    pub fn raw_lane(mut self, lane: u8, stream: &[u8]) -> Self {
        for chunk in stream.chunks(GBT_DATA_BYTES) {
            let mut data = [0xFFu8; GBT_DATA_BYTES];
            data[..chunk.len()].copy_from_slice(chunk);
            self.push_word(0x20 | (lane & 0x1F), &data);
        }
        self
    }

    /// Trigger data trailer.
    #[must_use]
    pub fn trailer(mut self) -> Self {
        self.push_word(ID_TRIGGER_TRAILER, &[]);
        self
    }

    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

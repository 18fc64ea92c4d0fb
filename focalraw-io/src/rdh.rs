//! Raw data header (RDH v6/v7) parsing.
//!
//! Every page of the raw stream starts with a 64-byte little-endian header:
//!
//! | offset | size | field            |
//! |-------:|-----:|------------------|
//! | 0      | 1    | version          |
//! | 1      | 1    | header size      |
//! | 2      | 2    | FEE id           |
//! | 5      | 1    | system id        |
//! | 8      | 2    | offset to next   |
//! | 10     | 2    | memory size      |
//! | 12     | 1    | GBT link         |
//! | 13     | 1    | packet counter   |
//! | 16     | 2    | trigger BC       |
//! | 20     | 4    | trigger orbit    |
//! | 32     | 4    | trigger type     |
//! | 36     | 2    | pages counter    |
//! | 38     | 1    | stop bit         |

use crate::{Error, Result};
use bitflags::bitflags;
use std::fmt;

/// Size of an RDH in bytes.
pub const RDH_SIZE: usize = 64;
const RDH_SIZE_U8: u8 = 64;
const RDH_SIZE_U16: u16 = 64;

bitflags! {
    /// Trigger type bits of a page.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TriggerFlags: u32 {
        const ORBIT = 0x1;
        const HB = 0x2;
        const HB_REJECT = 0x4;
        const HEALTH_CHECK = 0x8;
        const PHYSICS = 0x10;
        const PREPULSE = 0x20;
        const CALIBRATION = 0x40;
        const SOT = 0x80;
        const EOT = 0x100;
        const SOC = 0x200;
        const EOC = 0x400;
        const TF = 0x800;
    }
}

/// Parsed page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPageHeader {
    pub version: u8,
    pub header_size: u8,
    /// FEE id; selects the detector system and, for pixels, the FEE.
    pub link_id: u16,
    pub system_id: u8,
    pub offset_to_next: u16,
    pub memory_size: u16,
    pub gbt_link: u8,
    pub packet_counter: u8,
    pub bunch_crossing: u16,
    pub orbit: u32,
    pub trigger: TriggerFlags,
    pub pages_counter: u16,
    pub stop: bool,
}

impl RawPageHeader {
    /// Header for `link_id` with no payload and no flags set.
    #[must_use]
    pub fn new(link_id: u16) -> Self {
        Self {
            version: 7,
            header_size: RDH_SIZE_U8,
            link_id,
            system_id: 0,
            offset_to_next: RDH_SIZE_U16,
            memory_size: RDH_SIZE_U16,
            gbt_link: 0,
            packet_counter: 0,
            bunch_crossing: 0,
            orbit: 0,
            trigger: TriggerFlags::empty(),
            pages_counter: 0,
            stop: false,
        }
    }

    #[must_use]
    pub fn with_trigger(mut self, trigger: TriggerFlags) -> Self {
        self.trigger = trigger;
        self
    }

    #[must_use]
    pub fn with_stop(mut self, stop: bool) -> Self {
        self.stop = stop;
        self
    }

    #[must_use]
    pub fn with_orbit(mut self, orbit: u32, bunch_crossing: u16) -> Self {
        self.orbit = orbit;
        self.bunch_crossing = bunch_crossing & 0x0FFF;
        self
    }

    #[must_use]
    pub fn with_pages_counter(mut self, pages_counter: u16) -> Self {
        self.pages_counter = pages_counter;
        self
    }

    /// Parses the header at the start of `bytes` without bounds checks on
    /// the field values.
    ///
    /// # Errors
    /// Returns [`Error::TruncatedHeader`] if fewer than [`RDH_SIZE`] bytes
    /// are available.
    pub fn parse(bytes: &[u8], offset: usize) -> Result<Self> {
        if bytes.len() < RDH_SIZE {
            return Err(Error::TruncatedHeader {
                offset,
                available: bytes.len(),
            });
        }
        let u16_at = |o: usize| u16::from_le_bytes([bytes[o], bytes[o + 1]]);
        let u32_at =
            |o: usize| u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);

        Ok(Self {
            version: bytes[0],
            header_size: bytes[1],
            link_id: u16_at(2),
            system_id: bytes[5],
            offset_to_next: u16_at(8),
            memory_size: u16_at(10),
            gbt_link: bytes[12],
            packet_counter: bytes[13],
            bunch_crossing: u16_at(16) & 0x0FFF,
            orbit: u32_at(20),
            trigger: TriggerFlags::from_bits_retain(u32_at(32)),
            pages_counter: u16_at(36),
            stop: bytes[38] & 0x1 != 0,
        })
    }

    /// Serializes the header into its 64-byte wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; RDH_SIZE] {
        let mut b = [0u8; RDH_SIZE];
        b[0] = self.version;
        b[1] = self.header_size;
        b[2..4].copy_from_slice(&self.link_id.to_le_bytes());
        b[5] = self.system_id;
        b[8..10].copy_from_slice(&self.offset_to_next.to_le_bytes());
        b[10..12].copy_from_slice(&self.memory_size.to_le_bytes());
        b[12] = self.gbt_link;
        b[13] = self.packet_counter;
        b[16..18].copy_from_slice(&(self.bunch_crossing & 0x0FFF).to_le_bytes());
        b[20..24].copy_from_slice(&self.orbit.to_le_bytes());
        b[32..36].copy_from_slice(&self.trigger.bits().to_le_bytes());
        b[36..38].copy_from_slice(&self.pages_counter.to_le_bytes());
        b[38] = u8::from(self.stop);
        b
    }

    /// Appends this header followed by `payload` to `out`, setting
    /// `memory_size` and `offset_to_next` to the page length.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if the page does not fit the
    /// 16-bit size fields or the header size is below [`RDH_SIZE`].
    pub fn write_page(mut self, payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let header_size = usize::from(self.header_size);
        let size = u16::try_from(header_size + payload.len())
            .ok()
            .filter(|_| header_size >= RDH_SIZE)
            .ok_or_else(|| Error::MalformedHeader {
                offset: out.len(),
                reason: format!(
                    "cannot write page of {} payload bytes with header size {header_size}",
                    payload.len()
                ),
            })?;
        self.memory_size = size;
        self.offset_to_next = size;
        out.extend_from_slice(&self.to_bytes());
        out.resize(out.len() + header_size - RDH_SIZE, 0);
        out.extend_from_slice(payload);
        Ok(())
    }

    /// Payload bytes carried by this page.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        usize::from(self.memory_size).saturating_sub(usize::from(self.header_size))
    }

    /// Whether this page opens a trigger window (SOT or HB without stop).
    #[must_use]
    pub fn opens_trigger(&self) -> bool {
        self.trigger.intersects(TriggerFlags::SOT | TriggerFlags::HB) && !self.stop
    }

    fn validate(&self, offset: usize) -> Result<()> {
        let malformed = |reason: String| Error::MalformedHeader { offset, reason };
        if self.version != 6 && self.version != 7 {
            return Err(malformed(format!("unsupported RDH version {}", self.version)));
        }
        if usize::from(self.header_size) < RDH_SIZE {
            return Err(malformed(format!(
                "header size {} below {RDH_SIZE}",
                self.header_size
            )));
        }
        if self.offset_to_next == 0 {
            return Err(Error::StalledStream { offset });
        }
        if self.memory_size < u16::from(self.header_size) {
            return Err(malformed(format!(
                "memory size {} below header size {}",
                self.memory_size, self.header_size
            )));
        }
        if self.offset_to_next < self.memory_size {
            return Err(malformed(format!(
                "offset to next page {} below memory size {}",
                self.offset_to_next, self.memory_size
            )));
        }
        Ok(())
    }
}

impl fmt::Display for RawPageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RDH v{} fee {:#06x} sys {} link {} pkt {} | orbit {} bc {} trg {:#05x} | \
             hdr {} mem {} next {} | page {} stop {}",
            self.version,
            self.link_id,
            self.system_id,
            self.gbt_link,
            self.packet_counter,
            self.orbit,
            self.bunch_crossing,
            self.trigger.bits(),
            self.header_size,
            self.memory_size,
            self.offset_to_next,
            self.pages_counter,
            u8::from(self.stop)
        )
    }
}

/// A validated page borrowing its payload from the stream.
#[derive(Debug, Clone, Copy)]
pub struct RawPage<'a> {
    pub offset: usize,
    pub header: RawPageHeader,
    pub payload: &'a [u8],
}

impl<'a> RawPage<'a> {
    /// Parses and validates the page starting at `offset` in `data`.
    ///
    /// # Errors
    /// Returns a structural error if the header is truncated, out of bounds,
    /// does not advance, or the page runs past the end of `data`.
    pub fn parse_at(data: &'a [u8], offset: usize) -> Result<Self> {
        let header = RawPageHeader::parse(&data[offset.min(data.len())..], offset)?;
        header.validate(offset)?;

        let end = offset + usize::from(header.memory_size);
        if end > data.len() {
            return Err(Error::PageOverrun {
                offset,
                end,
                len: data.len(),
            });
        }
        let payload = &data[offset + usize::from(header.header_size)..end];
        Ok(Self {
            offset,
            header,
            payload,
        })
    }

    /// Offset of the following page.
    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.offset + usize::from(self.header.offset_to_next)
    }
}

/// Iterator over the pages of a buffer.
///
/// Stops after the first structural error, which it yields.
pub struct PageIter<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> PageIter<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for PageIter<'a> {
    type Item = Result<RawPage<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        match RawPage::parse_at(self.data, self.pos) {
            Ok(page) => {
                self.pos = page.next_offset();
                Some(Ok(page))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

//! Trigger payload reassembly.
//!
//! Pages of one trigger are spread over several RDH pages of the same link.
//! The reassembler collects their payloads into a single buffer between the
//! page that opens the trigger (SOT or HB, no stop bit) and the page that
//! carries the stop bit.

use crate::rdh::RawPage;
use crate::Result;
use focalraw_decode::WordKind;

/// Link id reserved for the pad system.
pub const PAD_LINK_ID: u16 = 0xCAFE;

/// Word kind of payloads on `link_id`.
#[must_use]
pub fn word_kind_of(link_id: u16) -> WordKind {
    if link_id == PAD_LINK_ID {
        WordKind::Pad
    } else {
        WordKind::Gbt
    }
}

/// Reassembly state. At most one link accumulates at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReassemblyState {
    #[default]
    WaitingForStart,
    Accumulating {
        link_id: u16,
    },
}

/// The payload of one finished trigger.
#[derive(Debug, Clone, Copy)]
pub struct CompletePayload<'a> {
    pub link_id: u16,
    pub bytes: &'a [u8],
    /// Pages that contributed payload bytes.
    pub pages: usize,
}

/// Single-buffer trigger reassembler.
///
/// State survives across buffers, so a trigger may continue from one
/// [`walk`](Self::walk) to the next until [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct Reassembler {
    state: ReassemblyState,
    buffer: Vec<u8>,
    pages: usize,
    /// Set when `buffer` was handed out and must be cleared before reuse.
    consumed: bool,
    debug: bool,
}

impl Reassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dumps every page header at info level.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn state(&self) -> ReassemblyState {
        self.state
    }

    /// Bytes collected for the open trigger.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        if self.consumed {
            0
        } else {
            self.buffer.len()
        }
    }

    /// Drops any open trigger. The buffer keeps its capacity.
    pub fn reset(&mut self) {
        log::trace!("reassembler reset from {:?}", self.state);
        self.state = ReassemblyState::WaitingForStart;
        self.buffer.clear();
        self.pages = 0;
        self.consumed = false;
    }

    /// Ends the current interval, dropping an unterminated trigger.
    ///
    /// Returns the number of bytes dropped.
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending_len();
        if dropped > 0 {
            if let ReassemblyState::Accumulating { link_id } = self.state {
                log::warn!(
                    "dropping {dropped} bytes of unterminated trigger on link {link_id:#06x}"
                );
            }
        }
        self.reset();
        dropped
    }

    /// Walks the pages of `data`.
    pub fn walk<'r, 'd>(&'r mut self, data: &'d [u8]) -> PageWalker<'r, 'd> {
        PageWalker {
            reassembler: self,
            data,
            pos: 0,
        }
    }

    fn take_consumed(&mut self) {
        if self.consumed {
            self.buffer.clear();
            self.pages = 0;
            self.consumed = false;
        }
    }

    /// Feeds one page; returns the link whose trigger completed, if any.
    fn feed(&mut self, page: &RawPage<'_>) -> Option<u16> {
        let header = &page.header;
        let link = header.link_id;

        if self.debug {
            log::info!("{header}");
        }
        if !page.payload.is_empty() {
            let (words, rest) = word_kind_of(link).count(page.payload.len());
            log::debug!(
                "page at {}: fee {link:#06x} ({}), payload {} bytes ({words} words), stop {}",
                page.offset,
                if link == PAD_LINK_ID { "Pads" } else { "Pixels" },
                page.payload.len(),
                header.stop
            );
            if rest != 0 {
                log::warn!(
                    "page at {}: payload of {} bytes is not a whole number of words ({rest} left over)",
                    page.offset,
                    page.payload.len()
                );
            }
        }

        if header.opens_trigger() {
            if let ReassemblyState::Accumulating { link_id } = self.state {
                if link_id != link && !self.buffer.is_empty() {
                    log::warn!(
                        "trigger on link {link_id:#06x} not terminated before link {link:#06x} started; dropping {} bytes",
                        self.buffer.len()
                    );
                    self.buffer.clear();
                    self.pages = 0;
                }
            }
            log::trace!("new trigger window on link {link:#06x}");
            self.state = ReassemblyState::Accumulating { link_id: link };
        }

        if !page.payload.is_empty() {
            match self.state {
                ReassemblyState::WaitingForStart => {
                    self.state = ReassemblyState::Accumulating { link_id: link };
                    self.append(page.payload);
                }
                ReassemblyState::Accumulating { link_id } if link_id == link => {
                    self.append(page.payload);
                }
                ReassemblyState::Accumulating { link_id } => {
                    log::warn!(
                        "page at {} from link {link:#06x} while link {link_id:#06x} is open; {} bytes dropped",
                        page.offset,
                        page.payload.len()
                    );
                }
            }
        }

        if header.stop {
            match self.state {
                ReassemblyState::Accumulating { link_id } if link_id == link => {
                    log::debug!(
                        "stop bit on link {link:#06x}: {} bytes from {} page(s)",
                        self.buffer.len(),
                        self.pages
                    );
                    self.state = ReassemblyState::WaitingForStart;
                    self.consumed = true;
                    return Some(link_id);
                }
                ReassemblyState::Accumulating { link_id } => {
                    log::warn!(
                        "stop bit from link {link:#06x} while link {link_id:#06x} is open; ignored"
                    );
                }
                ReassemblyState::WaitingForStart => {
                    log::trace!("stop bit on link {link:#06x} without open trigger");
                }
            }
        }

        None
    }

    fn append(&mut self, payload: &[u8]) {
        self.buffer.extend_from_slice(payload);
        self.pages += 1;
    }
}

/// Lending iterator over the completed triggers of one buffer.
pub struct PageWalker<'r, 'd> {
    reassembler: &'r mut Reassembler,
    data: &'d [u8],
    pos: usize,
}

impl PageWalker<'_, '_> {
    /// Advances to the next completed trigger.
    ///
    /// The returned payload borrows the reassembler buffer and is valid
    /// until the next call.
    ///
    /// # Errors
    /// Returns a structural error for a truncated, malformed or
    /// non-advancing page. The walker must not be used afterwards.
    pub fn next_payload(&mut self) -> Result<Option<CompletePayload<'_>>> {
        self.reassembler.take_consumed();

        let link_id = loop {
            if self.pos >= self.data.len() {
                return Ok(None);
            }
            let page = RawPage::parse_at(self.data, self.pos)?;
            self.pos = page.next_offset();
            if let Some(link) = self.reassembler.feed(&page) {
                break link;
            }
        };

        Ok(Some(CompletePayload {
            link_id,
            bytes: &self.reassembler.buffer,
            pages: self.reassembler.pages,
        }))
    }

    /// Byte offset of the next page.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }
}

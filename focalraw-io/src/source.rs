//! Named raw byte sources and the lost-interval check.

use crate::rdh::PageIter;
use crate::Result;

/// How a source reaches the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Full raw stream of the readout.
    Direct,
    /// Sampled copy of the raw stream.
    Sampled,
}

/// One input buffer of a processing cycle.
#[derive(Debug, Clone, Copy)]
pub struct RawSource<'a> {
    pub name: &'a str,
    pub kind: SourceKind,
    pub data: &'a [u8],
}

impl<'a> RawSource<'a> {
    #[must_use]
    pub fn direct(name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            kind: SourceKind::Direct,
            data,
        }
    }

    #[must_use]
    pub fn sampled(name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            kind: SourceKind::Sampled,
            data,
        }
    }

    /// Total page payload bytes in this source.
    ///
    /// # Errors
    /// Returns the first structural error met while walking the pages.
    pub fn payload_bytes(&self) -> Result<usize> {
        let mut total = 0;
        for page in PageIter::new(self.data) {
            total += page?.payload.len();
        }
        Ok(total)
    }

    /// Whether any page carries payload. Stops at the first one that does.
    ///
    /// # Errors
    /// Returns a structural error met before the first payload page.
    pub fn has_payload(&self) -> Result<bool> {
        for page in PageIter::new(self.data) {
            if !page?.payload.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Whether the cycle made of `sources` is a lost interval.
///
/// A cycle is lost when any source carries no page payload at all, either
/// because it is empty or because all of its pages are header-only.
/// Pages after the first payload page are not inspected; their structure
/// is checked when the source is walked.
///
/// # Errors
/// Returns the first structural error met before a source's first payload.
pub fn is_lost_interval(sources: &[RawSource<'_>]) -> Result<bool> {
    for source in sources {
        if !source.has_payload()? {
            log::warn!(
                "source {} ({:?}) has no payload; interval lost",
                source.name,
                source.kind
            );
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdh::{RawPageHeader, TriggerFlags};

    fn stream(payloads: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for p in payloads {
            RawPageHeader::new(1)
                .with_trigger(TriggerFlags::HB)
                .write_page(p, &mut out)
                .unwrap();
        }
        out
    }

    #[test]
    fn test_header_only_source_is_lost() {
        let empty_pages = stream(&[&[], &[]]);
        let full = stream(&[&[1, 2]]);
        assert!(is_lost_interval(&[RawSource::direct("raw", &empty_pages)]).unwrap());
        assert!(is_lost_interval(&[
            RawSource::direct("raw", &full),
            RawSource::sampled("sampled", &empty_pages)
        ])
        .unwrap());
    }

    #[test]
    fn test_empty_buffer_is_lost() {
        assert!(is_lost_interval(&[RawSource::direct("raw", &[])]).unwrap());
    }

    #[test]
    fn test_payload_source_is_not_lost() {
        let full = stream(&[&[], &[1]]);
        assert!(!is_lost_interval(&[RawSource::direct("raw", &full)]).unwrap());
        assert!(!is_lost_interval(&[]).unwrap());
    }

    #[test]
    fn test_check_stops_at_first_payload() {
        let mut data = stream(&[&[1], &[2]]);
        // corrupt the second page; the first already carries payload
        data[65 + 8] = 0;
        data[65 + 9] = 0;
        let source = RawSource::direct("raw", &data);
        assert!(source.has_payload().unwrap());
        assert!(!is_lost_interval(&[source]).unwrap());
        assert!(source.payload_bytes().is_err());
    }

    #[test]
    fn test_structural_error_propagates() {
        let mut bad = stream(&[&[1]]);
        bad[8] = 0;
        bad[9] = 0;
        assert!(is_lost_interval(&[RawSource::direct("raw", &bad)]).is_err());
    }
}

//! Memory-mapped raw page files.
//!

use crate::rdh::PageIter;
use crate::source::{RawSource, SourceKind};
use crate::Result;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A raw page file mapped into memory.
///
/// Uses memmap2 so that large readout dumps are walked in place without
/// copying them into a buffer first.
pub struct RawFileReader {
    mmap: Option<Arc<Mmap>>,
    path: PathBuf,
    name: String,
}

impl RawFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // Mapping a zero-length file fails on some platforms.
        let mmap = if file.metadata()?.len() == 0 {
            None
        } else {
            // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
            // This is the standard safety contract for memory mapping.
            #[allow(unsafe_code)]
            let mmap = unsafe { Mmap::map(&file)? };
            Some(Arc::new(mmap))
        };
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();
        log::debug!("mapped {name} ({} bytes)", mmap.as_ref().map_or(0, |m| m.len()));
        Ok(Self { mmap, path, name })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterates over the pages of the file.
    pub fn pages(&self) -> PageIter<'_> {
        PageIter::new(self.as_bytes())
    }

    /// Borrows the file as a cycle input named after its path.
    #[must_use]
    pub fn source(&self, kind: SourceKind) -> RawSource<'_> {
        RawSource {
            name: &self.name,
            kind,
            data: self.as_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdh::{RawPageHeader, TriggerFlags};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_and_iterate_pages() {
        let mut data = Vec::new();
        RawPageHeader::new(0xCAFE)
            .with_trigger(TriggerFlags::SOT)
            .write_page(&[1, 2, 3, 4], &mut data)
            .unwrap();
        RawPageHeader::new(0xCAFE)
            .with_stop(true)
            .write_page(&[], &mut data)
            .unwrap();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let reader = RawFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), data.len());
        assert_eq!(reader.as_bytes(), &data[..]);

        let pages: Vec<_> = reader.pages().collect::<Result<_>>().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].payload, &[1, 2, 3, 4]);
        assert!(pages[1].header.stop);

        let source = reader.source(SourceKind::Sampled);
        assert_eq!(source.kind, SourceKind::Sampled);
        assert_eq!(source.payload_bytes().unwrap(), 4);
    }

    #[test]
    fn test_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let reader = RawFileReader::open(file.path()).unwrap();
        assert!(reader.is_empty());
        assert_eq!(reader.pages().count(), 0);
    }

    #[test]
    fn test_missing_file() {
        assert!(RawFileReader::open("/nonexistent/focal.raw").is_err());
    }
}

//! Physical memory backend for raw memory images.
//!
//! A raw image is a flat copy of physical memory: byte `n` of the file is
//! physical address `n`. Images are static, so the background refresh engine
//! never runs over this backend.

mod error;

use std::{fs::File, path::Path};

use memmap2::Mmap;
use memproc_core::{DeviceInfo, Gfn, MappedPage, PAGE_SIZE, Pa, PhysicalMemory, VmmError};

pub use self::error::Error;

/// Physical memory backend for a raw memory image.
pub struct FileDriver {
    mmap: Mmap,
}

impl FileDriver {
    /// Opens and maps a raw memory image.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;

        if file.metadata()?.len() == 0 {
            return Err(Error::Empty);
        }

        // SAFETY: The image is opened read-only and is not expected to be
        // modified while it is being analyzed.
        let mmap = unsafe { Mmap::map(&file)? };

        tracing::debug!(path = %path.display(), size = mmap.len(), "mapped memory image");

        Ok(Self { mmap })
    }

    /// Returns the size of the image in bytes.
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Checks if the image is empty.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

impl PhysicalMemory for FileDriver {
    fn info(&self) -> Result<DeviceInfo, VmmError> {
        Ok(DeviceInfo::file(Pa(self.len())))
    }

    fn read_page(&self, gfn: Gfn) -> Result<MappedPage, VmmError> {
        let pa = gfn.pa();

        let start = match usize::try_from(pa.0) {
            Ok(start) if start < self.mmap.len() => start,
            _ => return Err(VmmError::PageNotPresent(pa)),
        };

        let end = self.mmap.len().min(start + PAGE_SIZE as usize);

        // The tail of an image that is not page-aligned reads as zeros.
        let mut page = vec![0u8; PAGE_SIZE as usize];
        page[..end - start].copy_from_slice(&self.mmap[start..end]);

        Ok(MappedPage::new(page))
    }
}

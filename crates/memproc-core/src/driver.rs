use crate::{DeviceInfo, Gfn, MappedPage, Pa, VmmError};

/// A source of raw physical memory.
///
/// Implementations wrap a dump file, a live acquisition device or a remote
/// proxy. They are shared between the refresh engine and reader threads.
pub trait PhysicalMemory: Send + Sync {
    /// Describes the backend.
    fn info(&self) -> Result<DeviceInfo, VmmError>;

    /// Reads a single 4KB page of physical memory.
    fn read_page(&self, gfn: Gfn) -> Result<MappedPage, VmmError>;

    /// Re-queries the highest physical address of a backend whose memory
    /// map may grow at runtime.
    ///
    /// Backends with a fixed memory size return `None`.
    fn max_address(&self) -> Option<Pa> {
        None
    }
}

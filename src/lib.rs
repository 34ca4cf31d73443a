//! Process view and cache maintenance for physical memory analysis.
//!
//! This crate re-exports [`memproc_core`] together with the optional
//! backends and OS heuristics:
//!
//! - `driver-file`: raw memory images, under [`driver::file`].
//! - `os-windows`: symbol-less Windows heuristics, under [`os::windows`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use memproc::{NoOs, Pa, Vmm, VmmConfig, driver::file::FileDriver};
//!
//! # fn main() -> Result<(), memproc::VmmError> {
//! let driver = FileDriver::new("memory.raw")?;
//! let config = VmmConfig::default().with_paging_root(Pa(0x1aa000));
//!
//! let vmm = Arc::new(Vmm::new(driver, NoOs, config)?);
//! vmm.initialize()?;
//!
//! for process in vmm.processes().generation().iter() {
//!     println!("{} {} {}", process.id(), process.name(), process.dtb());
//! }
//! # Ok(())
//! # }
//! ```

pub use memproc_core::*;

/// Physical memory backends.
pub mod driver {
    /// Raw memory image backend.
    #[cfg(feature = "driver-file")]
    pub mod file {
        pub use memproc_driver_file::*;
    }
}

/// Operating system support.
pub mod os {
    /// Windows heuristics.
    #[cfg(feature = "os-windows")]
    pub mod windows {
        pub use memproc_os_windows::*;
    }
}

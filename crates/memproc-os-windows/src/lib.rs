//! Windows kernel heuristics that work without debug symbols.
//!
//! The main entry point is [`scan_for_paging_root`], which walks physical
//! memory looking for the `System` process object and recovers the kernel
//! paging root (DTB/CR3) from it. [`find_paging_root`] verifies a single
//! candidate inside an already read buffer.
//!
//! ```no_run
//! # use memproc_core::{Pa, PhysicalMemory, VmmError};
//! # fn example(driver: &impl PhysicalMemory) -> Result<(), VmmError> {
//! let max_address = driver.info()?.max_address;
//!
//! if let Some(dtb) = memproc_os_windows::scan_for_paging_root(driver, Pa(0)..max_address)? {
//!     println!("kernel paging root: {dtb}");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod layout;
mod scan;

pub use self::{
    error::WindowsError,
    layout::EprocessLayout,
    scan::{
        find_paging_root, find_paging_root_with_layout, scan_for_paging_root,
        scan_for_paging_root_with_layout,
    },
};

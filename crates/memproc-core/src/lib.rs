//! Core of a live memory analysis engine.
//!
//! [`Vmm`] ties together a [`PhysicalMemory`] backend and an OS collaborator
//! implementing [`VmmOs`]. It keeps a reference-counted [`ProcessRegistry`]
//! that is swapped one generation at a time, a set of cache domains guarded
//! by one coordination lock, and a background engine that periodically
//! invalidates those caches and refreshes the process list when the backend
//! is volatile.

mod cache;
mod config;
mod core;
mod driver;
mod error;
mod init;
mod notify;
mod os;
mod page;
mod process;
pub mod refresh;
mod stats;
mod vmm;

pub use self::{
    cache::VmmCache,
    config::VmmConfig,
    core::{DeviceInfo, Gfn, PAGE_MASK, PAGE_SHIFT, PAGE_SIZE, Pa, Va},
    driver::PhysicalMemory,
    error::VmmError,
    notify::{RefreshEvent, VmmNotify},
    os::{MemoryModel, NoOs, OsDetection, SystemType, VmmOs},
    page::MappedPage,
    process::{Generation, NewProcess, Process, ProcessFlags, ProcessId, ProcessRegistry},
    refresh::{RefreshActions, RefreshSchedule, RefreshState},
    stats::{VmmStatistics, VmmStatisticsSnapshot},
    vmm::{Vmm, VmmGuard},
};

//! Background cache maintenance.
//!
//! A single worker thread wakes up every [`RefreshSchedule::tick_period`],
//! works out which domains are due and runs them as one batch under the
//! global coordination lock, in a fixed order:
//!
//! 1. physical-page cache, paging-structure cache and the negative set,
//! 2. translation cache,
//! 3. partial or total process refresh, followed by the kernel object
//!    namespace (total only) and PFN metadata,
//! 4. registry hives, user profiles and the physical memory map.
//!
//! A failed process refresh stops the worker for good.

mod engine;
mod schedule;
mod thread;

pub use self::{
    schedule::{RefreshActions, RefreshSchedule},
    thread::RefreshState,
};
pub(crate) use self::thread::RefreshThread;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters for cache maintenance and process refresh events.
#[derive(Debug, Default)]
pub struct VmmStatistics {
    phys_refresh_cache: AtomicU64,
    page_refresh_cache: AtomicU64,
    tlb_refresh_cache: AtomicU64,
    process_refresh_partial: AtomicU64,
    process_refresh_full: AtomicU64,
    process_create_failed: AtomicU64,
    process_enumerate_failed: AtomicU64,
    registry_refresh: AtomicU64,
}

/// A point-in-time copy of [`VmmStatistics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmmStatisticsSnapshot {
    /// Physical-page cache clears.
    pub phys_refresh_cache: u64,

    /// Paging-structure cache clears.
    pub page_refresh_cache: u64,

    /// Translation cache clears.
    pub tlb_refresh_cache: u64,

    /// Partial process-list refreshes.
    pub process_refresh_partial: u64,

    /// Total process-list refreshes.
    pub process_refresh_full: u64,

    /// Process entries rejected during construction.
    pub process_create_failed: u64,

    /// Kernel process-list walks that reported an error.
    pub process_enumerate_failed: u64,

    /// Registry and object refreshes.
    pub registry_refresh: u64,
}

macro_rules! counters {
    ($($field:ident => $inc:ident),* $(,)?) => {
        impl VmmStatistics {
            $(
                pub(crate) fn $inc(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*

            /// Returns the current value of all counters.
            pub fn snapshot(&self) -> VmmStatisticsSnapshot {
                VmmStatisticsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)*
                }
            }
        }
    };
}

counters! {
    phys_refresh_cache => inc_phys_refresh_cache,
    page_refresh_cache => inc_page_refresh_cache,
    tlb_refresh_cache => inc_tlb_refresh_cache,
    process_refresh_partial => inc_process_refresh_partial,
    process_refresh_full => inc_process_refresh_full,
    process_create_failed => inc_process_create_failed,
    process_enumerate_failed => inc_process_enumerate_failed,
    registry_refresh => inc_registry_refresh,
}

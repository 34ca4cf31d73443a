use serde::{Deserialize, Serialize};

use crate::{Pa, RefreshSchedule, VmmCache};

/// Startup options of the process view.
///
/// Properties of the memory backend itself (volatility, remoteness) are not
/// configured here; they are reported by the driver through
/// [`DeviceInfo`](crate::DeviceInfo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmmConfig {
    /// User-supplied paging root (DTB/CR3).
    ///
    /// Passed to OS detection as a hint, and used to build a single flat
    /// 64-bit process if detection fails.
    pub paging_root: Option<Pa>,

    /// Never start the background refresh engine, even on a volatile
    /// backend.
    pub disable_background_refresh: bool,

    /// Replaces the cadence table otherwise derived from the backend.
    pub schedule: Option<RefreshSchedule>,

    /// Capacity of the physical-page cache.
    pub physical_cache_size: usize,

    /// Capacity of the paging-structure cache.
    pub paging_cache_size: usize,

    /// Capacity of the translation cache.
    pub tlb_cache_size: usize,
}

impl Default for VmmConfig {
    fn default() -> Self {
        Self {
            paging_root: None,
            disable_background_refresh: false,
            schedule: None,
            physical_cache_size: VmmCache::DEFAULT_SIZE,
            paging_cache_size: VmmCache::DEFAULT_SIZE,
            tlb_cache_size: VmmCache::DEFAULT_SIZE,
        }
    }
}

impl VmmConfig {
    /// Sets the user-supplied paging root.
    pub fn with_paging_root(self, paging_root: impl Into<Pa>) -> Self {
        Self {
            paging_root: Some(paging_root.into()),
            ..self
        }
    }

    /// Disables the background refresh engine.
    pub fn with_background_refresh_disabled(self) -> Self {
        Self {
            disable_background_refresh: true,
            ..self
        }
    }

    /// Overrides the refresh cadences.
    pub fn with_schedule(self, schedule: RefreshSchedule) -> Self {
        Self {
            schedule: Some(schedule),
            ..self
        }
    }

    /// Sets the capacity of all three LRU cache domains.
    pub fn with_cache_size(self, size: usize) -> Self {
        Self {
            physical_cache_size: size,
            paging_cache_size: size,
            tlb_cache_size: size,
            ..self
        }
    }
}

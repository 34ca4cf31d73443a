use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DeviceInfo;

bitflags::bitflags! {
    /// Maintenance actions due on a refresh tick.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RefreshActions: u8 {
        /// Clear the physical-page and paging-structure caches and the
        /// negative "paging failed" set.
        const PHYS = 0b00000001;

        /// Clear the translation cache.
        const TLB = 0b00000010;

        /// Update the live process generation in place.
        const PROCESS_PARTIAL = 0b00000100;

        /// Rebuild the process generation from scratch.
        const PROCESS_TOTAL = 0b00001000;

        /// Refresh registry hives, user profiles and the physical memory map.
        const REGISTRY = 0b00010000;

        /// Either kind of process refresh.
        const PROCESS = Self::PROCESS_PARTIAL.bits() | Self::PROCESS_TOTAL.bits();
    }
}

/// Cadences of the background refresh engine.
///
/// Every interval is expressed in ticks of [`tick_period`]. An interval of
/// zero disables the domain.
///
/// [`tick_period`]: Self::tick_period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSchedule {
    /// Sleep between two ticks.
    pub tick_period: Duration,

    /// Physical-page and paging-structure cache clear interval.
    pub phys: u64,

    /// Translation cache clear interval.
    pub tlb: u64,

    /// Partial process refresh interval.
    pub process_partial: u64,

    /// Total process refresh interval.
    pub process_total: u64,

    /// Registry and object refresh interval.
    pub registry: u64,
}

impl RefreshSchedule {
    /// Cadences for a local acquisition device.
    ///
    /// 0.5s physical, 5s translation, 5s partial and 15s total process
    /// refresh, 5min registry.
    pub const LOCAL: Self = Self {
        tick_period: Duration::from_millis(100),
        phys: 5,
        tlb: 50,
        process_partial: 50,
        process_total: 150,
        registry: 3000,
    };

    /// Cadences for a remote device, where every read is expensive.
    ///
    /// 15s physical, 3min translation, 15s partial and 3min total process
    /// refresh, 10min registry.
    pub const REMOTE: Self = Self {
        tick_period: Duration::from_millis(100),
        phys: 150,
        tlb: 1800,
        process_partial: 150,
        process_total: 1800,
        registry: 6000,
    };

    /// Selects the cadence table for the given backend.
    pub fn for_device(device: &DeviceInfo) -> Self {
        if device.remote {
            Self::REMOTE
        }
        else {
            Self::LOCAL
        }
    }

    /// Returns the (action, interval) table evaluated on each tick.
    pub fn domains(&self) -> [(RefreshActions, u64); 5] {
        [
            (RefreshActions::PHYS, self.phys),
            (RefreshActions::TLB, self.tlb),
            (RefreshActions::PROCESS_PARTIAL, self.process_partial),
            (RefreshActions::PROCESS_TOTAL, self.process_total),
            (RefreshActions::REGISTRY, self.registry),
        ]
    }

    /// Returns the actions due on the given tick.
    ///
    /// A total process refresh supersedes a partial one due on the same
    /// tick.
    pub fn due(&self, tick: u64) -> RefreshActions {
        let mut actions = RefreshActions::empty();

        for (action, interval) in self.domains() {
            if interval != 0 && tick % interval == 0 {
                actions |= action;
            }
        }

        if actions.contains(RefreshActions::PROCESS_TOTAL) {
            actions.remove(RefreshActions::PROCESS_PARTIAL);
        }

        actions
    }

    /// Returns the wall-clock interval of a single domain.
    ///
    /// Returns `None` for a disabled domain or if `action` is not exactly one
    /// domain.
    pub fn interval(&self, action: RefreshActions) -> Option<Duration> {
        let (_, ticks) = self
            .domains()
            .into_iter()
            .find(|(domain, _)| *domain == action)?;

        match ticks {
            0 => None,
            ticks => Some(self.tick_period * u32::try_from(ticks).ok()?),
        }
    }
}

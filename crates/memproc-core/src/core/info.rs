use serde::{Deserialize, Serialize};

use crate::Pa;

/// Describes the physical memory backend.
///
/// The classification flags decide whether the background refresh engine
/// runs at all and which cadence table it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// The highest physical address known when the backend was opened.
    pub max_address: Pa,

    /// The memory contents may change between reads (live acquisition).
    /// Static dump files are not volatile.
    pub volatile: bool,

    /// Reads travel over a network link and are expensive.
    pub remote: bool,

    /// The highest physical address may grow after startup and should be
    /// re-queried after each process refresh.
    pub volatile_max_address: bool,
}

impl DeviceInfo {
    /// Describes a static, local memory image of the given size.
    pub const fn file(max_address: Pa) -> Self {
        Self {
            max_address,
            volatile: false,
            remote: false,
            volatile_max_address: false,
        }
    }
}

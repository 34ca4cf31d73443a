use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::{Pa, Va};

/// A process ID within the analyzed system.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// Identifier of the synthetic process that stands for the whole
    /// address space of an unrecognized system.
    pub const UNKNOWN: ProcessId = ProcessId(1);

    /// Identifier of the Windows `System` process.
    pub const SYSTEM: ProcessId = ProcessId(4);
}

impl From<u32> for ProcessId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<ProcessId> for u32 {
    fn from(value: ProcessId) -> Self {
        value.0
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags::bitflags! {
    /// Static properties of a process entry.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ProcessFlags: u8 {
        /// The entry was declared by the user (paging root supplied on the
        /// command line) rather than discovered in kernel memory.
        const USER_SUPPLIED = 0b00000001;

        /// 32-bit process running on a 64-bit kernel.
        const WOW64 = 0b00000010;
    }
}

/// Everything needed to construct a process entry.
#[derive(Debug, Default, Clone)]
pub struct NewProcess {
    /// Properties of the entry.
    pub flags: ProcessFlags,

    /// The process ID.
    pub id: ProcessId,

    /// The parent process ID.
    pub parent_id: ProcessId,

    /// Physical address of the top-level paging structure.
    pub dtb: Pa,

    /// Separate user-mode paging root when kernel page table isolation is
    /// active.
    pub dtb_user: Option<Pa>,

    /// Virtual address of the kernel process object (`_EPROCESS`).
    pub object: Va,

    /// Short image name.
    pub name: String,

    /// Base address of the image section.
    pub section_base: Va,

    /// OS build number the entry was parsed with.
    pub build_number: u32,
}

/// A process known to the registry.
///
/// Entries are shared through `Arc<Process>`. An entry handed out by a lookup
/// stays readable for as long as the holder keeps it, even after a total
/// refresh has retired the generation it belonged to.
#[derive(Debug)]
pub struct Process {
    id: ProcessId,
    parent_id: ProcessId,
    dtb: Pa,
    dtb_user: Option<Pa>,
    object: Va,
    name: String,
    flags: ProcessFlags,
    section_base: Va,
    build_number: u32,

    state: AtomicU32,
    pending: AtomicBool,
}

impl Process {
    pub(crate) fn new(new: NewProcess) -> Self {
        Self {
            id: new.id,
            parent_id: new.parent_id,
            dtb: new.dtb,
            dtb_user: new.dtb_user,
            object: new.object,
            name: new.name,
            flags: new.flags,
            section_base: new.section_base,
            build_number: new.build_number,
            state: AtomicU32::new(0),
            pending: AtomicBool::new(true),
        }
    }

    /// Returns the process ID.
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Returns the parent process ID.
    pub fn parent_id(&self) -> ProcessId {
        self.parent_id
    }

    /// Returns the physical address of the top-level paging structure.
    pub fn dtb(&self) -> Pa {
        self.dtb
    }

    /// Returns the user-mode paging root.
    ///
    /// Falls back to [`dtb`](Self::dtb) when no separate root exists.
    pub fn dtb_user(&self) -> Pa {
        self.dtb_user.unwrap_or(self.dtb)
    }

    /// Returns the address of the kernel process object.
    pub fn object(&self) -> Va {
        self.object
    }

    /// Returns the short name of the process.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the static properties of the entry.
    pub fn flags(&self) -> ProcessFlags {
        self.flags
    }

    /// Checks if the entry was declared by the user.
    pub fn is_user_supplied(&self) -> bool {
        self.flags.contains(ProcessFlags::USER_SUPPLIED)
    }

    /// Checks if the process is a 32-bit process on a 64-bit kernel.
    pub fn is_wow64(&self) -> bool {
        self.flags.contains(ProcessFlags::WOW64)
    }

    /// Returns the base address of the image section.
    pub fn section_base(&self) -> Va {
        self.section_base
    }

    /// Returns the OS build number.
    pub fn build_number(&self) -> u32 {
        self.build_number
    }

    /// Checks if the entry has not yet been published.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn publish(&self) {
        self.pending.store(false, Ordering::Release);
    }

    /// Returns the OS-specific process state.
    ///
    /// Partial refreshes update this in place instead of rebuilding the
    /// generation. On Windows a non-zero value means the process exited.
    pub fn state(&self) -> u32 {
        self.state.load(Ordering::Acquire)
    }

    /// Updates the OS-specific process state.
    pub fn set_state(&self, state: u32) {
        self.state.store(state, Ordering::Release);
    }
}

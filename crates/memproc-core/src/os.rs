use serde::{Deserialize, Serialize};

use crate::{Pa, PhysicalMemory, Process, VmmError, VmmGuard};

/// The kind of system behind the physical memory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemType {
    /// Nothing has been identified yet.
    #[default]
    Unknown,

    /// An unidentified 64-bit system exposed as a single flat address space
    /// through a user-supplied paging root.
    UnknownX64,

    /// 64-bit Windows.
    WindowsX64,

    /// 32-bit Windows.
    WindowsX86,
}

impl SystemType {
    /// Checks if the system is a recognized Windows kernel.
    pub fn is_windows(self) -> bool {
        matches!(self, Self::WindowsX64 | Self::WindowsX86)
    }
}

/// The paging scheme used to translate virtual addresses.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryModel {
    /// No translation is available.
    #[default]
    None,

    /// 32-bit two-level paging.
    X86,

    /// 32-bit physical address extension paging.
    X86Pae,

    /// 64-bit four-level paging.
    X64,
}

/// Result of a successful OS identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsDetection {
    /// The identified system.
    pub system: SystemType,

    /// The memory model the kernel runs with.
    pub memory_model: MemoryModel,

    /// The paging root of the kernel.
    pub kernel_dtb: Pa,
}

/// OS-specific collaborator of the process view.
///
/// An implementation knows how to identify the kernel in physical memory and
/// how to walk its process list, object namespace and registry. Every method
/// is invoked with the global coordination lock held; the [`VmmGuard`]
/// argument gives access to the caches and the process registry.
///
/// Only [`detect`] and [`enumerate_processes`] are required. The refresh hooks
/// default to doing nothing.
///
/// [`detect`]: Self::detect
/// [`enumerate_processes`]: Self::enumerate_processes
pub trait VmmOs<Driver>: Send + Sync + Sized
where
    Driver: PhysicalMemory,
{
    /// Tries to identify the operating system and populate the process
    /// registry with its processes.
    ///
    /// `hint` is the user-supplied paging root, if any. Returns `None` if the
    /// system was not recognized.
    fn detect(
        &self,
        vmm: &mut VmmGuard<'_, Driver, Self>,
        hint: Option<Pa>,
    ) -> Result<Option<OsDetection>, VmmError>;

    /// Walks the kernel process list starting at the system process.
    ///
    /// A total refresh builds a new generation through
    /// [`ProcessRegistry::create_entry`] and
    /// [`ProcessRegistry::finish_generation`]; a partial refresh only
    /// updates entries of the live generation in place.
    ///
    /// [`ProcessRegistry::create_entry`]: crate::ProcessRegistry::create_entry
    /// [`ProcessRegistry::finish_generation`]: crate::ProcessRegistry::finish_generation
    fn enumerate_processes(
        &self,
        vmm: &mut VmmGuard<'_, Driver, Self>,
        system: &Process,
        total: bool,
    ) -> Result<(), VmmError>;

    /// Eagerly populates the translation cache for a freshly registered
    /// process.
    fn spider(
        &self,
        _vmm: &mut VmmGuard<'_, Driver, Self>,
        _process: &Process,
    ) -> Result<(), VmmError> {
        Ok(())
    }

    /// Re-reads the kernel object manager namespace.
    fn refresh_kernel_objects(&self, _vmm: &mut VmmGuard<'_, Driver, Self>) -> Result<(), VmmError> {
        Ok(())
    }

    /// Re-reads the loaded registry hives.
    fn refresh_registry_hives(&self, _vmm: &mut VmmGuard<'_, Driver, Self>) -> Result<(), VmmError> {
        Ok(())
    }

    /// Re-reads the user profile map.
    fn refresh_user_profiles(&self, _vmm: &mut VmmGuard<'_, Driver, Self>) -> Result<(), VmmError> {
        Ok(())
    }

    /// Re-reads the physical memory map reported by the kernel.
    fn refresh_physical_memory_map(
        &self,
        _vmm: &mut VmmGuard<'_, Driver, Self>,
    ) -> Result<(), VmmError> {
        Ok(())
    }

    /// Re-reads page frame number metadata.
    fn refresh_pfn(&self, _vmm: &mut VmmGuard<'_, Driver, Self>) -> Result<(), VmmError> {
        Ok(())
    }
}

/// Marker type for a missing OS implementation.
///
/// Never recognizes anything, so the process view can only be built from a
/// user-supplied paging root.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOs;

impl<Driver> VmmOs<Driver> for NoOs
where
    Driver: PhysicalMemory,
{
    fn detect(
        &self,
        _vmm: &mut VmmGuard<'_, Driver, Self>,
        _hint: Option<Pa>,
    ) -> Result<Option<OsDetection>, VmmError> {
        Ok(None)
    }

    fn enumerate_processes(
        &self,
        _vmm: &mut VmmGuard<'_, Driver, Self>,
        _system: &Process,
        _total: bool,
    ) -> Result<(), VmmError> {
        Err(VmmError::NotSupported)
    }
}

use std::{
    ops::Deref,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    DeviceInfo, MappedPage, MemoryModel, NewProcess, Pa, PhysicalMemory, Process, ProcessId,
    ProcessRegistry, RefreshEvent, SystemType, VmmCache, VmmConfig, VmmError, VmmNotify, VmmOs,
    VmmStatistics, refresh::RefreshThread,
};

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SystemState {
    pub(crate) system: SystemType,
    pub(crate) memory_model: MemoryModel,
    pub(crate) kernel_dtb: Pa,
}

/// The shared state of a live memory analysis session.
///
/// `Vmm` owns the physical memory driver, the OS collaborator, the cache
/// domains, the process registry and the background refresh engine. One
/// instance is created per analyzed system and shared through an [`Arc`].
///
/// The cache domains sit behind a single coordination lock, taken through
/// [`lock`]. The refresh engine holds it for the whole batch of actions of a
/// tick, so a reader holding the lock never observes a half-cleared cache.
/// Process lookups do not need it.
///
/// [`lock`]: Self::lock
pub struct Vmm<Driver, Os>
where
    Driver: PhysicalMemory,
    Os: VmmOs<Driver>,
{
    driver: Driver,
    os: Os,
    config: VmmConfig,
    device: DeviceInfo,
    max_address: AtomicU64,

    master: Mutex<VmmCache>,
    processes: ProcessRegistry,
    state: RwLock<SystemState>,
    statistics: VmmStatistics,
    subscribers: RwLock<Vec<Box<dyn VmmNotify>>>,

    pub(crate) refresh: RefreshThread,
}

impl<Driver, Os> Vmm<Driver, Os>
where
    Driver: PhysicalMemory,
    Os: VmmOs<Driver>,
{
    /// Creates a new session over the given backend.
    ///
    /// Nothing is read from memory until [`initialize`] is called.
    ///
    /// [`initialize`]: Self::initialize
    pub fn new(driver: Driver, os: Os, config: VmmConfig) -> Result<Self, VmmError> {
        let device = driver.info()?;

        tracing::debug!(
            max_address = %device.max_address,
            volatile = device.volatile,
            remote = device.remote,
            "opened memory backend"
        );

        let cache = VmmCache::new(
            config.physical_cache_size,
            config.paging_cache_size,
            config.tlb_cache_size,
        );

        Ok(Self {
            driver,
            os,
            config,
            device,
            max_address: AtomicU64::new(device.max_address.0),
            master: Mutex::new(cache),
            processes: ProcessRegistry::new(),
            state: RwLock::new(SystemState::default()),
            statistics: VmmStatistics::default(),
            subscribers: RwLock::new(Vec::new()),
            refresh: RefreshThread::new(),
        })
    }

    /// Returns the physical memory driver.
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// Returns the OS collaborator.
    pub fn os(&self) -> &Os {
        &self.os
    }

    /// Returns the startup configuration.
    pub fn config(&self) -> &VmmConfig {
        &self.config
    }

    /// Returns the backend classification captured at startup.
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Returns the highest known physical address.
    ///
    /// On backends with a volatile memory map this is updated after every
    /// process refresh.
    pub fn max_address(&self) -> Pa {
        Pa(self.max_address.load(Ordering::Relaxed))
    }

    /// Returns the process registry.
    pub fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    /// Returns a new reference to the live process with the given
    /// identifier.
    pub fn process(&self, id: impl Into<ProcessId>) -> Option<Arc<Process>> {
        self.processes.lookup(id.into())
    }

    /// Returns the event counters.
    pub fn statistics(&self) -> &VmmStatistics {
        &self.statistics
    }

    /// Returns the identified system type.
    pub fn system(&self) -> SystemType {
        self.system_state().system
    }

    /// Returns the active memory model.
    pub fn memory_model(&self) -> MemoryModel {
        self.system_state().memory_model
    }

    /// Returns the paging root of the kernel, or of the synthetic process
    /// when the view was built from a user-supplied address.
    pub fn kernel_dtb(&self) -> Pa {
        self.system_state().kernel_dtb
    }

    /// Registers a subscriber for refresh notifications.
    pub fn subscribe(&self, subscriber: impl VmmNotify + 'static) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(subscriber));
    }

    /// Acquires the global coordination lock.
    ///
    /// The lock is not reentrant. OS collaborator methods already receive a
    /// guard and must not call this.
    pub fn lock(&self) -> VmmGuard<'_, Driver, Os> {
        VmmGuard {
            vmm: self,
            cache: self.master.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Acquires the global coordination lock if it is free.
    pub fn try_lock(&self) -> Option<VmmGuard<'_, Driver, Os>> {
        let cache = match self.master.try_lock() {
            Ok(cache) => cache,
            Err(TryLockError::Poisoned(err)) => err.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };

        Some(VmmGuard { vmm: self, cache })
    }

    /// Adds a process to the pending generation of the registry.
    ///
    /// Rejected entries are counted in the statistics and do not abort the
    /// surrounding refresh.
    pub fn create_process(&self, new: NewProcess) -> Option<Arc<Process>> {
        let id = new.id;
        let process = self.processes.create_entry(new);

        if process.is_none() {
            tracing::warn!(pid = %id, "failed to create process entry");
            self.statistics.inc_process_create_failed();
        }

        process
    }

    pub(crate) fn system_state(&self) -> SystemState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn update_system_state(&self, f: impl FnOnce(&mut SystemState)) {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner));
    }

    pub(crate) fn notify(&self, event: RefreshEvent) {
        for subscriber in self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            subscriber.notify(event);
        }
    }

    /// Re-reads the highest physical address from a backend whose memory
    /// map can grow.
    pub(crate) fn update_max_address(&self) {
        /// Values below 16MB are treated as bogus.
        const MIN_MAX_ADDRESS: u64 = 0x0100_0000;

        if !self.device.volatile_max_address {
            return;
        }

        if let Some(max_address) = self.driver.max_address()
            && max_address.0 > MIN_MAX_ADDRESS
        {
            let previous = self.max_address.swap(max_address.0, Ordering::Relaxed);

            if previous != max_address.0 {
                tracing::debug!(%max_address, "physical address limit changed");
            }
        }
    }
}

/// Exclusive access to the cache domains of a [`Vmm`].
///
/// Dereferences to the [`Vmm`] itself; the caches are reached through
/// [`cache`](Self::cache). Dropping the guard releases the global
/// coordination lock.
pub struct VmmGuard<'a, Driver, Os>
where
    Driver: PhysicalMemory,
    Os: VmmOs<Driver>,
{
    vmm: &'a Vmm<Driver, Os>,
    cache: MutexGuard<'a, VmmCache>,
}

impl<'a, Driver, Os> VmmGuard<'a, Driver, Os>
where
    Driver: PhysicalMemory,
    Os: VmmOs<Driver>,
{
    /// Returns the session this guard belongs to.
    pub fn vmm(&self) -> &'a Vmm<Driver, Os> {
        self.vmm
    }

    /// Returns the cache domains.
    pub fn cache(&mut self) -> &mut VmmCache {
        &mut self.cache
    }

    /// Reads a physical page through the physical-page cache.
    pub fn read_page(&mut self, pa: Pa) -> Result<MappedPage, VmmError> {
        self.cache.read_page(&self.vmm.driver, pa.gfn())
    }

    /// Reads `buffer.len()` bytes of physical memory starting at `pa`
    /// through the physical-page cache.
    pub fn read_physical(&mut self, pa: Pa, buffer: &mut [u8]) -> Result<(), VmmError> {
        let mut offset = 0;

        while offset < buffer.len() {
            let address = pa + offset as u64;
            let page = self.read_page(address)?;

            let page_offset = address.page_offset() as usize;
            if page.len() <= page_offset {
                return Err(VmmError::OutOfBounds);
            }

            let size = (page.len() - page_offset).min(buffer.len() - offset);

            buffer[offset..offset + size].copy_from_slice(&page[page_offset..page_offset + size]);
            offset += size;
        }

        Ok(())
    }
}

impl<'a, Driver, Os> Deref for VmmGuard<'a, Driver, Os>
where
    Driver: PhysicalMemory,
    Os: VmmOs<Driver>,
{
    type Target = Vmm<Driver, Os>;

    fn deref(&self) -> &Self::Target {
        self.vmm
    }
}

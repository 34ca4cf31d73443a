use super::RefreshActions;
use crate::{PhysicalMemory, ProcessId, RefreshEvent, SystemType, Vmm, VmmError, VmmGuard, VmmOs};

impl<Driver, Os> Vmm<Driver, Os>
where
    Driver: PhysicalMemory,
    Os: VmmOs<Driver>,
{
    /// Runs one batch of maintenance actions under the global coordination
    /// lock.
    ///
    /// This is what the background engine does on every tick. An error means
    /// the process refresh failed; the lock is released before returning.
    pub fn refresh_tick(&self, actions: RefreshActions) -> Result<(), VmmError> {
        if actions.is_empty() {
            return Ok(());
        }

        let mut vmm = self.lock();

        if actions.contains(RefreshActions::PHYS) {
            vmm.cache().clear_phys();
            self.statistics().inc_phys_refresh_cache();
            vmm.cache().clear_paging();
            self.statistics().inc_page_refresh_cache();
            vmm.cache().clear_paging_failed();
        }

        if actions.contains(RefreshActions::TLB) {
            vmm.cache().clear_tlb();
            self.statistics().inc_tlb_refresh_cache();
        }

        if actions.intersects(RefreshActions::PROCESS) {
            let total = actions.contains(RefreshActions::PROCESS_TOTAL);

            vmm.refresh_processes(total)?;
            self.update_max_address();

            if total {
                if let Err(err) = self.os().refresh_kernel_objects(&mut vmm) {
                    tracing::warn!(%err, "failed to refresh kernel objects");
                }

                self.notify(RefreshEvent::ProcessTotal);
            }

            if let Err(err) = self.os().refresh_pfn(&mut vmm) {
                tracing::warn!(%err, "failed to refresh PFN database");
            }
        }

        if actions.contains(RefreshActions::REGISTRY) {
            if let Err(err) = self.os().refresh_registry_hives(&mut vmm) {
                tracing::warn!(%err, "failed to refresh registry hives");
            }

            if let Err(err) = self.os().refresh_user_profiles(&mut vmm) {
                tracing::warn!(%err, "failed to refresh user profiles");
            }

            if let Err(err) = self.os().refresh_physical_memory_map(&mut vmm) {
                tracing::warn!(%err, "failed to refresh physical memory map");
            }

            self.statistics().inc_registry_refresh();
            self.notify(RefreshEvent::Registry);
        }

        Ok(())
    }
}

impl<Driver, Os> VmmGuard<'_, Driver, Os>
where
    Driver: PhysicalMemory,
    Os: VmmOs<Driver>,
{
    /// Refreshes the process registry.
    ///
    /// A total refresh rebuilds the generation, a partial one only updates
    /// the live entries. A process view built from a user-supplied paging
    /// root is re-registered on every total refresh.
    ///
    /// Failing to walk the kernel process list is logged and counted but not
    /// reported as an error; entries created by the failed walk are dropped
    /// and the live generation is kept. The only fatal condition is a recognized system
    /// without its system process.
    pub fn refresh_processes(&mut self, total: bool) -> Result<(), VmmError> {
        if total {
            self.statistics().inc_process_refresh_full();
        }
        else {
            self.statistics().inc_process_refresh_partial();
        }

        let system = self.system();

        if total && system == SystemType::UnknownX64 {
            let dtb = self.kernel_dtb();

            if let Err(err) = self.initialize_user_paging_root(dtb) {
                tracing::warn!(%err, %dtb, "failed to re-register user-supplied process");
            }
        }

        if !system.is_windows() {
            return Ok(());
        }

        tracing::debug!(total, "process refresh");

        let system_process = match self.processes().lookup(ProcessId::SYSTEM) {
            Some(process) => process,
            None => {
                tracing::error!("system process not found");
                return Err(VmmError::SystemProcessNotFound);
            }
        };

        // A total walk starts from an empty pending set.
        if total {
            self.processes().discard_pending();
        }

        let vmm = self.vmm();
        if let Err(err) = vmm.os().enumerate_processes(self, &system_process, total) {
            tracing::warn!(%err, total, "failed to enumerate processes");
            vmm.statistics().inc_process_enumerate_failed();
            vmm.processes().discard_pending();
        }

        Ok(())
    }
}

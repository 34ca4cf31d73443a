use std::sync::Arc;

use crate::{
    MemoryModel, NewProcess, Pa, PhysicalMemory, ProcessFlags, ProcessId, SystemType, Vmm,
    VmmError, VmmGuard, VmmOs,
};

impl<Driver, Os> Vmm<Driver, Os>
where
    Driver: PhysicalMemory + 'static,
    Os: VmmOs<Driver> + 'static,
{
    /// Builds the initial process view and starts cache maintenance.
    ///
    /// OS detection is tried first, with the configured paging root as a
    /// hint. If it does not recognize the system and a paging root was
    /// configured, a single synthetic `unknown_process` spanning the whole
    /// 64-bit address space is registered instead. If both fail, the
    /// session cannot be used; this is a configuration problem and is not
    /// retried.
    ///
    /// On success the background refresh engine is started if the backend
    /// is volatile and background refresh is not disabled.
    pub fn initialize(self: &Arc<Self>) -> Result<(), VmmError> {
        self.initialize_process_view()?;

        if self.device().volatile && !self.config().disable_background_refresh {
            // Without the engine the view is merely never refreshed.
            if let Err(err) = self.start_refresh() {
                tracing::warn!(%err, "failed to start refresh thread");
            }
        }

        Ok(())
    }

    fn initialize_process_view(&self) -> Result<(), VmmError> {
        let hint = self.config().paging_root;
        let mut vmm = self.lock();

        match self.os().detect(&mut vmm, hint) {
            Ok(Some(detection)) => {
                tracing::info!(
                    system = ?detection.system,
                    kernel_dtb = %detection.kernel_dtb,
                    "operating system identified"
                );

                self.update_system_state(|state| {
                    state.system = detection.system;
                    state.memory_model = detection.memory_model;
                    state.kernel_dtb = detection.kernel_dtb;
                });

                return Ok(());
            }
            Ok(None) => tracing::debug!("operating system not identified"),
            Err(err) => tracing::warn!(%err, "operating system detection failed"),
        }

        // Whatever a failed detection left behind must not leak into the
        // fallback generation.
        vmm.processes().discard_pending();

        let result = match hint {
            Some(dtb) if !dtb.is_null() => vmm.initialize_user_paging_root(dtb),
            _ => Err(VmmError::InitializationFailed),
        };

        if result.is_err() {
            tracing::error!(
                "unable to auto-identify operating system; \
                 specify the paging root (DTB/CR3) if known"
            );
        }

        result
    }
}

impl<Driver, Os> VmmGuard<'_, Driver, Os>
where
    Driver: PhysicalMemory,
    Os: VmmOs<Driver>,
{
    /// Registers a single synthetic process translating through `dtb` with
    /// flat 64-bit paging, and warms up its translation cache.
    pub fn initialize_user_paging_root(&mut self, dtb: Pa) -> Result<(), VmmError> {
        self.update_system_state(|state| state.memory_model = MemoryModel::X64);

        let process = self.create_process(NewProcess {
            flags: ProcessFlags::USER_SUPPLIED,
            id: ProcessId::UNKNOWN,
            parent_id: ProcessId(0),
            dtb,
            name: String::from("unknown_process"),
            ..Default::default()
        });

        self.processes().finish_generation();

        let process = match process {
            Some(process) => process,
            None => {
                tracing::warn!(%dtb, "failed to initialize process from user-defined paging root");
                self.update_system_state(|state| state.memory_model = MemoryModel::None);
                return Err(VmmError::InitializationFailed);
            }
        };

        let vmm = self.vmm();
        if let Err(err) = vmm.os().spider(self, &process) {
            tracing::warn!(%err, %dtb, "translation cache warm-up failed");
        }

        self.update_system_state(|state| {
            state.system = SystemType::UnknownX64;
            state.kernel_dtb = dtb;
        });

        Ok(())
    }
}

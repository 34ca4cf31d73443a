use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU8, Ordering},
    },
    thread::{self, JoinHandle},
};

use super::RefreshSchedule;
use crate::{PhysicalMemory, Vmm, VmmError, VmmOs};

/// Lifecycle of the background refresh engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RefreshState {
    /// No worker thread exists.
    Stopped = 0,

    /// The worker is ticking.
    Running = 1,

    /// A stop was requested; the worker exits after the current tick.
    Stopping = 2,
}

impl RefreshState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

pub(crate) struct RefreshThread {
    state: AtomicU8,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshThread {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(RefreshState::Stopped as u8),
            handle: Mutex::new(None),
        }
    }

    fn state(&self) -> RefreshState {
        RefreshState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: RefreshState, to: RefreshState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Locks the handle slot. State changes that decide who owns the
    /// handle happen under this lock.
    fn slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn has_handle(&self) -> bool {
        self.slot().is_some()
    }
}

impl<Driver, Os> Vmm<Driver, Os>
where
    Driver: PhysicalMemory + 'static,
    Os: VmmOs<Driver> + 'static,
{
    /// Returns the state of the background refresh engine.
    pub fn refresh_state(&self) -> RefreshState {
        self.refresh.state()
    }

    /// Starts the background refresh engine.
    ///
    /// The cadence table is taken from the configuration if present,
    /// otherwise it is chosen by the backend classification. The worker
    /// keeps a reference to the session until it exits, so
    /// [`stop_refresh`] must be called before the session can be dropped.
    ///
    /// [`stop_refresh`]: Self::stop_refresh
    pub fn start_refresh(self: &Arc<Self>) -> Result<(), VmmError> {
        // The slot stays locked until the handle is stored, so neither a
        // stopper nor a worker that fails on its very first tick can miss it.
        let mut slot = self.refresh.slot();

        if !self
            .refresh
            .transition(RefreshState::Stopped, RefreshState::Running)
        {
            return Err(VmmError::RefreshThreadRunning);
        }

        let schedule = self
            .config()
            .schedule
            .unwrap_or_else(|| RefreshSchedule::for_device(self.device()));

        let vmm = Arc::clone(self);
        let result = thread::Builder::new()
            .name("memproc-refresh".into())
            .spawn(move || vmm.refresh_loop(schedule));

        match result {
            Ok(handle) => {
                *slot = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.refresh.state.store(RefreshState::Stopped as u8, Ordering::Release);
                Err(VmmError::Io(err))
            }
        }
    }

    /// Requests the background refresh engine to stop and waits for it.
    ///
    /// The worker finishes the tick it is currently running. Calling this
    /// when the engine is not running does nothing.
    pub fn stop_refresh(&self) {
        let handle = {
            let mut slot = self.refresh.slot();

            if !self
                .refresh
                .transition(RefreshState::Running, RefreshState::Stopping)
            {
                return;
            }

            match slot.take() {
                Some(handle) => handle,
                None => return,
            }
        };

        tracing::debug!("stopping refresh thread");

        // A subscriber may stop the engine from within a notification.
        if handle.thread().id() == thread::current().id() {
            return;
        }

        if handle.join().is_err() {
            tracing::error!("refresh thread panicked");
            self.refresh
                .transition(RefreshState::Stopping, RefreshState::Stopped);
        }
    }

    fn refresh_loop(&self, schedule: RefreshSchedule) {
        tracing::info!(?schedule, "start periodic cache flushing");

        let mut tick = 0u64;

        while self.refresh.state() == RefreshState::Running {
            thread::sleep(schedule.tick_period);
            tick += 1;

            let actions = schedule.due(tick);
            if actions.is_empty() {
                continue;
            }

            tracing::trace!(tick, ?actions, "refresh tick");

            if let Err(err) = self.refresh_tick(actions) {
                tracing::error!(%err, "failed to refresh processes - aborting");
                break;
            }
        }

        tracing::info!("exit periodic cache flushing");

        let mut slot = self.refresh.slot();

        // Exiting on its own, nobody will join this thread. Otherwise the
        // handle belongs to `stop_refresh`, which is joining it.
        if self
            .refresh
            .transition(RefreshState::Running, RefreshState::Stopped)
        {
            drop(slot.take());
        }
        else {
            self.refresh
                .transition(RefreshState::Stopping, RefreshState::Stopped);
        }
    }
}

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use indexmap::IndexMap;

use super::{NewProcess, Process, ProcessId};

/// One published snapshot of the process set.
#[derive(Debug, Default)]
pub struct Generation {
    number: u64,
    processes: IndexMap<ProcessId, Arc<Process>>,
}

impl Generation {
    /// Returns the sequence number of the generation.
    ///
    /// The empty generation the registry starts with is number zero.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Returns the process with the given identifier.
    pub fn get(&self, id: ProcessId) -> Option<&Arc<Process>> {
        self.processes.get(&id)
    }

    /// Returns an iterator over the processes in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Process>> {
        self.processes.values()
    }

    /// Returns the number of processes.
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Checks if the generation holds no processes.
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

/// The set of known processes.
///
/// Construction is two-phase: [`create_entry`] adds entries to a pending set
/// that lookups cannot see, and [`finish_generation`] publishes the pending
/// set as the new live generation in one step. Lookups only take a short
/// internal read lock and never contend with the global coordination lock.
///
/// [`create_entry`]: Self::create_entry
/// [`finish_generation`]: Self::finish_generation
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    live: RwLock<Arc<Generation>>,
    pending: Mutex<Option<IndexMap<ProcessId, Arc<Process>>>>,
}

impl ProcessRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new entry to the pending set.
    ///
    /// Returns `None` if the entry fails validation: the paging root is zero
    /// or another pending entry already uses the identifier.
    pub fn create_entry(&self, new: NewProcess) -> Option<Arc<Process>> {
        if new.dtb.is_null() {
            tracing::debug!(pid = %new.id, "rejecting process without paging root");
            return None;
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let pending = pending.get_or_insert_with(IndexMap::new);

        if pending.contains_key(&new.id) {
            tracing::debug!(pid = %new.id, "rejecting duplicate process");
            return None;
        }

        let process = Arc::new(Process::new(new));
        pending.insert(process.id(), process.clone());
        Some(process)
    }

    /// Publishes the pending set as the new live generation.
    ///
    /// Entries of the previous generation stay valid for their holders but
    /// can no longer be found by identifier. Returns `false` if nothing was
    /// pending, in which case the live generation is left untouched.
    pub fn finish_generation(&self) -> bool {
        let processes = match self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(processes) => processes,
            None => return false,
        };

        for process in processes.values() {
            process.publish();
        }

        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        let number = live.number + 1;

        tracing::debug!(generation = number, processes = processes.len(), "publishing processes");
        *live = Arc::new(Generation { number, processes });
        true
    }

    /// Drops the pending set without publishing it.
    pub fn discard_pending(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Returns a new reference to the live entry with the given identifier.
    pub fn lookup(&self, id: ProcessId) -> Option<Arc<Process>> {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Returns the live generation.
    pub fn generation(&self) -> Arc<Generation> {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{Pa, process::ProcessFlags};

    fn entry(id: u32, dtb: u64) -> NewProcess {
        NewProcess {
            id: ProcessId(id),
            dtb: Pa(dtb),
            name: format!("proc{id}"),
            ..Default::default()
        }
    }

    #[test]
    fn pending_entries_are_invisible_until_finished() {
        let registry = ProcessRegistry::new();

        let process = registry.create_entry(entry(42, 0x1000)).expect("entry");
        assert!(process.is_pending());
        assert!(registry.lookup(ProcessId(42)).is_none());
        assert_eq!(registry.generation().number(), 0);

        assert!(registry.finish_generation());
        assert!(!process.is_pending());

        let found = registry.lookup(ProcessId(42)).expect("published");
        assert!(Arc::ptr_eq(&found, &process));
        assert_eq!(registry.generation().number(), 1);
    }

    #[test]
    fn stale_handles_survive_generation_swap() {
        let registry = ProcessRegistry::new();
        registry.create_entry(entry(42, 0x1000));
        registry.finish_generation();

        let old = registry.lookup(ProcessId(42)).expect("first generation");

        registry.create_entry(entry(42, 0x2000));
        registry.create_entry(entry(43, 0x3000));
        registry.finish_generation();

        // The retired entry is still fully readable by its holder.
        assert_eq!(old.dtb(), Pa(0x1000));
        assert_eq!(old.name(), "proc42");

        let new = registry.lookup(ProcessId(42)).expect("second generation");
        assert_eq!(new.dtb(), Pa(0x2000));
        assert!(!Arc::ptr_eq(&old, &new));

        // Only the holder keeps the retired entry alive now.
        assert_eq!(Arc::strong_count(&old), 1);

        registry.create_entry(entry(43, 0x3000));
        registry.finish_generation();
        assert!(registry.lookup(ProcessId(42)).is_none());
        assert_eq!(old.id(), ProcessId(42));
    }

    #[test]
    fn invalid_entries_are_rejected() {
        let registry = ProcessRegistry::new();

        assert!(registry.create_entry(entry(1, 0)).is_none());
        assert!(registry.create_entry(entry(1, 0x1000)).is_some());
        assert!(registry.create_entry(entry(1, 0x2000)).is_none());

        registry.finish_generation();
        assert_eq!(registry.generation().len(), 1);
        assert_eq!(registry.lookup(ProcessId(1)).map(|p| p.dtb()), Some(Pa(0x1000)));
    }

    #[test]
    fn finish_without_pending_keeps_live_generation() {
        let registry = ProcessRegistry::new();
        registry.create_entry(entry(7, 0x1000));
        registry.finish_generation();

        assert!(!registry.finish_generation());
        assert!(registry.lookup(ProcessId(7)).is_some());

        registry.create_entry(entry(8, 0x1000));
        registry.discard_pending();
        assert!(!registry.finish_generation());
        assert!(registry.lookup(ProcessId(8)).is_none());
    }

    #[test]
    fn concurrent_lookups_and_releases() {
        let registry = Arc::new(ProcessRegistry::new());
        registry.create_entry(NewProcess {
            flags: ProcessFlags::USER_SUPPLIED,
            ..entry(1, 0x1aa000)
        });
        registry.finish_generation();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        if let Some(process) = registry.lookup(ProcessId(1)) {
                            assert!(process.dtb().0 != 0);
                        }
                    }
                })
            })
            .collect();

        for n in 0..100u64 {
            registry.create_entry(entry(1, 0x1000 * (n + 1)));
            registry.finish_generation();
        }

        for reader in readers {
            reader.join().expect("reader panicked");
        }

        let last = registry.lookup(ProcessId(1)).expect("live");
        assert_eq!(last.dtb(), Pa(0x1000 * 100));
        assert_eq!(Arc::strong_count(&last), 2);
    }
}

use std::{collections::HashSet, num::NonZeroUsize};

use lru::LruCache;

use crate::{Gfn, MappedPage, Pa, PhysicalMemory, Va, VmmError};

/// Cache domains maintained on behalf of the virtual memory model.
///
/// The whole structure lives behind the global coordination lock of
/// [`Vmm`]; every clear and every read-through happens with that lock held.
///
/// [`Vmm`]: crate::Vmm
pub struct VmmCache {
    phys: LruCache<Gfn, MappedPage>,
    paging: LruCache<Gfn, MappedPage>,
    tlb: LruCache<(Va, Pa), Pa>,
    paging_failed: HashSet<Pa>,
}

impl VmmCache {
    /// Default number of entries in each LRU domain.
    pub const DEFAULT_SIZE: usize = 8192;

    /// Creates the cache domains with the given capacities.
    ///
    /// A zero capacity is replaced with [`DEFAULT_SIZE`].
    ///
    /// [`DEFAULT_SIZE`]: Self::DEFAULT_SIZE
    pub fn new(phys: usize, paging: usize, tlb: usize) -> Self {
        Self {
            phys: LruCache::new(capacity(phys)),
            paging: LruCache::new(capacity(paging)),
            tlb: LruCache::new(capacity(tlb)),
            paging_failed: HashSet::new(),
        }
    }

    /// Reads a physical page through the physical-page cache.
    pub fn read_page(
        &mut self,
        driver: &impl PhysicalMemory,
        gfn: Gfn,
    ) -> Result<MappedPage, VmmError> {
        let page = self.phys.try_get_or_insert(gfn, || driver.read_page(gfn))?;

        // Mapped pages are reference counted, so cloning it is cheap.
        Ok(page.clone())
    }

    /// Reads a page holding a paging structure (PML4, PDPT, PD or PT)
    /// through the paging-structure cache.
    ///
    /// Physical addresses recorded as failed are not retried until the
    /// negative set is cleared.
    pub fn read_paging_page(
        &mut self,
        driver: &impl PhysicalMemory,
        gfn: Gfn,
    ) -> Result<MappedPage, VmmError> {
        if self.paging_failed.contains(&gfn.pa()) {
            return Err(VmmError::PageNotPresent(gfn.pa()));
        }

        match self
            .paging
            .try_get_or_insert(gfn, || driver.read_page(gfn))
        {
            Ok(page) => Ok(page.clone()),
            Err(err) => {
                self.paging_failed.insert(gfn.pa());
                Err(err)
            }
        }
    }

    /// Looks up a cached translation of the page containing `va` under the
    /// paging root `root`.
    pub fn translation(&mut self, va: Va, root: Pa) -> Option<Pa> {
        self.tlb
            .get(&(va.page_align(), root))
            .map(|pa| *pa + (va.0 & !crate::PAGE_MASK))
    }

    /// Records a resolved translation.
    pub fn insert_translation(&mut self, va: Va, root: Pa, pa: Pa) {
        self.tlb.put((va.page_align(), root), pa.page_align());
    }

    /// Records a physical address whose paging structure could not be read.
    pub fn mark_paging_failed(&mut self, pa: Pa) {
        self.paging_failed.insert(pa.page_align());
    }

    /// Checks if a physical address is in the negative set.
    pub fn is_paging_failed(&self, pa: Pa) -> bool {
        self.paging_failed.contains(&pa.page_align())
    }

    /// Clears the physical-page cache.
    pub fn clear_phys(&mut self) {
        self.phys.clear();
    }

    /// Clears the paging-structure cache.
    pub fn clear_paging(&mut self) {
        self.paging.clear();
    }

    /// Clears the negative "paging failed" set.
    pub fn clear_paging_failed(&mut self) {
        self.paging_failed.clear();
    }

    /// Clears the translation cache.
    pub fn clear_tlb(&mut self) {
        self.tlb.clear();
    }

    /// Returns the number of cached physical pages.
    pub fn phys_len(&self) -> usize {
        self.phys.len()
    }

    /// Returns the number of cached paging-structure pages.
    pub fn paging_len(&self) -> usize {
        self.paging.len()
    }

    /// Returns the number of cached translations.
    pub fn tlb_len(&self) -> usize {
        self.tlb.len()
    }

    /// Returns the number of entries in the negative set.
    pub fn paging_failed_len(&self) -> usize {
        self.paging_failed.len()
    }
}

impl Default for VmmCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE, Self::DEFAULT_SIZE, Self::DEFAULT_SIZE)
    }
}

const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(VmmCache::DEFAULT_SIZE).unwrap();

fn capacity(size: usize) -> NonZeroUsize {
    NonZeroUsize::new(size).unwrap_or(DEFAULT_CAPACITY)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{DeviceInfo, PAGE_SIZE};

    struct CountingDriver {
        pages: HashMap<Gfn, Vec<u8>>,
        reads: AtomicUsize,
    }

    impl PhysicalMemory for CountingDriver {
        fn info(&self) -> Result<DeviceInfo, VmmError> {
            Ok(DeviceInfo::file(Pa(0x10_0000)))
        }

        fn read_page(&self, gfn: Gfn) -> Result<MappedPage, VmmError> {
            self.reads.fetch_add(1, Ordering::Relaxed);
            let page = self
                .pages
                .get(&gfn)
                .ok_or(VmmError::PageNotPresent(gfn.pa()))?;
            Ok(MappedPage::new(page.clone()))
        }
    }

    fn driver() -> CountingDriver {
        let mut pages = HashMap::new();
        pages.insert(Gfn(1), vec![0xaa; PAGE_SIZE as usize]);
        CountingDriver {
            pages,
            reads: AtomicUsize::new(0),
        }
    }

    #[test]
    fn phys_cache_reads_through_once() -> Result<(), VmmError> {
        let driver = driver();
        let mut cache = VmmCache::default();

        assert_eq!(cache.read_page(&driver, Gfn(1))?[0], 0xaa);
        cache.read_page(&driver, Gfn(1))?;
        assert_eq!(driver.reads.load(Ordering::Relaxed), 1);

        cache.clear_phys();
        assert_eq!(cache.phys_len(), 0);
        cache.read_page(&driver, Gfn(1))?;
        assert_eq!(driver.reads.load(Ordering::Relaxed), 2);

        Ok(())
    }

    #[test]
    fn failed_paging_reads_are_remembered_until_cleared() {
        let driver = driver();
        let mut cache = VmmCache::default();

        assert!(cache.read_paging_page(&driver, Gfn(7)).is_err());
        assert!(cache.is_paging_failed(Pa(0x7123)));
        assert!(cache.read_paging_page(&driver, Gfn(7)).is_err());
        assert_eq!(driver.reads.load(Ordering::Relaxed), 1);

        cache.clear_paging_failed();
        assert!(!cache.is_paging_failed(Pa(0x7000)));
        assert!(cache.read_paging_page(&driver, Gfn(7)).is_err());
        assert_eq!(driver.reads.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn translations_keep_page_offset() {
        let mut cache = VmmCache::default();
        cache.insert_translation(Va(0x7ff0_1234), Pa(0x1aa000), Pa(0x5000));

        assert_eq!(
            cache.translation(Va(0x7ff0_1a00), Pa(0x1aa000)),
            Some(Pa(0x5a00))
        );
        assert_eq!(cache.translation(Va(0x7ff0_1a00), Pa(0x2000)), None);

        cache.clear_tlb();
        assert_eq!(cache.tlb_len(), 0);
    }
}

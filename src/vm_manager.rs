//! VM Manager - the page fault handler
//!
//! Owns the page table, the LRU queue, physical memory and the backing store.
//! Every byte access goes through [`VmManager::get_byte`] or
//! [`VmManager::set_byte`], which fault the page in (evicting the least
//! recently used page when all frames are taken) before touching memory.

use log::{debug, info, trace};

use crate::config::PagerConfig;
use crate::error::{PagingError, Result};
use crate::lru::LruQueue;
use crate::memory::{BackingStore, PhysicalMemory};
use crate::page_table::{PageState, PageTable};
use crate::translation::{self, VirtualAddress};

/// Counters collected while serving accesses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingStats {
    pub reads: u64,
    pub writes: u64,
    pub faults: u64,
    pub evictions: u64,
    pub writebacks: u64,
}

impl PagingStats {
    pub fn accesses(&self) -> u64 {
        self.reads + self.writes
    }

    pub fn hits(&self) -> u64 {
        self.accesses() - self.faults
    }
}

impl std::fmt::Display for PagingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} accesses ({} reads, {} writes), {} faults, {} evictions, {} writebacks",
            self.accesses(),
            self.reads,
            self.writes,
            self.faults,
            self.evictions,
            self.writebacks
        )
    }
}

/// Whether an access found its page resident or had to fault it in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Resident,
    Fault,
}

pub struct VmManager {
    config: PagerConfig,
    page_table: PageTable,
    lru: LruQueue,
    pm: PhysicalMemory,
    store: BackingStore,
    // frames never handed out yet are next_free..frame_count
    next_free: usize,
    stats: PagingStats,
}

impl VmManager {
    pub fn new(config: PagerConfig, store: BackingStore) -> Result<Self> {
        config.validate()?;
        let actual = store.as_bytes().len();
        if store.total_pages() != config.total_pages || actual != config.store_size() {
            return Err(PagingError::StoreSize {
                expected: config.store_size(),
                actual,
            });
        }
        info!(
            "vm manager: {} pages x {} bytes, {} frames",
            config.total_pages,
            config.page_size(),
            config.frame_count
        );
        Ok(VmManager {
            page_table: PageTable::new(config.total_pages),
            lru: LruQueue::new(config.total_pages),
            pm: PhysicalMemory::new(&config),
            store,
            config,
            next_free: 0,
            stats: PagingStats::default(),
        })
    }

    /// Build a manager over raw store contents
    pub fn from_bytes(config: PagerConfig, data: Vec<u8>) -> Result<Self> {
        config.validate()?;
        let store = BackingStore::new(data, &config)?;
        Self::new(config, store)
    }

    /// Read one byte at a virtual address
    pub fn get_byte(&mut self, va: u32) -> Result<u8> {
        let va = VirtualAddress::from_raw(va, &self.config)?;
        let access = self.ensure_resident(va.page)?;
        let pa = self.physical_address(&va)?;
        let value = self.pm.read_byte(pa);
        self.stats.reads += 1;
        trace!("read {} -> PA {} = {} ({:?})", va, pa, value, access);
        Ok(value)
    }

    /// Write one byte at a virtual address, marking its page dirty
    pub fn set_byte(&mut self, va: u32, value: u8) -> Result<()> {
        let va = VirtualAddress::from_raw(va, &self.config)?;
        let access = self.ensure_resident(va.page)?;
        self.page_table.set_dirty(va.page)?;
        let pa = self.physical_address(&va)?;
        self.pm.write_byte(pa, value);
        self.stats.writes += 1;
        trace!("write {} -> PA {} = {} ({:?})", va, pa, value, access);
        Ok(())
    }

    /// Write every dirty resident page back to the store. Pages stay resident.
    pub fn flush(&mut self) -> Result<usize> {
        let dirty: Vec<(usize, usize)> = self
            .page_table
            .resident()
            .filter(|&(_, _, dirty)| dirty)
            .map(|(page, frame, _)| (page, frame))
            .collect();
        for &(page, frame) in &dirty {
            self.write_back(page, frame)?;
        }
        if !dirty.is_empty() {
            debug!("flushed {} dirty pages", dirty.len());
        }
        Ok(dirty.len())
    }

    /// Flush and hand back the store
    pub fn into_backing_store(mut self) -> Result<BackingStore> {
        self.flush()?;
        Ok(self.store)
    }

    pub fn config(&self) -> &PagerConfig {
        &self.config
    }

    pub fn stats(&self) -> PagingStats {
        self.stats
    }

    pub fn backing_store(&self) -> &BackingStore {
        &self.store
    }

    pub fn is_resident(&self, page: usize) -> bool {
        self.page_table.is_present(page)
    }

    pub fn page_state(&self, page: usize) -> Result<PageState> {
        self.page_table.state(page)
    }

    /// Resident pages from most to least recently used
    pub fn resident_pages(&self) -> Vec<usize> {
        self.lru.iter().collect()
    }

    /// Next page to be evicted
    pub fn lru_victim(&self) -> Option<usize> {
        self.lru.tail()
    }

    /// Cross-check page table, LRU queue and frame ownership
    pub fn check_invariants(&self) -> Result<()> {
        let resident = self.page_table.resident_count();
        if resident > self.config.frame_count {
            return Err(PagingError::InvariantViolation(format!(
                "{} resident pages exceed {} frames",
                resident, self.config.frame_count
            )));
        }
        if self.lru.len() != resident {
            return Err(PagingError::InvariantViolation(format!(
                "LRU queue holds {} pages, page table {}",
                self.lru.len(),
                resident
            )));
        }
        if self.lru.iter().take(resident + 1).count() != resident {
            return Err(PagingError::InvariantViolation("LRU queue links are broken".into()));
        }

        let mut owner = vec![None; self.config.frame_count];
        for (page, frame, _) in self.page_table.resident() {
            if frame >= self.next_free {
                return Err(PagingError::InvariantViolation(format!(
                    "page {} maps unallocated frame {}",
                    page, frame
                )));
            }
            if let Some(other) = owner[frame].replace(page) {
                return Err(PagingError::InvariantViolation(format!(
                    "frame {} owned by pages {} and {}",
                    frame, other, page
                )));
            }
            if !self.lru.contains(page) {
                return Err(PagingError::InvariantViolation(format!(
                    "resident page {} missing from LRU queue",
                    page
                )));
            }
        }
        Ok(())
    }

    /// Fault `page` in if needed and mark it most recently used
    fn ensure_resident(&mut self, page: usize) -> Result<Access> {
        let access = if self.page_table.is_present(page) {
            Access::Resident
        } else {
            self.fault_in(page)?;
            Access::Fault
        };
        self.lru.touch(page)?;
        Ok(access)
    }

    fn fault_in(&mut self, page: usize) -> Result<()> {
        self.stats.faults += 1;
        let frame = if self.page_table.resident_count() >= self.config.frame_count {
            self.evict_lru()?
        } else {
            self.allocate_frame()?
        };

        let bytes = self.store.read_page(page)?;
        self.pm.load_frame(frame, bytes);
        self.page_table.mark_present(page, frame)?;
        self.lru.insert_new(page)?;
        debug!("page fault: page {} -> frame {}", page, frame);
        Ok(())
    }

    /// Evict the LRU page, writing it back if dirty, and return its frame
    fn evict_lru(&mut self) -> Result<usize> {
        let victim = self.lru.evict().map_err(|e| match e {
            PagingError::QueueEmpty => PagingError::InvariantViolation(format!(
                "memory full with {} resident pages but LRU queue is empty",
                self.page_table.resident_count()
            )),
            other => other,
        })?;
        let state = self.page_table.state(victim)?;
        let frame = state.frame().ok_or_else(|| {
            PagingError::InvariantViolation(format!("evicted page {} was not present", victim))
        })?;
        if state.is_dirty() {
            self.write_back(victim, frame)?;
        }
        self.page_table.mark_absent(victim)?;
        self.stats.evictions += 1;
        debug!("evicted page {} from frame {}", victim, frame);
        Ok(frame)
    }

    fn allocate_frame(&mut self) -> Result<usize> {
        if self.next_free >= self.config.frame_count {
            return Err(PagingError::InvariantViolation(format!(
                "no free frame with only {} resident pages",
                self.page_table.resident_count()
            )));
        }
        let frame = self.next_free;
        self.next_free += 1;
        Ok(frame)
    }

    fn write_back(&mut self, page: usize, frame: usize) -> Result<()> {
        self.store.write_page(page, self.pm.frame(frame))?;
        self.page_table.clear_dirty(page)?;
        self.stats.writebacks += 1;
        debug!("wrote back page {} from frame {}", page, frame);
        Ok(())
    }

    fn physical_address(&self, va: &VirtualAddress) -> Result<usize> {
        let frame = self.page_table.frame_of(va.page)?;
        Ok(translation::translate(va, frame, self.config.page_bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: u32 = 4096;

    /// 8 pages of 4 KiB, 4 frames, store[i] = i mod 256
    fn scenario() -> VmManager {
        let config = PagerConfig::from_page_size(4096, 8, 4).unwrap();
        let data: Vec<u8> = (0..config.store_size()).map(|i| (i % 256) as u8).collect();
        VmManager::from_bytes(config, data).unwrap()
    }

    #[test]
    fn test_first_touch_loads_from_store() {
        let mut vm = scenario();
        assert!(!vm.is_resident(2));

        assert_eq!(vm.get_byte(2 * PAGE + 300).unwrap(), (300 % 256) as u8);
        assert!(vm.is_resident(2));
        assert_eq!(vm.stats().faults, 1);
        vm.check_invariants().unwrap();
    }

    #[test]
    fn test_resident_access_does_not_fault() {
        let mut vm = scenario();
        vm.get_byte(5).unwrap();
        vm.get_byte(6).unwrap();
        vm.set_byte(7, 1).unwrap();

        let stats = vm.stats();
        assert_eq!(stats.faults, 1);
        assert_eq!(stats.accesses(), 3);
        assert_eq!(stats.hits(), 2);
    }

    #[test]
    fn test_set_then_get() {
        let mut vm = scenario();
        vm.set_byte(3 * PAGE + 17, 0xAB).unwrap();
        assert_eq!(vm.get_byte(3 * PAGE + 17).unwrap(), 0xAB);
        assert!(vm.page_state(3).unwrap().is_dirty());
    }

    #[test]
    fn test_frames_assigned_in_order() {
        let mut vm = scenario();
        for page in 0..4 {
            vm.get_byte(page * PAGE).unwrap();
        }
        for page in 0..4 {
            assert_eq!(
                vm.page_state(page as usize).unwrap(),
                PageState::Present { frame: page as usize, dirty: false }
            );
        }
    }

    #[test]
    fn test_eviction_scenario() {
        let mut vm = scenario();
        for page in 0..4 {
            vm.get_byte(page * PAGE).unwrap();
        }
        assert_eq!(vm.resident_pages(), vec![3, 2, 1, 0]);

        vm.get_byte(4 * PAGE).unwrap();
        assert!(!vm.is_resident(0));
        assert_eq!(vm.page_state(4).unwrap().frame(), Some(0));
        assert_eq!(vm.lru_victim(), Some(1));

        // reload page 0 from the store, pushing out page 1
        assert_eq!(vm.get_byte(100).unwrap(), 100);
        assert!(vm.is_resident(0));
        assert!(vm.is_resident(4));
        assert!(!vm.is_resident(1));
        assert_eq!(vm.page_state(0).unwrap().frame(), Some(1));
        assert_eq!(vm.lru_victim(), Some(2));
        assert_eq!(vm.stats().evictions, 2);
        vm.check_invariants().unwrap();
    }

    #[test]
    fn test_touch_refreshes_recency() {
        let mut vm = scenario();
        for page in 0..4 {
            vm.get_byte(page * PAGE).unwrap();
        }
        // page 0 is LRU until it is used again
        vm.get_byte(10).unwrap();
        assert_eq!(vm.lru_victim(), Some(1));

        vm.get_byte(4 * PAGE).unwrap();
        assert!(vm.is_resident(0));
        assert!(!vm.is_resident(1));
    }

    #[test]
    fn test_dirty_page_written_back_on_eviction() {
        let mut vm = scenario();
        vm.set_byte(PAGE + 5, 0xEE).unwrap();
        assert_eq!(vm.backing_store().read_byte(PAGE as usize + 5).unwrap(), 5);

        for page in 2..6 {
            vm.get_byte(page * PAGE).unwrap();
        }
        assert!(!vm.is_resident(1));
        assert_eq!(vm.backing_store().read_byte(PAGE as usize + 5).unwrap(), 0xEE);
        assert_eq!(vm.stats().writebacks, 1);

        assert_eq!(vm.get_byte(PAGE + 5).unwrap(), 0xEE);
        assert!(!vm.page_state(1).unwrap().is_dirty());
    }

    #[test]
    fn test_clean_eviction_leaves_store_untouched() {
        let mut vm = scenario();
        let before = vm.backing_store().as_bytes().to_vec();
        for page in 0..8 {
            vm.get_byte(page * PAGE + 1).unwrap();
        }
        assert_eq!(vm.stats().evictions, 4);
        assert_eq!(vm.stats().writebacks, 0);
        assert_eq!(vm.backing_store().as_bytes(), &before[..]);
    }

    #[test]
    fn test_out_of_range_mutates_nothing() {
        let mut vm = scenario();
        vm.get_byte(0).unwrap();
        let stats = vm.stats();

        let err = vm.get_byte(8 * PAGE).unwrap_err();
        assert_eq!(err, PagingError::AddressOutOfRange { page: 8, total_pages: 8 });
        assert!(vm.set_byte(u32::MAX, 1).is_err());

        assert_eq!(vm.stats(), stats);
        assert_eq!(vm.resident_pages(), vec![0]);
        vm.check_invariants().unwrap();
    }

    #[test]
    fn test_flush_keeps_pages_resident() {
        let mut vm = scenario();
        vm.set_byte(10, 1).unwrap();
        vm.set_byte(PAGE + 10, 2).unwrap();
        vm.get_byte(2 * PAGE).unwrap();

        assert_eq!(vm.flush().unwrap(), 2);
        assert_eq!(vm.backing_store().read_byte(10).unwrap(), 1);
        assert_eq!(vm.backing_store().read_byte(PAGE as usize + 10).unwrap(), 2);
        assert!(vm.is_resident(0) && vm.is_resident(1));
        assert!(!vm.page_state(0).unwrap().is_dirty());
        assert_eq!(vm.flush().unwrap(), 0);
    }

    #[test]
    fn test_into_backing_store_flushes() {
        let mut vm = scenario();
        vm.set_byte(7 * PAGE + 4095, 9).unwrap();
        let store = vm.into_backing_store().unwrap();
        assert_eq!(store.as_bytes()[8 * 4096 - 1], 9);
    }

    #[test]
    fn test_single_frame() {
        let config = PagerConfig::new(4, 4, 1).unwrap();
        let mut vm = VmManager::from_bytes(config, vec![0; 64]).unwrap();
        vm.set_byte(0, 1).unwrap();
        vm.set_byte(16, 2).unwrap();
        vm.set_byte(32, 3).unwrap();
        assert_eq!(vm.get_byte(0).unwrap(), 1);
        assert_eq!(vm.get_byte(16).unwrap(), 2);
        assert_eq!(vm.get_byte(32).unwrap(), 3);
        assert_eq!(vm.resident_pages(), vec![2]);
        vm.check_invariants().unwrap();
    }

    #[test]
    fn test_mismatched_store_rejected() {
        let config = PagerConfig::new(4, 4, 2).unwrap();
        let err = VmManager::from_bytes(config, vec![0; 63]).err();
        assert_eq!(err, Some(PagingError::StoreSize { expected: 64, actual: 63 }));

        let other = PagerConfig::new(4, 8, 2).unwrap();
        let store = BackingStore::new(vec![0; other.store_size()], &other).unwrap();
        assert!(VmManager::new(config, store).is_err());
    }

    #[test]
    fn test_drained_lru_with_full_memory_is_an_invariant_violation() {
        let config = PagerConfig::new(4, 4, 1).unwrap();
        let mut vm = VmManager::from_bytes(config, vec![0; 64]).unwrap();
        vm.get_byte(0).unwrap();

        // page 0 stays mapped but the queue forgets it
        assert_eq!(vm.lru.evict(), Ok(0));
        assert!(matches!(vm.check_invariants(), Err(PagingError::InvariantViolation(_))));

        let err = vm.get_byte(16).unwrap_err();
        assert!(!err.is_recoverable());
        match err {
            PagingError::InvariantViolation(msg) => assert!(msg.contains("LRU queue is empty")),
            other => panic!("expected invariant violation, got {:?}", other),
        }
    }

    #[test]
    fn test_shared_frame_detected() {
        let config = PagerConfig::new(4, 4, 2).unwrap();
        let mut vm = VmManager::from_bytes(config, vec![0; 64]).unwrap();
        vm.get_byte(0).unwrap();
        vm.get_byte(16).unwrap();
        vm.check_invariants().unwrap();

        vm.page_table.mark_present(1, 0).unwrap();
        let err = vm.check_invariants().unwrap_err();
        assert_eq!(
            err,
            PagingError::InvariantViolation("frame 0 owned by pages 0 and 1".into())
        );
    }

    #[test]
    fn test_unallocated_frame_detected() {
        let config = PagerConfig::new(4, 4, 2).unwrap();
        let mut vm = VmManager::from_bytes(config, vec![0; 64]).unwrap();
        vm.get_byte(0).unwrap();

        vm.page_table.mark_present(0, 1).unwrap();
        let err = vm.check_invariants().unwrap_err();
        assert_eq!(
            err,
            PagingError::InvariantViolation("page 0 maps unallocated frame 1".into())
        );
    }
}

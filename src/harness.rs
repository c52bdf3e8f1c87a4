//! Seeded test driver.
//!
//! Fills the backing store with pseudo-random bytes, keeps a shadow copy of
//! what every address should contain, and runs a fixed sequence of read and
//! write phases against a [`VmManager`], stopping at the first byte that
//! disagrees with the shadow copy.

use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::PagerConfig;
use crate::error::PagingError;
use crate::vm_manager::{PagingStats, VmManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SpotCheck,
    RandomReads,
    VerifyReads,
    DenseReads,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::SpotCheck => "spot check",
            Phase::RandomReads => "random reads",
            Phase::VerifyReads => "verify reads",
            Phase::DenseReads => "dense reads",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Paging(#[from] PagingError),

    #[error("{phase}: mismatch at address {address}: expected {expected}, got {actual}")]
    Mismatch {
        phase: Phase,
        address: u32,
        expected: u8,
        actual: u8,
    },
}

/// Phase sizes and seed for one driver run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    pub seed: u64,
    pub reads: usize,
    pub writes: usize,
    pub verify_reads: usize,
    pub dense_reads: usize,
    /// Write addresses are multiples of this, below `(page_size - 1) * stride`
    pub write_stride: u64,
    /// Pages covered by the dense read phase
    pub dense_pages: usize,
    /// Run `check_invariants` after every access
    pub check: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            seed: 1,
            reads: 1001,
            writes: 101,
            verify_reads: 17,
            dense_reads: 2501,
            write_stride: 7,
            dense_pages: 5,
            check: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessReport {
    pub accesses: usize,
    pub stats: PagingStats,
}

pub struct Harness {
    vm: VmManager,
    expected: Vec<u8>,
    rng: StdRng,
    check: bool,
    accesses: usize,
}

impl Harness {
    /// Seed a fresh store and build the manager over it
    pub fn new(config: PagerConfig, seed: u64) -> Result<Self, HarnessError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut data = vec![0u8; config.store_size()];
        rng.fill(&mut data[..]);
        let expected = data.clone();
        let vm = VmManager::from_bytes(config, data)?;
        Ok(Harness { vm, expected, rng, check: false, accesses: 0 })
    }

    pub fn run(config: PagerConfig, hc: &HarnessConfig) -> Result<HarnessReport, HarnessError> {
        let mut harness = Self::new(config, hc.seed)?;
        harness.check = hc.check;

        harness.spot_check()?;
        harness.random_reads(Phase::RandomReads, hc.reads, None)?;
        harness.writes(hc.writes, hc.write_stride)?;
        harness.random_reads(Phase::VerifyReads, hc.verify_reads, None)?;
        harness.random_reads(Phase::DenseReads, hc.dense_reads, Some(hc.dense_pages))?;

        let report = harness.report();
        info!("harness done: {}", report.stats);
        Ok(report)
    }

    pub fn vm(&self) -> &VmManager {
        &self.vm
    }

    pub fn expected(&self) -> &[u8] {
        &self.expected
    }

    pub fn report(&self) -> HarnessReport {
        HarnessReport {
            accesses: self.accesses,
            stats: self.vm.stats(),
        }
    }

    /// Read the same address in the middle of the last page twice
    pub fn spot_check(&mut self) -> Result<(), HarnessError> {
        let config = *self.vm.config();
        let address = (config.store_size() - 1 - (config.page_size() - 1) / 2) as u32;
        self.read_and_verify(Phase::SpotCheck, address)?;
        self.read_and_verify(Phase::SpotCheck, address)
    }

    /// Random reads over the first `pages` pages, or the whole store
    pub fn random_reads(
        &mut self,
        phase: Phase,
        count: usize,
        pages: Option<usize>,
    ) -> Result<(), HarnessError> {
        let span = self.span(pages);
        for _ in 0..count {
            let address = self.rng.gen_range(0..span) as u32;
            self.read_and_verify(phase, address)?;
        }
        Ok(())
    }

    /// Random writes at multiples of `stride`, mirrored into the shadow copy
    pub fn writes(&mut self, count: usize, stride: u64) -> Result<(), HarnessError> {
        let stride = stride.max(1);
        let slots = self.write_slots(stride);
        for _ in 0..count {
            let address = (self.rng.gen_range(0..slots) * stride) as u32;
            let value = (address as u8) >> 1;
            self.vm.set_byte(address, value)?;
            self.expected[address as usize] = value;
            self.after_access()?;
        }
        Ok(())
    }

    fn read_and_verify(&mut self, phase: Phase, address: u32) -> Result<(), HarnessError> {
        let actual = self.vm.get_byte(address)?;
        let expected = self.expected[address as usize];
        if actual != expected {
            error!("{}: address {} expected {} got {}", phase, address, expected, actual);
            for page in self.vm.resident_pages() {
                error!("  resident page {}: {:?}", page, self.vm.page_state(page));
            }
            return Err(HarnessError::Mismatch { phase, address, expected, actual });
        }
        self.after_access()
    }

    fn after_access(&mut self) -> Result<(), HarnessError> {
        self.accesses += 1;
        if self.check {
            self.vm.check_invariants()?;
        }
        Ok(())
    }

    // one slot per byte of a page but one, cut short where the store ends
    fn write_slots(&self, stride: u64) -> u64 {
        let page_size = self.vm.config().page_size() as u64;
        let limit = (self.span(None) - 1) / stride + 1;
        page_size.saturating_sub(1).clamp(1, limit)
    }

    // in bytes; a full 4 GiB store does not fit in u32
    fn span(&self, pages: Option<usize>) -> u64 {
        let config = self.vm.config();
        let pages = pages.map_or(config.total_pages, |p| p.clamp(1, config.total_pages));
        (pages * config.page_size()) as u64
    }
}

//! Resource bindings.
//!
//! Turns cache and memory specs into the live resources a board schedules.
//! Specs may reach this point without going through `TopologyBuilder`, so each
//! binding re-runs the topology checks it depends on before allocating
//! anything. L2 banks are assigned round-robin:
//! 1. **More banks than cores:** core `c` owns every bank `b` with `b % N == c`.
//! 2. **Fewer banks than cores:** core `c` shares bank `c % B` with the other cores mapped there.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::error::{CheckpointError, ConfigurationError};
use crate::common::units::ClockDomain;
use crate::requires::CoherenceProtocol;
use crate::soc::cache::Cache;
use crate::soc::memory::MemorySystem;
use crate::topology::{CacheHierarchySpec, CacheSpec, MemorySpec, ProcessorSpec};

/// Kind of access a core makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// Instruction fetch (L1I).
    Fetch,
    /// Data load (L1D).
    Load,
    /// Data store (L1D).
    Store,
}

/// Round-robin assignment of `banks` L2 banks to `cores` cores.
///
/// Returns one non-empty bank list per core. Callers must have checked that
/// the counts are evenly distributable.
pub fn bank_assignment(banks: usize, cores: usize) -> Vec<Vec<usize>> {
    (0..cores)
        .map(|core| {
            if banks >= cores {
                (0..banks).filter(|b| b % cores == core).collect()
            } else {
                vec![core % banks]
            }
        })
        .collect()
}

/// Cache tag arrays captured by a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheImage {
    /// Per-core L1 instruction caches.
    pub l1i: Vec<Cache>,
    /// Per-core L1 data caches.
    pub l1d: Vec<Cache>,
    /// L2 banks.
    pub l2_banks: Vec<Cache>,
}

/// Live cache hierarchy of a board.
#[derive(Debug, Clone)]
pub struct CacheHierarchy {
    protocol: CoherenceProtocol,
    l1i: Vec<Cache>,
    l1d: Vec<Cache>,
    l2_banks: Vec<Cache>,
    bank_map: Vec<Vec<usize>>,
}

impl CacheHierarchy {
    /// Coherence protocol.
    pub const fn protocol(&self) -> CoherenceProtocol {
        self.protocol
    }

    /// L1 instruction caches, one per core.
    pub fn l1i(&self) -> &[Cache] {
        &self.l1i
    }

    /// L1 data caches, one per core.
    pub fn l1d(&self) -> &[Cache] {
        &self.l1d
    }

    /// L2 banks.
    pub fn l2_banks(&self) -> &[Cache] {
        &self.l2_banks
    }

    /// Banks each core's L1 misses are routed to.
    pub fn bank_map(&self) -> &[Vec<usize>] {
        &self.bank_map
    }

    /// Bank serving `addr` for `core`, and the address as seen by that bank.
    ///
    /// A core owning several banks interleaves lines across them; the bank
    /// index bits are stripped so each bank uses all of its sets.
    pub fn route(&self, core: usize, addr: u64, line_bytes: u64) -> Option<(usize, u64)> {
        let owned = self.bank_map.get(core)?;
        let ways = owned.len() as u64;
        let line = addr / line_bytes;
        let bank = *owned.get((line % ways) as usize)?;
        let local = (line / ways) * line_bytes + addr % line_bytes;
        Some((bank, local))
    }

    /// Times one access by `core`, filling from memory on an L2 miss.
    ///
    /// A store invalidates the line in every other core's L1D.
    pub fn access(
        &mut self,
        core: usize,
        addr: u64,
        kind: AccessKind,
        line_bytes: u64,
        memory: &mut MemorySystem,
    ) -> u64 {
        let is_write = kind == AccessKind::Store;
        let l1 = match kind {
            AccessKind::Fetch => self.l1i.get_mut(core),
            AccessKind::Load | AccessKind::Store => self.l1d.get_mut(core),
        };
        let Some(l1) = l1 else {
            return 0;
        };
        let l1_lookup = l1.access(addr, is_write);
        let mut cycles = l1.latency();

        if is_write {
            for (other, cache) in self.l1d.iter_mut().enumerate() {
                if other != core {
                    let _ = cache.invalidate(addr);
                }
            }
        }

        if l1_lookup.hit && !l1_lookup.writeback {
            return cycles;
        }
        let Some((bank, local)) = self.route(core, addr, line_bytes) else {
            return cycles;
        };
        let Some(l2) = self.l2_banks.get_mut(bank) else {
            return cycles;
        };
        if l1_lookup.writeback {
            cycles += l2.latency();
        }
        if l1_lookup.hit {
            return cycles;
        }
        let l2_lookup = l2.access(local, false);
        cycles += l2.latency();
        if l2_lookup.writeback {
            cycles += memory.writeback_latency();
        }
        if !l2_lookup.hit {
            cycles += memory.access_latency(addr);
        }
        cycles
    }

    /// Zeroes every cache's counters.
    pub fn reset_counters(&mut self) {
        self.l1i
            .iter_mut()
            .chain(self.l1d.iter_mut())
            .chain(self.l2_banks.iter_mut())
            .for_each(Cache::reset_counters);
    }

    /// Captures every tag array.
    pub fn image(&self) -> CacheImage {
        CacheImage {
            l1i: self.l1i.clone(),
            l1d: self.l1d.clone(),
            l2_banks: self.l2_banks.clone(),
        }
    }

    /// Restores every tag array.
    ///
    /// # Errors
    ///
    /// `CheckpointError::Incompatible` when the number of caches differs.
    pub fn restore(&mut self, image: CacheImage) -> Result<(), CheckpointError> {
        if image.l1i.len() != self.l1i.len()
            || image.l1d.len() != self.l1d.len()
            || image.l2_banks.len() != self.l2_banks.len()
        {
            return Err(CheckpointError::Incompatible(
                "cache hierarchy shape differs from the board".to_string(),
            ));
        }
        self.l1i = image.l1i;
        self.l1d = image.l1d;
        self.l2_banks = image.l2_banks;
        Ok(())
    }
}

fn build_cache(spec: &CacheSpec, line_bytes: usize) -> Cache {
    let sets = spec.sets(line_bytes).unwrap_or(1);
    Cache::new(sets, spec.assoc, line_bytes, spec.latency)
}

/// Binds a cache hierarchy spec to a processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheHierarchyBinding;

impl CacheHierarchyBinding {
    /// Allocates per-core L1s and the banked L2.
    ///
    /// # Errors
    ///
    /// Geometry errors, or `UnevenBanks` if the banks cannot be spread over the cores.
    pub fn bind(
        spec: &CacheHierarchySpec,
        processor: &ProcessorSpec,
    ) -> Result<CacheHierarchy, ConfigurationError> {
        processor.check()?;
        spec.check_geometry()?;
        spec.check_banks(processor.num_cores)?;

        let cores = processor.num_cores;
        let bank_spec = spec.l2_bank();
        let bank_map = bank_assignment(spec.num_l2_banks, cores);
        debug!(?bank_map, "l2 banks assigned");
        Ok(CacheHierarchy {
            protocol: spec.protocol,
            l1i: (0..cores).map(|_| build_cache(&spec.l1i, spec.line_bytes)).collect(),
            l1d: (0..cores).map(|_| build_cache(&spec.l1d, spec.line_bytes)).collect(),
            l2_banks: (0..spec.num_l2_banks)
                .map(|_| build_cache(&bank_spec, spec.line_bytes))
                .collect(),
            bank_map,
        })
    }
}

/// Binds a memory spec to a processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBinding;

impl MemoryBinding {
    /// Allocates the memory channels.
    ///
    /// # Errors
    ///
    /// Capacity, channel, alignment, or address-range errors.
    pub fn bind(
        spec: &MemorySpec,
        processor: &ProcessorSpec,
        line_bytes: usize,
        clock: &ClockDomain,
    ) -> Result<MemorySystem, ConfigurationError> {
        processor.check()?;
        if line_bytes == 0 {
            return Err(ConfigurationError::NonPositive("cache line size"));
        }
        spec.check(processor, line_bytes)?;
        debug!(
            channels = spec.channels,
            capacity = %spec.capacity,
            timing = %spec.timing,
            "memory bound"
        );
        Ok(MemorySystem::new(spec, line_bytes, clock))
    }
}

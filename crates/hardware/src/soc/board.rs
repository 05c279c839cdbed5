//! Board construction and the top-level `Board` type.
//!
//! This module assembles the simulated computer from a validated `Topology`. It performs:
//! 1. **Processor setup:** Creates every core slot on its starting variant.
//! 2. **Resource binding:** Binds the cache hierarchy and memory to the processor.
//! 3. **Workload loading:** Resolves a resource through an injected provider and
//!    places its segments in memory, resetting every core to the entry point.
//! 4. **Core ports:** Routes each core's accesses through its caches to memory.

use tracing::info;

use crate::common::error::{ConfigurationError, ResourceNotFoundError, SimulationFault};
use crate::common::units::ClockDomain;
use crate::core::exec::{DataPort, Executed, Timed};
use crate::core::models::Step;
use crate::core::processor::SwitchableProcessor;
use crate::core::state::CoreState;
use crate::sim::workload::{ResourceProvider, WorkloadResource};
use crate::soc::binding::{AccessKind, CacheHierarchy, CacheHierarchyBinding, MemoryBinding};
use crate::soc::memory::MemorySystem;
use crate::topology::Topology;

/// Stack reserved for each core below the top of memory.
pub const STACK_BYTES_PER_CORE: u64 = 64 * 1024;

/// Top-level simulated computer.
///
/// Owns its processor, cache hierarchy, memory, and clock exclusively.
#[derive(Debug, Clone)]
pub struct Board {
    topology: Topology,
    clock: ClockDomain,
    processor: SwitchableProcessor,
    caches: CacheHierarchy,
    memory: MemorySystem,
    workload: Option<WorkloadResource>,
}

impl Board {
    /// Builds a board from a topology.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` if a binding rejects its spec.
    pub fn new(topology: Topology) -> Result<Self, ConfigurationError> {
        let processor_spec = *topology.processor();
        let cache_spec = *topology.cache();
        let clock = *topology.clock();

        let processor = SwitchableProcessor::new(&processor_spec);
        let caches = CacheHierarchyBinding::bind(&cache_spec, &processor_spec)?;
        let memory = MemoryBinding::bind(
            topology.memory(),
            &processor_spec,
            cache_spec.line_bytes,
            &clock,
        )?;

        info!(
            cores = processor.num_cores(),
            protocol = %caches.protocol(),
            memory_base = format_args!("{:#x}", memory.base()),
            "board constructed"
        );
        Ok(Self {
            topology,
            clock,
            processor,
            caches,
            memory,
            workload: None,
        })
    }

    /// Topology the board was built from.
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Board clock.
    pub const fn clock(&self) -> &ClockDomain {
        &self.clock
    }

    /// Processor.
    pub const fn processor(&self) -> &SwitchableProcessor {
        &self.processor
    }

    pub(crate) fn processor_mut(&mut self) -> &mut SwitchableProcessor {
        &mut self.processor
    }

    /// Cache hierarchy.
    pub const fn caches(&self) -> &CacheHierarchy {
        &self.caches
    }

    pub(crate) fn caches_mut(&mut self) -> &mut CacheHierarchy {
        &mut self.caches
    }

    /// Main memory.
    pub const fn memory(&self) -> &MemorySystem {
        &self.memory
    }

    pub(crate) fn memory_mut(&mut self) -> &mut MemorySystem {
        &mut self.memory
    }

    /// Attached workload, if any.
    pub const fn workload(&self) -> Option<&WorkloadResource> {
        self.workload.as_ref()
    }

    /// Resolves and loads a workload.
    ///
    /// Every core is reset to the image entry point with its hart id in `a0`
    /// and its own stack at the top of memory.
    ///
    /// # Errors
    ///
    /// `ResourceNotFoundError` if the provider cannot resolve `id` or a segment
    /// falls outside memory. The board is left without a workload in that case.
    pub fn set_workload(
        &mut self,
        provider: &dyn ResourceProvider,
        id: &str,
    ) -> Result<(), ResourceNotFoundError> {
        let resource = provider.resolve(id, self.memory.base())?;
        for segment in &resource.image.segments {
            if !self.memory.contains(segment.addr, segment.data.len() as u64) {
                return Err(ResourceNotFoundError::OutOfRange {
                    id: id.to_string(),
                    addr: segment.addr,
                    len: segment.data.len(),
                });
            }
        }
        for segment in &resource.image.segments {
            let _ = self.memory.load(segment.addr, &segment.data);
        }

        let top = u128::from(self.memory.base()) + u128::from(self.memory.capacity());
        let entry = resource.image.entry;
        let states = (0..self.processor.num_cores())
            .map(|hart| {
                let stack_top = top.saturating_sub(u128::from(hart as u64 * STACK_BYTES_PER_CORE));
                CoreState::at_entry(hart, entry, stack_pointer(stack_top))
            })
            .collect();
        self.processor.reset(states);

        info!(
            id,
            entry = format_args!("{entry:#x}"),
            segments = resource.image.segments.len(),
            "workload attached"
        );
        self.workload = Some(resource);
        Ok(())
    }

    /// Issues the next instruction on `core`.
    pub(crate) fn step_core(&mut self, core: usize) -> Result<Step, SimulationFault> {
        let line_bytes = self.topology.cache().line_bytes as u64;
        let mut port = CorePort {
            core,
            line_bytes,
            caches: &mut self.caches,
            memory: &mut self.memory,
        };
        self.processor.step(core, &mut port)
    }

    /// Retires the in-flight instruction on `core`.
    pub(crate) fn complete_core(&mut self, core: usize) -> Result<Executed, SimulationFault> {
        self.processor.complete(core)
    }
}

/// Initial stack pointer for a stack ending at `top`. Memory ending at 2^64
/// starts the stack at the highest 16-byte aligned address instead.
fn stack_pointer(top: u128) -> u64 {
    u64::try_from(top).unwrap_or(u64::MAX & !0xf)
}

/// Memory port of one core: timing through its caches, contents from memory.
struct CorePort<'a> {
    core: usize,
    line_bytes: u64,
    caches: &'a mut CacheHierarchy,
    memory: &'a mut MemorySystem,
}

impl CorePort<'_> {
    fn time(&mut self, addr: u64, kind: AccessKind) -> u64 {
        self.caches
            .access(self.core, addr, kind, self.line_bytes, self.memory)
    }
}

impl DataPort for CorePort<'_> {
    fn fetch(&mut self, pc: u64) -> Option<Timed<u32>> {
        let value = self.memory.read(pc, 4)? as u32;
        let cycles = self.time(pc, AccessKind::Fetch);
        Some(Timed { value, cycles })
    }

    fn load(&mut self, addr: u64, size: usize) -> Option<Timed<u64>> {
        let value = self.memory.read(addr, size)?;
        let cycles = self.time(addr, AccessKind::Load);
        Some(Timed { value, cycles })
    }

    fn store(&mut self, addr: u64, size: usize, val: u64) -> Option<Timed<()>> {
        if !self.memory.write(addr, size, val) {
            return None;
        }
        let cycles = self.time(addr, AccessKind::Store);
        Some(Timed { value: (), cycles })
    }
}

//! Board topology composition.
//!
//! The `TopologyBuilder` takes the typed component specs and produces an
//! immutable `Topology`, rejecting any combination that would leave the board
//! structurally inconsistent. Checks run in a fixed order so that a spec with
//! several problems always reports the same one:
//! 1. **Components:** processor, cache hierarchy, memory, and clock are all present.
//! 2. **ISA/protocol:** the processor ISA and hierarchy protocol match the validated requirements.
//! 3. **Processor/cache:** core count, address width, clock, cache geometry, and bank distribution.
//! 4. **Processor/memory:** capacity, channel split, base alignment, and address range.
//!
//! The component checks are methods on the specs so the resource bindings can
//! re-run the ones they depend on.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::error::ConfigurationError;
use crate::common::units::{ByteSize, ClockDomain, Frequency};
use crate::core::models::CpuType;
use crate::requires::{CoherenceProtocol, Isa, RequirementSpec, ValidatedRequirements};
use crate::soc::memory::MemoryTiming;

/// Smallest and largest supported physical address widths.
const ADDRESS_BITS: std::ops::RangeInclusive<u32> = 12..=64;

/// Processor specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorSpec {
    /// ISA the cores implement.
    pub isa: Isa,
    /// Number of cores.
    pub num_cores: usize,
    /// Model every core starts on.
    pub starting_core_type: CpuType,
    /// Model every core can switch to.
    pub switch_core_type: CpuType,
    /// Physical address width in bits.
    pub address_bits: u32,
}

impl ProcessorSpec {
    /// Creates a spec with the ISA's default address width.
    pub const fn new(
        isa: Isa,
        num_cores: usize,
        starting_core_type: CpuType,
        switch_core_type: CpuType,
    ) -> Self {
        Self {
            isa,
            num_cores,
            starting_core_type,
            switch_core_type,
            address_bits: isa.default_address_bits(),
        }
    }

    /// Checks the core count and address width.
    ///
    /// # Errors
    ///
    /// `NonPositive` for zero cores, `AddressWidth` outside 12..=64 bits.
    pub fn check(&self) -> Result<(), ConfigurationError> {
        if self.num_cores == 0 {
            return Err(ConfigurationError::NonPositive("core count"));
        }
        if !ADDRESS_BITS.contains(&self.address_bits) {
            return Err(ConfigurationError::AddressWidth(self.address_bits));
        }
        Ok(())
    }

    /// Size of the physical address space in bytes.
    pub fn address_space(&self) -> u128 {
        1u128 << self.address_bits
    }
}

/// One cache level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSpec {
    /// Capacity.
    pub size: ByteSize,
    /// Associativity.
    pub assoc: usize,
    /// Hit latency in cycles.
    pub latency: u64,
}

impl CacheSpec {
    /// Creates a level spec.
    pub const fn new(size: ByteSize, assoc: usize, latency: u64) -> Self {
        Self {
            size,
            assoc,
            latency,
        }
    }

    /// Number of sets for a given line size, if the geometry is whole.
    pub fn sets(&self, line_bytes: usize) -> Option<usize> {
        let set_bytes = (self.assoc as u64).checked_mul(line_bytes as u64)?;
        if set_bytes == 0 || self.size.bytes() % set_bytes != 0 {
            return None;
        }
        usize::try_from(self.size.bytes() / set_bytes)
            .ok()
            .filter(|&s| s > 0)
    }
}

/// Private L1s plus a shared, banked L2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHierarchySpec {
    /// Coherence protocol the hierarchy implements.
    pub protocol: CoherenceProtocol,
    /// Per-core L1 instruction cache.
    pub l1i: CacheSpec,
    /// Per-core L1 data cache.
    pub l1d: CacheSpec,
    /// Shared L2, total capacity across all banks.
    pub l2: CacheSpec,
    /// Number of L2 banks.
    pub num_l2_banks: usize,
    /// Cache line size in bytes.
    pub line_bytes: usize,
}

impl CacheHierarchySpec {
    /// Capacity of one L2 bank.
    pub fn l2_bank(&self) -> CacheSpec {
        let banks = self.num_l2_banks.max(1) as u64;
        CacheSpec::new(ByteSize(self.l2.size.bytes() / banks), self.l2.assoc, self.l2.latency)
    }

    /// Checks line size, every level's geometry, and the per-bank L2 geometry.
    ///
    /// # Errors
    ///
    /// `NonPositive` for a zero size, associativity, line size, or bank count;
    /// `CacheGeometry` when a capacity is not a whole number of sets.
    pub fn check_geometry(&self) -> Result<(), ConfigurationError> {
        if self.line_bytes == 0 {
            return Err(ConfigurationError::NonPositive("cache line size"));
        }
        let levels = [
            ("l1i", "l1i capacity", "l1i associativity", self.l1i),
            ("l1d", "l1d capacity", "l1d associativity", self.l1d),
            ("l2", "l2 capacity", "l2 associativity", self.l2),
        ];
        for (level, size_name, assoc_name, spec) in levels {
            if spec.size.bytes() == 0 {
                return Err(ConfigurationError::NonPositive(size_name));
            }
            if spec.assoc == 0 {
                return Err(ConfigurationError::NonPositive(assoc_name));
            }
            if !self.line_bytes.is_power_of_two() || spec.sets(self.line_bytes).is_none() {
                return Err(self.geometry_error(level, spec));
            }
        }
        if self.num_l2_banks == 0 {
            return Err(ConfigurationError::NonPositive("l2 bank count"));
        }
        let bank = self.l2_bank();
        if self.l2.size.bytes() % self.num_l2_banks as u64 != 0
            || bank.sets(self.line_bytes).is_none()
        {
            return Err(self.geometry_error("l2 bank", bank));
        }
        Ok(())
    }

    /// Checks that the L2 banks spread evenly over `cores`.
    ///
    /// # Errors
    ///
    /// `UnevenBanks`.
    pub fn check_banks(&self, cores: usize) -> Result<(), ConfigurationError> {
        if evenly_distributable(self.num_l2_banks, cores) {
            Ok(())
        } else {
            Err(ConfigurationError::UnevenBanks {
                banks: self.num_l2_banks,
                cores,
            })
        }
    }

    const fn geometry_error(&self, level: &'static str, spec: CacheSpec) -> ConfigurationError {
        ConfigurationError::CacheGeometry {
            level,
            size_bytes: spec.size.0,
            assoc: spec.assoc,
            line_bytes: self.line_bytes,
        }
    }
}

/// Whether `banks` shared-cache banks can serve `cores` cores without starving any.
///
/// True when one count is a multiple of the other.
pub const fn evenly_distributable(banks: usize, cores: usize) -> bool {
    banks > 0 && cores > 0 && (banks % cores == 0 || cores % banks == 0)
}

/// Main memory specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySpec {
    /// Timing class of every channel.
    pub timing: MemoryTiming,
    /// Total capacity.
    pub capacity: ByteSize,
    /// Number of channels.
    pub channels: usize,
    /// Physical base address.
    pub base: u64,
}

impl MemorySpec {
    /// Checks the spec against the processor and cache line size.
    ///
    /// # Errors
    ///
    /// `NonPositive`, `ChannelImbalance`, `MisalignedBase`, or `AddressRangeExceeded`.
    pub fn check(
        &self,
        processor: &ProcessorSpec,
        line_bytes: usize,
    ) -> Result<(), ConfigurationError> {
        let capacity = self.capacity.bytes();
        if capacity == 0 {
            return Err(ConfigurationError::NonPositive("memory capacity"));
        }
        if self.channels == 0 {
            return Err(ConfigurationError::NonPositive("memory channel count"));
        }
        let channels = self.channels as u64;
        let line = line_bytes.max(1) as u64;
        if capacity % channels != 0 || (capacity / channels) % line != 0 {
            return Err(ConfigurationError::ChannelImbalance {
                capacity,
                channels: self.channels,
            });
        }
        if self.base % line != 0 {
            return Err(ConfigurationError::MisalignedBase {
                base: self.base,
                line_bytes,
            });
        }
        if u128::from(self.base) + u128::from(capacity) > processor.address_space() {
            return Err(ConfigurationError::AddressRangeExceeded {
                base: self.base,
                capacity,
                address_bits: processor.address_bits,
            });
        }
        Ok(())
    }
}

/// Immutable, validated description of a board.
///
/// Also serves as the fingerprint a checkpoint is matched against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    requirements: RequirementSpec,
    processor: ProcessorSpec,
    cache: CacheHierarchySpec,
    memory: MemorySpec,
    clock: ClockDomain,
}

impl Topology {
    /// Requirements the board was validated against.
    pub const fn requirements(&self) -> &RequirementSpec {
        &self.requirements
    }

    /// Processor spec.
    pub const fn processor(&self) -> &ProcessorSpec {
        &self.processor
    }

    /// Cache hierarchy spec.
    pub const fn cache(&self) -> &CacheHierarchySpec {
        &self.cache
    }

    /// Memory spec.
    pub const fn memory(&self) -> &MemorySpec {
        &self.memory
    }

    /// Board clock domain.
    pub const fn clock(&self) -> &ClockDomain {
        &self.clock
    }
}

/// Fluent builder for a `Topology`.
///
/// Only obtainable from a `ValidatedRequirements` token.
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    requirements: ValidatedRequirements,
    processor: Option<ProcessorSpec>,
    cache: Option<CacheHierarchySpec>,
    memory: Option<MemorySpec>,
    clock: Option<Frequency>,
}

impl TopologyBuilder {
    /// Starts a topology for validated requirements.
    pub const fn new(requirements: ValidatedRequirements) -> Self {
        Self {
            requirements,
            processor: None,
            cache: None,
            memory: None,
            clock: None,
        }
    }

    /// Sets the processor.
    #[must_use]
    pub const fn processor(mut self, spec: ProcessorSpec) -> Self {
        self.processor = Some(spec);
        self
    }

    /// Sets the cache hierarchy.
    #[must_use]
    pub const fn cache_hierarchy(mut self, spec: CacheHierarchySpec) -> Self {
        self.cache = Some(spec);
        self
    }

    /// Sets main memory.
    #[must_use]
    pub const fn memory(mut self, spec: MemorySpec) -> Self {
        self.memory = Some(spec);
        self
    }

    /// Sets the board clock.
    #[must_use]
    pub const fn clock(mut self, frequency: Frequency) -> Self {
        self.clock = Some(frequency);
        self
    }

    /// Validates the specs and freezes them into a `Topology`.
    ///
    /// # Errors
    ///
    /// The first failing check, in the order documented on this module.
    pub fn build(self) -> Result<Topology, ConfigurationError> {
        let processor = self
            .processor
            .ok_or(ConfigurationError::MissingComponent("processor"))?;
        let cache = self
            .cache
            .ok_or(ConfigurationError::MissingComponent("cache hierarchy"))?;
        let memory = self
            .memory
            .ok_or(ConfigurationError::MissingComponent("memory"))?;
        let frequency = self
            .clock
            .ok_or(ConfigurationError::MissingComponent("board clock"))?;

        let required = self.requirements.spec();
        if processor.isa != required.isa {
            return Err(ConfigurationError::IsaMismatch {
                required: required.isa,
                found: processor.isa,
            });
        }
        if cache.protocol != required.coherence_protocol {
            return Err(ConfigurationError::ProtocolMismatch {
                required: required.coherence_protocol,
                found: cache.protocol,
            });
        }

        processor.check()?;
        let clock = ClockDomain::new(frequency)?;
        cache.check_geometry()?;
        cache.check_banks(processor.num_cores)?;

        memory.check(&processor, cache.line_bytes)?;

        info!(
            cores = processor.num_cores,
            starting = %processor.starting_core_type,
            switch = %processor.switch_core_type,
            l2_banks = cache.num_l2_banks,
            memory = %memory.capacity,
            clock = %frequency,
            "topology composed"
        );
        Ok(Topology {
            requirements: required,
            processor,
            cache,
            memory,
            clock,
        })
    }
}

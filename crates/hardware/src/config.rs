//! Configuration system for the board simulator.
//!
//! This module defines the JSON configuration surface. It provides:
//! 1. **Defaults:** A two-core RISC-V board with a MESI two-level hierarchy and DDR3 memory.
//! 2. **Structures:** One section per component: requirements, board, processor, cache, memory,
//!    workload, switching, and simulation limits.
//! 3. **Conversions:** Sections map onto the typed component specs consumed by the
//!    `TopologyBuilder` and the simulation driver.
//!
//! Every field is optional; a missing field takes the value in `defaults`.
//! Sizes and frequencies accept integers or literals such as `"32KiB"` and `"3GHz"`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::error::ConfigurationError;
use crate::common::units::{ByteSize, Frequency, Tick};
use crate::core::models::CpuType;
use crate::requires::{CoherenceProtocol, Isa, RequirementSpec, RequirementValidator};
use crate::sim::driver::SimulationOptions;
use crate::sim::policy::PolicyConfig;
use crate::soc::memory::MemoryTiming;
use crate::topology::{
    CacheHierarchySpec, CacheSpec, MemorySpec, ProcessorSpec, Topology, TopologyBuilder,
};

/// Default configuration values.
mod defaults {
    use crate::common::units::{ByteSize, Frequency};
    use crate::core::models::CpuType;
    use crate::requires::{CoherenceProtocol, Isa};
    use crate::soc::memory::MemoryTiming;

    pub const ISA: Isa = Isa::RiscV;
    pub const PROTOCOL: CoherenceProtocol = CoherenceProtocol::MesiTwoLevel;

    /// Board clock (3 GHz).
    pub const CLK_FREQ: Frequency = Frequency::ghz(3);

    pub const NUM_CORES: usize = 2;
    pub const STARTING_CORE_TYPE: CpuType = CpuType::Timing;
    pub const SWITCH_CORE_TYPE: CpuType = CpuType::O3;

    pub const L1_SIZE: ByteSize = ByteSize::kib(32);
    pub const L1_ASSOC: usize = 8;
    pub const L2_SIZE: ByteSize = ByteSize::kib(256);
    pub const L2_ASSOC: usize = 16;
    pub const NUM_L2_BANKS: usize = 1;

    /// Cache line size in bytes.
    pub const LINE_BYTES: usize = 64;

    /// L1 hit latency in cycles.
    pub const L1_LATENCY: u64 = 1;

    /// L2 hit latency in cycles.
    pub const L2_LATENCY: u64 = 10;

    pub const MEMORY_TIMING: MemoryTiming = MemoryTiming::Ddr3_1600;
    pub const MEMORY_SIZE: ByteSize = ByteSize::gib(2);
    pub const MEMORY_CHANNELS: usize = 1;

    /// Base address of main memory (2 GiB).
    pub const MEMORY_BASE: u64 = 0x8000_0000;
}

/// Root configuration structure.
///
/// # Examples
///
/// ```
/// use boardsim_core::config::Config;
///
/// let config = Config::from_json_str(r#"{
///     "processor": { "num_cores": 4, "starting_core_type": "ATOMIC" },
///     "cache": { "l2_size": "1MiB", "num_l2_banks": 4 },
///     "memory": { "size": "512MiB", "channels": 2 }
/// }"#).unwrap();
/// assert_eq!(config.processor.num_cores, 4);
/// assert_eq!(config.cache.l2_size.bytes(), 1 << 20);
/// assert_eq!(config.memory.channels, 2);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// ISA and coherence protocol the board must support.
    #[serde(default)]
    pub requirements: RequirementsConfig,
    /// Board-wide parameters.
    #[serde(default)]
    pub board: BoardConfig,
    /// Processor parameters.
    #[serde(default)]
    pub processor: ProcessorConfig,
    /// Cache hierarchy parameters.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Main memory parameters.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Workload selection.
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Automatic switching.
    #[serde(default)]
    pub switching: SwitchingConfig,
    /// Run limits and output.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Config {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// `InvalidLiteral` for a malformed size or frequency, `Parse` otherwise.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(text).map_err(|e| {
            literal_error(&e).unwrap_or_else(|| ConfigurationError::Parse(e.to_string()))
        })
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// `Unreadable` if the file cannot be read, otherwise as `from_json_str`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigurationError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Requirement spec.
    pub const fn requirement_spec(&self) -> RequirementSpec {
        RequirementSpec::new(self.requirements.isa, self.requirements.coherence_protocol)
    }

    /// Processor spec.
    pub fn processor_spec(&self) -> ProcessorSpec {
        let p = &self.processor;
        let mut spec = ProcessorSpec::new(p.isa, p.num_cores, p.starting_core_type, p.switch_core_type);
        if let Some(bits) = p.address_bits {
            spec.address_bits = bits;
        }
        spec
    }

    /// Cache hierarchy spec.
    pub const fn cache_spec(&self) -> CacheHierarchySpec {
        let c = &self.cache;
        CacheHierarchySpec {
            protocol: c.protocol,
            l1i: CacheSpec::new(c.l1i_size, c.l1i_assoc, c.l1_latency),
            l1d: CacheSpec::new(c.l1d_size, c.l1d_assoc, c.l1_latency),
            l2: CacheSpec::new(c.l2_size, c.l2_assoc, c.l2_latency),
            num_l2_banks: c.num_l2_banks,
            line_bytes: c.line_bytes,
        }
    }

    /// Memory spec.
    pub const fn memory_spec(&self) -> MemorySpec {
        MemorySpec {
            timing: self.memory.timing,
            capacity: self.memory.size,
            channels: self.memory.channels,
            base: self.memory.base,
        }
    }

    /// Driver options.
    pub fn simulation_options(&self) -> SimulationOptions {
        let s = &self.simulation;
        SimulationOptions {
            max_ticks: s.max_ticks,
            warmup_instructions: s.warmup_instructions,
            checkpoint_dir: s.checkpoint_dir.clone(),
            checkpoint_on_exit: s.checkpoint_on_exit,
            trace: s.trace,
        }
    }

    /// Validates the requirements and composes the topology.
    ///
    /// # Errors
    ///
    /// The first `ConfigurationError` raised by the validator or the builder.
    pub fn build_topology(
        &self,
        validator: &RequirementValidator,
    ) -> Result<Topology, ConfigurationError> {
        let requirements = validator.validate(&self.requirement_spec())?;
        TopologyBuilder::new(requirements)
            .processor(self.processor_spec())
            .cache_hierarchy(self.cache_spec())
            .memory(self.memory_spec())
            .clock(self.board.clk_freq)
            .build()
    }
}

/// Recovers an `InvalidLiteral` that serde flattened into a message.
fn literal_error(e: &serde_json::Error) -> Option<ConfigurationError> {
    let message = e.to_string();
    let start = message.find("invalid ")?;
    let rest = &message[start + "invalid ".len()..];
    let (kind, rest) = rest.split_once(" literal '")?;
    let (literal, _) = rest.split_once('\'')?;
    let kind = match kind {
        "size" => "size",
        "frequency" => "frequency",
        _ => return None,
    };
    Some(ConfigurationError::InvalidLiteral {
        kind,
        literal: literal.to_string(),
    })
}

/// ISA and coherence protocol requirements.
#[derive(Debug, Clone, Deserialize)]
pub struct RequirementsConfig {
    /// Required ISA.
    #[serde(default = "RequirementsConfig::default_isa")]
    pub isa: Isa,
    /// Required coherence protocol.
    #[serde(default = "RequirementsConfig::default_protocol")]
    pub coherence_protocol: CoherenceProtocol,
}

impl RequirementsConfig {
    const fn default_isa() -> Isa {
        defaults::ISA
    }

    const fn default_protocol() -> CoherenceProtocol {
        defaults::PROTOCOL
    }
}

impl Default for RequirementsConfig {
    fn default() -> Self {
        Self {
            isa: Self::default_isa(),
            coherence_protocol: Self::default_protocol(),
        }
    }
}

/// Board-wide parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    /// Clock shared by every component.
    #[serde(default = "BoardConfig::default_clk_freq")]
    pub clk_freq: Frequency,
}

impl BoardConfig {
    const fn default_clk_freq() -> Frequency {
        defaults::CLK_FREQ
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            clk_freq: Self::default_clk_freq(),
        }
    }
}

/// Processor parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    /// Number of cores.
    #[serde(default = "ProcessorConfig::default_num_cores")]
    pub num_cores: usize,
    /// Model every core starts on.
    #[serde(default = "ProcessorConfig::default_starting_core_type")]
    pub starting_core_type: CpuType,
    /// Model every core can switch to.
    #[serde(default = "ProcessorConfig::default_switch_core_type")]
    pub switch_core_type: CpuType,
    /// ISA the cores implement.
    #[serde(default = "ProcessorConfig::default_isa")]
    pub isa: Isa,
    /// Physical address width; defaults to the ISA's width.
    #[serde(default)]
    pub address_bits: Option<u32>,
}

impl ProcessorConfig {
    const fn default_num_cores() -> usize {
        defaults::NUM_CORES
    }

    const fn default_starting_core_type() -> CpuType {
        defaults::STARTING_CORE_TYPE
    }

    const fn default_switch_core_type() -> CpuType {
        defaults::SWITCH_CORE_TYPE
    }

    const fn default_isa() -> Isa {
        defaults::ISA
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            num_cores: Self::default_num_cores(),
            starting_core_type: Self::default_starting_core_type(),
            switch_core_type: Self::default_switch_core_type(),
            isa: Self::default_isa(),
            address_bits: None,
        }
    }
}

/// Cache hierarchy parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Protocol the hierarchy implements.
    #[serde(default = "CacheConfig::default_protocol")]
    pub protocol: CoherenceProtocol,
    /// L1 data cache capacity.
    #[serde(default = "CacheConfig::default_l1_size")]
    pub l1d_size: ByteSize,
    /// L1 data cache associativity.
    #[serde(default = "CacheConfig::default_l1_assoc")]
    pub l1d_assoc: usize,
    /// L1 instruction cache capacity.
    #[serde(default = "CacheConfig::default_l1_size")]
    pub l1i_size: ByteSize,
    /// L1 instruction cache associativity.
    #[serde(default = "CacheConfig::default_l1_assoc")]
    pub l1i_assoc: usize,
    /// Total L2 capacity across all banks.
    #[serde(default = "CacheConfig::default_l2_size")]
    pub l2_size: ByteSize,
    /// L2 associativity.
    #[serde(default = "CacheConfig::default_l2_assoc")]
    pub l2_assoc: usize,
    /// Number of L2 banks.
    #[serde(default = "CacheConfig::default_num_l2_banks")]
    pub num_l2_banks: usize,
    /// Line size in bytes, shared by every level.
    #[serde(default = "CacheConfig::default_line_bytes")]
    pub line_bytes: usize,
    /// L1 hit latency in cycles.
    #[serde(default = "CacheConfig::default_l1_latency")]
    pub l1_latency: u64,
    /// L2 hit latency in cycles.
    #[serde(default = "CacheConfig::default_l2_latency")]
    pub l2_latency: u64,
}

impl CacheConfig {
    const fn default_protocol() -> CoherenceProtocol {
        defaults::PROTOCOL
    }

    const fn default_l1_size() -> ByteSize {
        defaults::L1_SIZE
    }

    const fn default_l1_assoc() -> usize {
        defaults::L1_ASSOC
    }

    const fn default_l2_size() -> ByteSize {
        defaults::L2_SIZE
    }

    const fn default_l2_assoc() -> usize {
        defaults::L2_ASSOC
    }

    const fn default_num_l2_banks() -> usize {
        defaults::NUM_L2_BANKS
    }

    const fn default_line_bytes() -> usize {
        defaults::LINE_BYTES
    }

    const fn default_l1_latency() -> u64 {
        defaults::L1_LATENCY
    }

    const fn default_l2_latency() -> u64 {
        defaults::L2_LATENCY
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            protocol: Self::default_protocol(),
            l1d_size: Self::default_l1_size(),
            l1d_assoc: Self::default_l1_assoc(),
            l1i_size: Self::default_l1_size(),
            l1i_assoc: Self::default_l1_assoc(),
            l2_size: Self::default_l2_size(),
            l2_assoc: Self::default_l2_assoc(),
            num_l2_banks: Self::default_num_l2_banks(),
            line_bytes: Self::default_line_bytes(),
            l1_latency: Self::default_l1_latency(),
            l2_latency: Self::default_l2_latency(),
        }
    }
}

/// Main memory parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Timing class of every channel.
    #[serde(default = "MemoryConfig::default_timing")]
    pub timing: MemoryTiming,
    /// Total capacity.
    #[serde(default = "MemoryConfig::default_size")]
    pub size: ByteSize,
    /// Number of channels.
    #[serde(default = "MemoryConfig::default_channels")]
    pub channels: usize,
    /// Physical base address.
    #[serde(default = "MemoryConfig::default_base")]
    pub base: u64,
}

impl MemoryConfig {
    const fn default_timing() -> MemoryTiming {
        defaults::MEMORY_TIMING
    }

    const fn default_size() -> ByteSize {
        defaults::MEMORY_SIZE
    }

    const fn default_channels() -> usize {
        defaults::MEMORY_CHANNELS
    }

    const fn default_base() -> u64 {
        defaults::MEMORY_BASE
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            timing: Self::default_timing(),
            size: Self::default_size(),
            channels: Self::default_channels(),
            base: Self::default_base(),
        }
    }
}

/// Workload selection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkloadConfig {
    /// Resource identifier handed to the provider.
    #[serde(default)]
    pub resource: Option<String>,
}

/// Automatic switching.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwitchingConfig {
    /// Trigger policy; `manual` never switches.
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Run limits and output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationConfig {
    /// Stop once simulated time would pass this tick.
    #[serde(default)]
    pub max_ticks: Option<Tick>,
    /// Instructions to retire before statistics are reset.
    #[serde(default)]
    pub warmup_instructions: u64,
    /// Directory checkpoints are written to.
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
    /// Write a checkpoint when the run halts.
    #[serde(default)]
    pub checkpoint_on_exit: bool,
    /// Log every retired instruction at trace level.
    #[serde(default)]
    pub trace: bool,
}

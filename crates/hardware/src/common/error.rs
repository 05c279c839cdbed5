//! Error taxonomy for board construction and simulation.
//!
//! This module defines every error the simulator can report. It provides:
//! 1. **Configuration errors:** Unsupported ISA/protocol or structurally incompatible specs.
//! 2. **Resource errors:** Workload images that cannot be located or loaded.
//! 3. **Switch errors:** Core-type switches on invalid cores or variant pairings.
//! 4. **Simulation faults:** Internal inconsistencies detected during event dispatch.
//! 5. **Exit status:** Mapping of every outcome onto a process exit code.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::models::CpuType;
use crate::requires::{CoherenceProtocol, Isa};

/// Configuration was rejected before any simulated time advanced.
///
/// Raised by the requirement validator, the topology builder, the resource
/// bindings, and the configuration loader. No partial board exists when one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The requested ISA is not in the supported set.
    #[error("unsupported ISA: {0}")]
    UnsupportedIsa(Isa),

    /// The requested coherence protocol is not in the supported set.
    #[error("unsupported coherence protocol: {0}")]
    UnsupportedProtocol(CoherenceProtocol),

    /// Both identifiers are known but not supported together.
    #[error("ISA {isa} cannot be combined with coherence protocol {protocol}")]
    UnsupportedCombination {
        /// Requested ISA.
        isa: Isa,
        /// Requested coherence protocol.
        protocol: CoherenceProtocol,
    },

    /// The processor was declared for a different ISA than required.
    #[error("processor ISA {found} does not match required ISA {required}")]
    IsaMismatch {
        /// ISA required by the requirement spec.
        required: Isa,
        /// ISA the processor spec declares.
        found: Isa,
    },

    /// The cache hierarchy implements a different protocol than required.
    #[error("cache hierarchy protocol {found} does not match required protocol {required}")]
    ProtocolMismatch {
        /// Protocol required by the requirement spec.
        required: CoherenceProtocol,
        /// Protocol the cache hierarchy spec declares.
        found: CoherenceProtocol,
    },

    /// A component spec was never supplied to the builder.
    #[error("board is missing a {0} specification")]
    MissingComponent(&'static str),

    /// A declared count, capacity, associativity, or frequency is zero.
    #[error("{0} must be positive")]
    NonPositive(&'static str),

    /// A cache capacity is not a whole number of sets.
    #[error(
        "{level}: {size_bytes} bytes is not a whole number of {assoc}-way sets of {line_bytes}-byte lines"
    )]
    CacheGeometry {
        /// Cache level name (`l1i`, `l1d`, `l2`, `l2 bank`).
        level: &'static str,
        /// Declared capacity in bytes.
        size_bytes: u64,
        /// Declared associativity.
        assoc: usize,
        /// Cache line size in bytes.
        line_bytes: usize,
    },

    /// Shared cache banks cannot be spread evenly over the cores.
    #[error("{banks} L2 banks cannot be evenly distributed across {cores} cores")]
    UnevenBanks {
        /// Declared bank count.
        banks: usize,
        /// Declared core count.
        cores: usize,
    },

    /// Memory does not fit in the processor's physical address space.
    #[error(
        "memory range {base:#x}..+{capacity:#x} exceeds the processor's {address_bits}-bit address space"
    )]
    AddressRangeExceeded {
        /// Memory base address.
        base: u64,
        /// Memory capacity in bytes.
        capacity: u64,
        /// Processor physical address width.
        address_bits: u32,
    },

    /// Capacity cannot be split evenly across the memory channels.
    #[error("memory capacity {capacity} bytes cannot be split across {channels} channels")]
    ChannelImbalance {
        /// Memory capacity in bytes.
        capacity: u64,
        /// Declared channel count.
        channels: usize,
    },

    /// Memory base is not aligned to a cache line.
    #[error("memory base {base:#x} is not aligned to the {line_bytes}-byte cache line")]
    MisalignedBase {
        /// Memory base address.
        base: u64,
        /// Cache line size in bytes.
        line_bytes: usize,
    },

    /// The processor address width is outside the range this model can represent.
    #[error("processor address width of {0} bits is not supported (expected 12..=64)")]
    AddressWidth(u32),

    /// A size or frequency literal in the configuration could not be parsed.
    #[error("invalid {kind} literal '{literal}'")]
    InvalidLiteral {
        /// Literal category (`size` or `frequency`).
        kind: &'static str,
        /// Offending text.
        literal: String,
    },

    /// The configuration document itself is malformed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {reason}")]
    Unreadable {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying I/O error text.
        reason: String,
    },
}

/// A workload resource could not be located or loaded.
///
/// Always raised before the driver leaves `Constructing`; the simulated clock
/// is still at zero when this is returned.
#[derive(Debug, Error)]
pub enum ResourceNotFoundError {
    /// No provider entry matches the identifier.
    #[error("workload resource '{0}' could not be resolved")]
    Unknown(String),

    /// The resource exists but could not be read.
    #[error("failed to read workload resource '{id}'")]
    Io {
        /// Resource identifier.
        id: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The resource was read but its contents are unusable.
    #[error("workload resource '{id}' is malformed: {reason}")]
    Malformed {
        /// Resource identifier.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A segment of the image falls outside simulated memory.
    #[error("workload resource '{id}' segment at {addr:#x} (+{len} bytes) lies outside memory")]
    OutOfRange {
        /// Resource identifier.
        id: String,
        /// Segment load address.
        addr: u64,
        /// Segment length in bytes.
        len: usize,
    },

    /// The driver was started without a workload attached to the board.
    #[error("no workload has been attached to the board")]
    NoWorkload,
}

/// A core-type switch request was rejected.
///
/// Reported to the caller only; the simulation keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchError {
    /// The requested core index does not exist.
    #[error("core {index} does not exist on a {count}-core processor")]
    NoSuchCore {
        /// Requested index.
        index: usize,
        /// Number of cores on the board.
        count: usize,
    },

    /// Both variants of the core are the same model type.
    #[error("core {index} cannot switch between identical {cpu_type} variants")]
    IncompatiblePairing {
        /// Requested index.
        index: usize,
        /// Shared type of both variants.
        cpu_type: CpuType,
    },

    /// The core already finished executing its workload.
    #[error("core {0} has halted and cannot be switched")]
    CoreHalted(usize),

    /// Switching is only possible while the simulation is live.
    #[error("switching requires a running simulation (current phase: {0})")]
    NotRunning(&'static str),

    /// A state snapshot could not be applied to the target variant.
    #[error("core state snapshot is invalid: {0}")]
    InvalidSnapshot(String),
}

/// Internal inconsistency detected while dispatching events.
///
/// Fatal: the driver halts with a non-zero status after a best-effort
/// statistics and checkpoint dump.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationFault {
    /// An event would have been dispatched out of timestamp order.
    #[error("event queue ordering violated: tick {scheduled} dispatched after tick {previous}")]
    TimeOrdering {
        /// Tick of the previously dispatched event.
        previous: u64,
        /// Tick of the offending event.
        scheduled: u64,
    },

    /// An event was scheduled earlier than the current simulated time.
    #[error("event scheduled at tick {scheduled} while the clock is already at {now}")]
    ScheduledInPast {
        /// Current simulated tick.
        now: u64,
        /// Requested tick.
        scheduled: u64,
    },

    /// A core executed an encoding the ISA model does not implement.
    #[error("core {core}: illegal instruction {raw:#010x} at pc {pc:#x}")]
    IllegalInstruction {
        /// Faulting core.
        core: usize,
        /// Program counter.
        pc: u64,
        /// Raw encoding.
        raw: u32,
    },

    /// A core touched an address outside simulated memory.
    #[error("core {core}: access to unmapped address {addr:#x} at pc {pc:#x}")]
    MemoryFault {
        /// Faulting core.
        core: usize,
        /// Program counter.
        pc: u64,
        /// Target address.
        addr: u64,
    },

    /// A core fetched from a misaligned program counter.
    #[error("core {core}: misaligned instruction fetch at {pc:#x}")]
    MisalignedFetch {
        /// Faulting core.
        core: usize,
        /// Program counter.
        pc: u64,
    },

    /// A completion event arrived for a core with nothing in flight.
    #[error("core {0}: completion event without an in-flight instruction")]
    SpuriousCompletion(usize),

    /// A core slot lost its architectural state.
    #[error("core {0}: architectural state missing from the active variant")]
    StateLost(usize),

    /// A deferred switch could not be applied when the core's instruction retired.
    #[error("core {core}: deferred switch failed: {source}")]
    DeferredSwitch {
        /// Core whose switch was pending.
        core: usize,
        /// Why the dormant variant rejected the state.
        #[source]
        source: SwitchError,
    },
}

/// Failure while writing or restoring a checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The checkpoint file could not be read or written.
    #[error("checkpoint I/O failed for {path}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The checkpoint document could not be (de)serialized.
    #[error("checkpoint encoding failed")]
    Encoding(#[from] serde_json::Error),

    /// The checkpoint was taken on a board with a different topology.
    #[error("checkpoint does not match this board: {0}")]
    Incompatible(String),
}

/// Top-level error returned by board construction and the simulation driver.
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration rejected.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Workload resource missing.
    #[error(transparent)]
    Resource(#[from] ResourceNotFoundError),
    /// Switch request rejected.
    #[error(transparent)]
    Switch(#[from] SwitchError),
    /// Simulation fault during dispatch.
    #[error(transparent)]
    Fault(#[from] SimulationFault),
    /// Checkpoint save/restore failed.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl SimError {
    /// Maps the error onto the process exit status it should produce.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Configuration(_) => ExitStatus::ConfigurationError,
            Self::Resource(_) | Self::Checkpoint(_) => ExitStatus::ResourceError,
            Self::Switch(_) | Self::Fault(_) => ExitStatus::SimulationFault,
        }
    }
}

/// Final status of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExitStatus {
    /// The workload signalled voluntary completion.
    Completed,
    /// Configuration was rejected.
    ConfigurationError,
    /// Workload or checkpoint resource problem.
    ResourceError,
    /// Internal inconsistency during dispatch.
    SimulationFault,
    /// An external halt request was observed.
    Cancelled,
}

impl ExitStatus {
    /// Process exit code for this status.
    pub const fn code(self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::ConfigurationError => 2,
            Self::ResourceError => 3,
            Self::SimulationFault => 4,
            Self::Cancelled => 5,
        }
    }
}

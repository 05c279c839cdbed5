//! Board composition and core-switching simulator library.
//!
//! This crate assembles a simulated computer from typed component specs and runs
//! a workload on it. It provides:
//! 1. **Validation:** ISA/coherence requirements checked before anything is built.
//! 2. **Topology:** Processor, cache hierarchy, memory, and clock composed into an immutable board shape.
//! 3. **Core:** Switchable cores pairing a functional and a detailed execution model.
//! 4. **SoC:** The board with its private L1s, banked shared L2, and multi-channel memory.
//! 5. **Simulation:** Event-driven driver, switch policies, workloads, checkpoints, and statistics.

/// Common types (errors, units, clock domain).
pub mod common;
/// JSON configuration (defaults, sections, spec conversions).
pub mod config;
/// Cores (architectural state, execution, models, switchable processor).
pub mod core;
/// Instruction set (decode, opcodes, ABI).
pub mod isa;
/// Requirement validation.
pub mod requires;
/// Simulation driver, events, policies, workloads, checkpoints.
pub mod sim;
/// Board and its cache/memory bindings.
pub mod soc;
/// Simulation statistics collection and reporting.
pub mod stats;
/// Topology specs and builder.
pub mod topology;

/// Root configuration type; deserialize from JSON or use `Config::default()`.
pub use crate::config::Config;
/// Requirement validator; `RequirementValidator::default()` uses the built-in supported set.
pub use crate::requires::RequirementValidator;
/// Driver that runs a board; construct with `SimulationDriver::new`.
pub use crate::sim::SimulationDriver;
/// Assembled board; construct with `Board::new` from a `Topology`.
pub use crate::soc::Board;
/// Immutable board shape produced by `TopologyBuilder`.
pub use crate::topology::{Topology, TopologyBuilder};

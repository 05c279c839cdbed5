//! Core execution models.
//!
//! This module defines the two engines a core can run on and the enum that
//! erases their type. It provides:
//! 1. **`CpuType`:** The configuration-level model names.
//! 2. **`FunctionalModel`:** Executes and retires each instruction at once, one cycle apiece.
//! 3. **`DetailedModel`:** Issues an instruction, keeps it in flight for its modelled
//!    latency, and retires it on a completion event.
//! 4. **`ModelDispatch`:** Enum dispatch used by the processor's core slots.
//!
//! Every engine owns the `CoreState` while it is active and executes through
//! the shared `exec::execute`, so model changes never alter program results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::error::{SimulationFault, SwitchError};
use crate::core::exec::{self, DataPort, Effect, Executed, OpClass};
use crate::core::state::{CoreSnapshot, CoreState};

/// Execution model identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CpuType {
    /// Functional model with no pipeline timing.
    #[serde(alias = "Atomic", alias = "atomic")]
    Atomic,
    /// Single-issue model with every memory access fully exposed.
    #[serde(alias = "Timing", alias = "timing")]
    Timing,
    /// In-order pipelined model; fetch latency partly hidden.
    #[serde(alias = "Minor", alias = "minor")]
    Minor,
    /// Out-of-order model; memory latency partly overlapped.
    #[serde(alias = "o3")]
    O3,
}

impl CpuType {
    /// Canonical configuration name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Atomic => "ATOMIC",
            Self::Timing => "TIMING",
            Self::Minor => "MINOR",
            Self::O3 => "O3",
        }
    }

    /// Whether this type runs on the detailed engine.
    pub const fn is_detailed(self) -> bool {
        !matches!(self, Self::Atomic)
    }
}

impl fmt::Display for CpuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a model did with one issue opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The instruction retired; the core may issue again after `cycles`.
    Retired {
        /// Retired instruction.
        executed: Executed,
        /// Cycles until the next issue.
        cycles: u64,
    },
    /// The instruction is in flight and completes after `cycles`.
    Issued {
        /// Cycles until completion.
        cycles: u64,
    },
}

/// Functional engine: every instruction retires immediately and costs one cycle.
///
/// Memory accesses still go through the caches, so running this model warms
/// them for a later detailed phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionalModel {
    state: CoreState,
}

impl FunctionalModel {
    /// Wraps a core state.
    pub const fn new(state: CoreState) -> Self {
        Self { state }
    }

    fn step(&mut self, core: usize, port: &mut dyn DataPort) -> Result<Step, SimulationFault> {
        let executed = exec::execute(core, &mut self.state, port)?;
        retire(&mut self.state, &executed);
        Ok(Step::Retired {
            executed,
            cycles: 1,
        })
    }
}

/// Per-type latency parameters of the detailed engine, in cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyModel {
    /// Integer ALU and system instructions.
    pub alu: u64,
    /// Integer multiply.
    pub mul: u64,
    /// Branch resolution.
    pub branch: u64,
    /// Divisor applied to fetch latency (1 = fully exposed).
    pub fetch_overlap: u64,
    /// Divisor applied to data-access latency (1 = fully exposed).
    pub data_overlap: u64,
}

impl LatencyModel {
    /// Parameters for a detailed CPU type.
    pub const fn for_type(cpu_type: CpuType) -> Self {
        match cpu_type {
            CpuType::Atomic | CpuType::Timing => Self {
                alu: 1,
                mul: 1,
                branch: 1,
                fetch_overlap: 1,
                data_overlap: 1,
            },
            CpuType::Minor => Self {
                alu: 1,
                mul: 3,
                branch: 2,
                fetch_overlap: 4,
                data_overlap: 1,
            },
            CpuType::O3 => Self {
                alu: 1,
                mul: 3,
                branch: 1,
                fetch_overlap: 8,
                data_overlap: 2,
            },
        }
    }

    /// Total cycles an instruction occupies the core.
    pub const fn cycles(&self, executed: &Executed) -> u64 {
        let exec = match executed.class {
            OpClass::Mul => self.mul,
            OpClass::Branch => self.branch,
            OpClass::Alu | OpClass::Load | OpClass::Store | OpClass::System => self.alu,
        };
        let total = exec
            + executed.fetch_cycles / self.fetch_overlap
            + executed.data_cycles / self.data_overlap;
        if total == 0 { 1 } else { total }
    }
}

/// Detailed engine: issue, hold in flight, retire on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailedModel {
    state: CoreState,
    latency: LatencyModel,
    in_flight: Option<Executed>,
}

impl DetailedModel {
    /// Wraps a core state with the latency parameters of `cpu_type`.
    pub const fn new(state: CoreState, cpu_type: CpuType) -> Self {
        Self {
            state,
            latency: LatencyModel::for_type(cpu_type),
            in_flight: None,
        }
    }

    fn step(&mut self, core: usize, port: &mut dyn DataPort) -> Result<Step, SimulationFault> {
        if self.in_flight.is_some() {
            return Err(SimulationFault::SpuriousCompletion(core));
        }
        let executed = exec::execute(core, &mut self.state, port)?;
        let cycles = self.latency.cycles(&executed);
        self.in_flight = Some(executed);
        Ok(Step::Issued { cycles })
    }

    fn complete(&mut self, core: usize) -> Result<Executed, SimulationFault> {
        let executed = self
            .in_flight
            .take()
            .ok_or(SimulationFault::SpuriousCompletion(core))?;
        retire(&mut self.state, &executed);
        Ok(executed)
    }
}

/// Applies the retirement of `executed` to the architectural state.
fn retire(state: &mut CoreState, executed: &Executed) {
    state.instret += 1;
    if let Effect::Halt(code) = executed.effect {
        state.exit_code = Some(code);
    }
}

/// Type-erased engine storage for a core slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelDispatch {
    /// Functional engine.
    Functional(FunctionalModel),
    /// Detailed engine.
    Detailed(Box<DetailedModel>),
}

impl ModelDispatch {
    /// Builds the engine for `cpu_type` around `state`.
    pub fn new(cpu_type: CpuType, state: CoreState) -> Self {
        if cpu_type.is_detailed() {
            Self::Detailed(Box::new(DetailedModel::new(state, cpu_type)))
        } else {
            Self::Functional(FunctionalModel::new(state))
        }
    }

    /// Builds the engine for `cpu_type` from a snapshot.
    ///
    /// # Errors
    ///
    /// `SwitchError::InvalidSnapshot` if the snapshot is malformed.
    pub fn from_snapshot(cpu_type: CpuType, snapshot: &CoreSnapshot) -> Result<Self, SwitchError> {
        Ok(Self::new(cpu_type, CoreState::from_snapshot(snapshot)?))
    }

    /// Issues the next instruction.
    ///
    /// # Errors
    ///
    /// Propagates execution faults; a detailed engine that already has an
    /// instruction in flight reports `SpuriousCompletion`.
    pub fn step(&mut self, core: usize, port: &mut dyn DataPort) -> Result<Step, SimulationFault> {
        match self {
            Self::Functional(m) => m.step(core, port),
            Self::Detailed(m) => m.step(core, port),
        }
    }

    /// Retires the in-flight instruction.
    ///
    /// # Errors
    ///
    /// `SpuriousCompletion` when nothing is in flight.
    pub fn complete(&mut self, core: usize) -> Result<Executed, SimulationFault> {
        match self {
            Self::Functional(_) => Err(SimulationFault::SpuriousCompletion(core)),
            Self::Detailed(m) => m.complete(core),
        }
    }

    /// Architectural state.
    pub fn state(&self) -> &CoreState {
        match self {
            Self::Functional(m) => &m.state,
            Self::Detailed(m) => &m.state,
        }
    }

    /// Instruction currently in flight, if any.
    pub fn in_flight(&self) -> Option<&Executed> {
        match self {
            Self::Functional(_) => None,
            Self::Detailed(m) => m.in_flight.as_ref(),
        }
    }

    /// Restores an in-flight instruction captured by a checkpoint.
    pub(crate) fn set_in_flight(&mut self, executed: Option<Executed>) {
        if let Self::Detailed(m) = self {
            m.in_flight = executed;
        }
    }
}

//! Architectural core state and its neutral snapshot form.
//!
//! A `CoreState` is owned by whichever execution model is currently active
//! for a core. Switching models goes through `CoreSnapshot`, a plain record
//! that carries no model-specific structure, so that any variant can rebuild
//! the exact same state from it.

use serde::{Deserialize, Serialize};

use crate::common::error::SwitchError;
use crate::core::arch::gpr::{GPR_COUNT, Gpr};
use crate::core::arch::mode::PrivilegeMode;
use crate::isa::abi;

/// Program-visible state of one core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreState {
    /// Integer register file.
    pub regs: Gpr,
    /// Program counter.
    pub pc: u64,
    /// Current privilege mode.
    pub mode: PrivilegeMode,
    /// Exit code once the core has halted.
    pub exit_code: Option<u64>,
    /// Instructions retired since reset.
    pub instret: u64,
}

impl Default for CoreState {
    fn default() -> Self {
        Self {
            regs: Gpr::new(),
            pc: 0,
            mode: PrivilegeMode::Machine,
            exit_code: None,
            instret: 0,
        }
    }
}

impl CoreState {
    /// Reset state for a core entering a workload.
    ///
    /// `a0` carries the hart id and `sp` the top of the core's stack.
    pub fn at_entry(hart_id: usize, entry: u64, stack_top: u64) -> Self {
        let mut state = Self {
            pc: entry,
            ..Self::default()
        };
        state.regs.write(abi::REG_A0, hart_id as u64);
        state.regs.write(abi::REG_SP, stack_top);
        state
    }

    /// Whether the core has executed its exit.
    pub const fn halted(&self) -> bool {
        self.exit_code.is_some()
    }

    /// Captures the state as a model-neutral snapshot.
    pub fn snapshot(&self) -> CoreSnapshot {
        CoreSnapshot {
            regs: self.regs.as_array().to_vec(),
            pc: self.pc,
            mode: self.mode.to_u8(),
            exit_code: self.exit_code,
            instret: self.instret,
        }
    }

    /// Rebuilds state from a snapshot.
    ///
    /// # Errors
    ///
    /// `SwitchError::InvalidSnapshot` when the register count, mode encoding,
    /// or program counter alignment is wrong, or when `x0` is non-zero.
    pub fn from_snapshot(snapshot: &CoreSnapshot) -> Result<Self, SwitchError> {
        let regs: [u64; GPR_COUNT] = snapshot.regs.as_slice().try_into().map_err(|_| {
            SwitchError::InvalidSnapshot(format!(
                "expected {GPR_COUNT} registers, found {}",
                snapshot.regs.len()
            ))
        })?;
        if regs[0] != 0 {
            return Err(SwitchError::InvalidSnapshot(
                "register x0 must be zero".to_string(),
            ));
        }
        if !matches!(snapshot.mode, 0 | 1 | 3) {
            return Err(SwitchError::InvalidSnapshot(format!(
                "privilege mode encoding {} is reserved",
                snapshot.mode
            )));
        }
        if snapshot.pc % 4 != 0 {
            return Err(SwitchError::InvalidSnapshot(format!(
                "program counter {:#x} is misaligned",
                snapshot.pc
            )));
        }
        Ok(Self {
            regs: Gpr::from_array(regs),
            pc: snapshot.pc,
            mode: PrivilegeMode::from_u8(snapshot.mode),
            exit_code: snapshot.exit_code,
            instret: snapshot.instret,
        })
    }
}

/// Model-neutral image of a `CoreState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreSnapshot {
    /// All 32 integer registers, `x0` first.
    pub regs: Vec<u64>,
    /// Program counter.
    pub pc: u64,
    /// Privilege mode encoding.
    pub mode: u8,
    /// Exit code if the core has halted.
    pub exit_code: Option<u64>,
    /// Instructions retired.
    pub instret: u64,
}

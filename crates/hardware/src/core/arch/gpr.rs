//! General-purpose register file.
//!
//! This module holds the 32 integer registers of a core. It provides:
//! 1. **Storage:** Registers `x0`-`x31`, serializable as part of a core snapshot.
//! 2. **Invariant Enforcement:** Register `x0` reads as zero and ignores writes.
//! 3. **Debugging:** A register dump routed through `tracing`.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of integer registers.
pub const GPR_COUNT: usize = 32;

/// General-purpose register file.
///
/// Register `x0` is hardwired to zero. Indices are taken from 5-bit
/// instruction fields and are therefore always in range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gpr {
    regs: [u64; GPR_COUNT],
}

impl Default for Gpr {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpr {
    /// Creates a register file with every register cleared.
    pub const fn new() -> Self {
        Self {
            regs: [0; GPR_COUNT],
        }
    }

    /// Reads a register.
    ///
    /// # Arguments
    ///
    /// * `idx` - Register index (0-31).
    ///
    /// # Returns
    ///
    /// The stored value; `x0` always returns 0.
    pub fn read(&self, idx: usize) -> u64 {
        if idx == 0 { 0 } else { self.regs[idx & 0x1F] }
    }

    /// Writes a register. Writes to `x0` are discarded.
    pub fn write(&mut self, idx: usize, val: u64) {
        if idx != 0 {
            self.regs[idx & 0x1F] = val;
        }
    }

    /// Raw view of all registers, `x0` included.
    pub const fn as_array(&self) -> &[u64; GPR_COUNT] {
        &self.regs
    }

    /// Rebuilds a register file from raw values, forcing `x0` to zero.
    pub const fn from_array(mut regs: [u64; GPR_COUNT]) -> Self {
        regs[0] = 0;
        Self { regs }
    }

    /// Logs the register file in pairs at debug level.
    pub fn dump(&self, core: usize) {
        for i in (0..GPR_COUNT).step_by(2) {
            debug!(
                core,
                "x{:<2}={:#018x} x{:<2}={:#018x}",
                i,
                self.regs[i],
                i + 1,
                self.regs[i + 1]
            );
        }
    }
}

//! Architectural state components.
//!
//! 1. **GPRs:** The integer register file.
//! 2. **Modes:** Privilege mode definitions.

/// General-purpose register file.
pub mod gpr;

/// Privilege mode definitions.
pub mod mode;

//! Instruction Set Architecture definitions.
//!
//! The core models share one executor, so the ISA surface is deliberately
//! small: the RV64I integer base, `MUL`, and the simulator pseudo-instructions
//! a workload uses to mark regions of interest, request switches, and exit.

/// ABI register indices.
pub mod abi;

/// Instruction decoder.
pub mod decode;

/// Opcode and function-code constants.
pub mod opcodes;

pub use decode::{Decoded, decode};

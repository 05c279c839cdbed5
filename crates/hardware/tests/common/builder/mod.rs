//! Instruction and program builders.

pub mod instruction;

//! Opcode and function-code constants for the RV64 subset the core models execute.
//!
//! Major opcodes occupy bits 6-0, `funct3` bits 14-12 and `funct7` bits 31-25.
//! The simulator pseudo-instructions reuse the custom-3 opcode with the
//! operation number in `funct7`, the encoding gem5 uses for its m5ops.

/// Load instructions (LB, LH, LW, LD, LBU, LHU, LWU).
pub const OP_LOAD: u32 = 0b000_0011;
/// Memory ordering instructions (FENCE, FENCE.I).
pub const OP_MISC_MEM: u32 = 0b000_1111;
/// Immediate arithmetic (ADDI, ANDI, SLLI, ...).
pub const OP_IMM: u32 = 0b001_0011;
/// Add upper immediate to PC.
pub const OP_AUIPC: u32 = 0b001_0111;
/// 32-bit immediate arithmetic (ADDIW, SLLIW, ...).
pub const OP_IMM_32: u32 = 0b001_1011;
/// Store instructions (SB, SH, SW, SD).
pub const OP_STORE: u32 = 0b010_0011;
/// Register-register arithmetic (ADD, SUB, MUL, ...).
pub const OP_REG: u32 = 0b011_0011;
/// Load upper immediate.
pub const OP_LUI: u32 = 0b011_0111;
/// 32-bit register-register arithmetic (ADDW, SUBW, ...).
pub const OP_REG_32: u32 = 0b011_1011;
/// Conditional branches.
pub const OP_BRANCH: u32 = 0b110_0011;
/// Jump and link register.
pub const OP_JALR: u32 = 0b110_0111;
/// Jump and link.
pub const OP_JAL: u32 = 0b110_1111;
/// ECALL / EBREAK.
pub const OP_SYSTEM: u32 = 0b111_0011;
/// Simulator pseudo-instructions (custom-3).
pub const OP_PSEUDO: u32 = 0b111_1011;

/// `funct3` values for loads.
pub mod load {
    /// Load byte (signed).
    pub const LB: u32 = 0b000;
    /// Load halfword (signed).
    pub const LH: u32 = 0b001;
    /// Load word (signed).
    pub const LW: u32 = 0b010;
    /// Load doubleword.
    pub const LD: u32 = 0b011;
    /// Load byte unsigned.
    pub const LBU: u32 = 0b100;
    /// Load halfword unsigned.
    pub const LHU: u32 = 0b101;
    /// Load word unsigned.
    pub const LWU: u32 = 0b110;
}

/// `funct3` values for stores.
pub mod store {
    /// Store byte.
    pub const SB: u32 = 0b000;
    /// Store halfword.
    pub const SH: u32 = 0b001;
    /// Store word.
    pub const SW: u32 = 0b010;
    /// Store doubleword.
    pub const SD: u32 = 0b011;
}

/// `funct3` values for branches.
pub mod branch {
    /// Branch if equal.
    pub const BEQ: u32 = 0b000;
    /// Branch if not equal.
    pub const BNE: u32 = 0b001;
    /// Branch if less than (signed).
    pub const BLT: u32 = 0b100;
    /// Branch if greater or equal (signed).
    pub const BGE: u32 = 0b101;
    /// Branch if less than (unsigned).
    pub const BLTU: u32 = 0b110;
    /// Branch if greater or equal (unsigned).
    pub const BGEU: u32 = 0b111;
}

/// `funct3` values for integer ALU operations.
pub mod alu {
    /// ADD / SUB / MUL.
    pub const ADD_SUB: u32 = 0b000;
    /// Shift left logical.
    pub const SLL: u32 = 0b001;
    /// Set less than (signed).
    pub const SLT: u32 = 0b010;
    /// Set less than (unsigned).
    pub const SLTU: u32 = 0b011;
    /// Exclusive or.
    pub const XOR: u32 = 0b100;
    /// Shift right logical / arithmetic.
    pub const SRL_SRA: u32 = 0b101;
    /// Inclusive or.
    pub const OR: u32 = 0b110;
    /// And.
    pub const AND: u32 = 0b111;
}

/// `funct7` values.
pub mod funct7 {
    /// Default encoding (ADD, SRL, ...).
    pub const DEFAULT: u32 = 0b000_0000;
    /// Alternate encoding (SUB, SRA).
    pub const ALT: u32 = 0b010_0000;
    /// M extension (MUL).
    pub const MULDIV: u32 = 0b000_0001;
}

/// Pseudo-instruction operation numbers (`funct7` of `OP_PSEUDO`).
pub mod pseudo {
    /// Terminate the simulation with exit code `a0`.
    pub const EXIT: u32 = 0x21;
    /// Request a checkpoint.
    pub const CHECKPOINT: u32 = 0x43;
    /// Request a core-type switch of the executing core.
    pub const SWITCH_CPU: u32 = 0x55;
    /// Mark the beginning of the region of interest.
    pub const WORK_BEGIN: u32 = 0x5a;
    /// Mark the end of the region of interest.
    pub const WORK_END: u32 = 0x5b;
}

/// `imm` field of `ECALL`.
pub const ECALL_IMM: i64 = 0;
/// Linux `exit` system call number (passed in `a7`).
pub const SYS_EXIT: u64 = 93;

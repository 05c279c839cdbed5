//! Instruction decoder.
//!
//! Splits a 32-bit encoding into register fields, function codes, and a
//! sign-extended immediate chosen by the instruction format (I, S, B, U, J).

use serde::{Deserialize, Serialize};

use super::opcodes;

/// Mask for the major opcode (bits 6-0).
const OPCODE_MASK: u32 = 0x7F;
/// Mask for a 5-bit register field.
const REG_MASK: u32 = 0x1F;
/// Mask for `funct3` (bits 14-12).
const FUNCT3_MASK: u32 = 0x7;
/// Mask for `funct7` (bits 31-25).
const FUNCT7_MASK: u32 = 0x7F;
/// Mask keeping the U-type immediate (bits 31-12).
const U_IMM_MASK: u32 = 0xFFFF_F000;

/// Decoded instruction fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    /// Original encoding.
    pub raw: u32,
    /// Major opcode.
    pub opcode: u32,
    /// Destination register.
    pub rd: usize,
    /// First source register.
    pub rs1: usize,
    /// Second source register.
    pub rs2: usize,
    /// `funct3` field.
    pub funct3: u32,
    /// `funct7` field.
    pub funct7: u32,
    /// Sign-extended immediate (zero for R-type).
    pub imm: i64,
}

/// Decodes a 32-bit instruction.
pub fn decode(raw: u32) -> Decoded {
    let opcode = raw & OPCODE_MASK;
    let imm = match opcode {
        opcodes::OP_IMM
        | opcodes::OP_IMM_32
        | opcodes::OP_LOAD
        | opcodes::OP_JALR
        | opcodes::OP_SYSTEM => i_imm(raw),
        opcodes::OP_STORE => s_imm(raw),
        opcodes::OP_BRANCH => b_imm(raw),
        opcodes::OP_LUI | opcodes::OP_AUIPC => u_imm(raw),
        opcodes::OP_JAL => j_imm(raw),
        _ => 0,
    };

    Decoded {
        raw,
        opcode,
        rd: ((raw >> 7) & REG_MASK) as usize,
        rs1: ((raw >> 15) & REG_MASK) as usize,
        rs2: ((raw >> 20) & REG_MASK) as usize,
        funct3: (raw >> 12) & FUNCT3_MASK,
        funct7: (raw >> 25) & FUNCT7_MASK,
        imm,
    }
}

/// `imm[11:0] | rs1 | funct3 | rd | opcode`
fn i_imm(raw: u32) -> i64 {
    ((raw as i32) >> 20) as i64
}

/// `imm[11:5] | rs2 | rs1 | funct3 | imm[4:0] | opcode`
fn s_imm(raw: u32) -> i64 {
    let low = (raw >> 7) & 0x1F;
    let high = (raw >> 25) & 0x7F;
    sign_extend((high << 5) | low, 12)
}

/// `imm[12|10:5] | rs2 | rs1 | funct3 | imm[4:1|11] | opcode`
fn b_imm(raw: u32) -> i64 {
    let bit_11 = (raw >> 7) & 1;
    let bits_4_1 = (raw >> 8) & 0xF;
    let bits_10_5 = (raw >> 25) & 0x3F;
    let bit_12 = (raw >> 31) & 1;
    sign_extend(
        (bit_12 << 12) | (bit_11 << 11) | (bits_10_5 << 5) | (bits_4_1 << 1),
        13,
    )
}

/// `imm[31:12] | rd | opcode`
fn u_imm(raw: u32) -> i64 {
    ((raw & U_IMM_MASK) as i32) as i64
}

/// `imm[20|10:1|11|19:12] | rd | opcode`
fn j_imm(raw: u32) -> i64 {
    let bits_19_12 = (raw >> 12) & 0xFF;
    let bit_11 = (raw >> 20) & 1;
    let bits_10_1 = (raw >> 21) & 0x3FF;
    let bit_20 = (raw >> 31) & 1;
    sign_extend(
        (bit_20 << 20) | (bits_19_12 << 12) | (bit_11 << 11) | (bits_10_1 << 1),
        21,
    )
}

/// Sign-extends the low `bits` bits of `val`.
fn sign_extend(val: u32, bits: u32) -> i64 {
    let shift = 32 - bits;
    (((val << shift) as i32) >> shift) as i64
}

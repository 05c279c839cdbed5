use boardsim_core::isa::abi;
use boardsim_core::isa::opcodes::*;

pub struct InstructionBuilder {
    opcode: u32,
    rd: u32,
    funct3: u32,
    rs1: u32,
    rs2: u32,
    funct7: u32,
    imm: i32,
}

impl Default for InstructionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InstructionBuilder {
    pub fn new() -> Self {
        Self {
            opcode: 0,
            rd: 0,
            funct3: 0,
            rs1: 0,
            rs2: 0,
            funct7: 0,
            imm: 0,
        }
    }

    fn r(mut self, opcode: u32, funct3: u32, funct7: u32, rd: u32, rs1: u32, rs2: u32) -> Self {
        self.opcode = opcode;
        self.funct3 = funct3;
        self.funct7 = funct7;
        self.rd = rd;
        self.rs1 = rs1;
        self.rs2 = rs2;
        self
    }

    fn i(mut self, opcode: u32, funct3: u32, rd: u32, rs1: u32, imm: i32) -> Self {
        self.opcode = opcode;
        self.funct3 = funct3;
        self.rd = rd;
        self.rs1 = rs1;
        self.imm = imm;
        self
    }

    fn s(mut self, opcode: u32, funct3: u32, rs1: u32, rs2: u32, imm: i32) -> Self {
        self.opcode = opcode;
        self.funct3 = funct3;
        self.rs1 = rs1;
        self.rs2 = rs2;
        self.imm = imm;
        self
    }

    // --- Helpers for Common Instructions ---

    pub fn add(self, rd: u32, rs1: u32, rs2: u32) -> Self {
        self.r(OP_REG, alu::ADD_SUB, funct7::DEFAULT, rd, rs1, rs2)
    }

    pub fn sub(self, rd: u32, rs1: u32, rs2: u32) -> Self {
        self.r(OP_REG, alu::ADD_SUB, funct7::ALT, rd, rs1, rs2)
    }

    pub fn mul(self, rd: u32, rs1: u32, rs2: u32) -> Self {
        self.r(OP_REG, alu::ADD_SUB, funct7::MULDIV, rd, rs1, rs2)
    }

    pub fn sra(self, rd: u32, rs1: u32, rs2: u32) -> Self {
        self.r(OP_REG, alu::SRL_SRA, funct7::ALT, rd, rs1, rs2)
    }

    pub fn sltu(self, rd: u32, rs1: u32, rs2: u32) -> Self {
        self.r(OP_REG, alu::SLTU, funct7::DEFAULT, rd, rs1, rs2)
    }

    pub fn addw(self, rd: u32, rs1: u32, rs2: u32) -> Self {
        self.r(OP_REG_32, alu::ADD_SUB, funct7::DEFAULT, rd, rs1, rs2)
    }

    pub fn addi(self, rd: u32, rs1: u32, imm: i32) -> Self {
        self.i(OP_IMM, alu::ADD_SUB, rd, rs1, imm)
    }

    pub fn xori(self, rd: u32, rs1: u32, imm: i32) -> Self {
        self.i(OP_IMM, alu::XOR, rd, rs1, imm)
    }

    pub fn slli(self, rd: u32, rs1: u32, shamt: i32) -> Self {
        self.i(OP_IMM, alu::SLL, rd, rs1, shamt)
    }

    pub fn addiw(self, rd: u32, rs1: u32, imm: i32) -> Self {
        self.i(OP_IMM_32, alu::ADD_SUB, rd, rs1, imm)
    }

    pub fn lb(self, rd: u32, rs1: u32, imm: i32) -> Self {
        self.i(OP_LOAD, load::LB, rd, rs1, imm)
    }

    pub fn lbu(self, rd: u32, rs1: u32, imm: i32) -> Self {
        self.i(OP_LOAD, load::LBU, rd, rs1, imm)
    }

    pub fn lw(self, rd: u32, rs1: u32, imm: i32) -> Self {
        self.i(OP_LOAD, load::LW, rd, rs1, imm)
    }

    pub fn ld(self, rd: u32, rs1: u32, imm: i32) -> Self {
        self.i(OP_LOAD, load::LD, rd, rs1, imm)
    }

    pub fn sb(self, rs1: u32, rs2: u32, imm: i32) -> Self {
        self.s(OP_STORE, store::SB, rs1, rs2, imm)
    }

    pub fn sw(self, rs1: u32, rs2: u32, imm: i32) -> Self {
        self.s(OP_STORE, store::SW, rs1, rs2, imm)
    }

    pub fn sd(self, rs1: u32, rs2: u32, imm: i32) -> Self {
        self.s(OP_STORE, store::SD, rs1, rs2, imm)
    }

    pub fn beq(self, rs1: u32, rs2: u32, imm: i32) -> Self {
        self.s(OP_BRANCH, branch::BEQ, rs1, rs2, imm)
    }

    pub fn bne(self, rs1: u32, rs2: u32, imm: i32) -> Self {
        self.s(OP_BRANCH, branch::BNE, rs1, rs2, imm)
    }

    pub fn blt(self, rs1: u32, rs2: u32, imm: i32) -> Self {
        self.s(OP_BRANCH, branch::BLT, rs1, rs2, imm)
    }

    pub fn jal(mut self, rd: u32, imm: i32) -> Self {
        self.opcode = OP_JAL;
        self.rd = rd;
        self.imm = imm;
        self
    }

    pub fn jalr(self, rd: u32, rs1: u32, imm: i32) -> Self {
        self.i(OP_JALR, 0, rd, rs1, imm)
    }

    /// `imm` is the 20-bit upper immediate, unshifted.
    pub fn lui(mut self, rd: u32, imm: i32) -> Self {
        self.opcode = OP_LUI;
        self.rd = rd;
        self.imm = imm;
        self
    }

    pub fn auipc(mut self, rd: u32, imm: i32) -> Self {
        self.opcode = OP_AUIPC;
        self.rd = rd;
        self.imm = imm;
        self
    }

    pub fn fence(self) -> Self {
        self.i(OP_MISC_MEM, 0, 0, 0, 0)
    }

    pub fn ecall(self) -> Self {
        self.i(OP_SYSTEM, 0, 0, 0, 0)
    }

    /// Simulator pseudo-instruction with operation number `op`.
    pub fn pseudo(self, op: u32) -> Self {
        self.r(OP_PSEUDO, 0, op, 0, 0, 0)
    }

    pub fn build(self) -> u32 {
        let opcode = self.opcode & 0x7F;
        let rd = (self.rd & 0x1F) << 7;
        let funct3 = (self.funct3 & 0x7) << 12;
        let rs1 = (self.rs1 & 0x1F) << 15;
        let rs2 = (self.rs2 & 0x1F) << 20;
        let funct7 = (self.funct7 & 0x7F) << 25;

        match opcode {
            OP_REG | OP_REG_32 | OP_PSEUDO => funct7 | rs2 | rs1 | funct3 | rd | opcode,
            OP_IMM | OP_IMM_32 | OP_LOAD | OP_JALR | OP_SYSTEM | OP_MISC_MEM => {
                let imm_val = (self.imm as u32) & 0xFFF;
                (imm_val << 20) | rs1 | funct3 | rd | opcode
            }
            OP_STORE => {
                let imm_val = self.imm as u32;
                let imm_11_5 = ((imm_val >> 5) & 0x7F) << 25;
                let imm_4_0 = (imm_val & 0x1F) << 7;
                imm_11_5 | rs2 | rs1 | funct3 | imm_4_0 | opcode
            }
            OP_BRANCH => {
                let imm_val = self.imm as u32;
                let bit_12 = ((imm_val >> 12) & 0x1) << 31;
                let bits_10_5 = ((imm_val >> 5) & 0x3F) << 25;
                let bits_4_1 = ((imm_val >> 1) & 0xF) << 8;
                let bit_11 = ((imm_val >> 11) & 0x1) << 7;
                bit_12 | bits_10_5 | rs2 | rs1 | funct3 | bits_4_1 | bit_11 | opcode
            }
            OP_LUI | OP_AUIPC => {
                let imm_val = (self.imm as u32) & 0xFFFFF;
                (imm_val << 12) | rd | opcode
            }
            OP_JAL => {
                let imm_val = self.imm as u32;
                let bit_20 = ((imm_val >> 20) & 0x1) << 31;
                let bits_10_1 = ((imm_val >> 1) & 0x3FF) << 21;
                let bit_11 = ((imm_val >> 11) & 0x1) << 20;
                let bits_19_12 = ((imm_val >> 12) & 0xFF) << 12;
                bit_20 | bits_10_1 | bit_11 | bits_19_12 | rd | opcode
            }
            _ => panic!("Unsupported opcode: {:#x}", opcode),
        }
    }
}

pub fn inst() -> InstructionBuilder {
    InstructionBuilder::new()
}

/// A flat program assembled from encoded instructions.
#[derive(Default)]
pub struct Program {
    words: Vec<u32>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, builder: InstructionBuilder) -> Self {
        self.words.push(builder.build());
        self
    }

    pub fn raw(mut self, word: u32) -> Self {
        self.words.push(word);
        self
    }

    /// `a7 = 93; a0 = code; ecall`.
    pub fn exit(self, code: i32) -> Self {
        self.push(inst().addi(abi::REG_A7 as u32, 0, SYS_EXIT as i32))
            .push(inst().addi(abi::REG_A0 as u32, 0, code))
            .push(inst().ecall())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}

/// Counts `t0` down from `iterations`, storing the running total below `sp`
/// on every pass, then exits with code 0.
///
/// Register use: `t0` (x5) counter, `t1` (x6) total.
pub fn counting_loop(iterations: i32) -> Program {
    let sp = abi::REG_SP as u32;
    Program::new()
        .push(inst().addi(5, 0, iterations))
        .push(inst().addi(6, 6, 1))
        .push(inst().sd(sp, 6, -8))
        .push(inst().addi(5, 5, -1))
        .push(inst().bne(5, 0, -12))
        .exit(0)
}

/// `work_begin`, a counting loop of `iterations`, `work_end`, exit 0.
///
/// Retires `4 * iterations + 6` instructions per core.
pub fn roi_loop(iterations: i32) -> Program {
    let sp = abi::REG_SP as u32;
    Program::new()
        .push(inst().pseudo(pseudo::WORK_BEGIN))
        .push(inst().addi(5, 0, iterations))
        .push(inst().addi(6, 6, 1))
        .push(inst().sd(sp, 6, -8))
        .push(inst().addi(5, 5, -1))
        .push(inst().bne(5, 0, -12))
        .push(inst().pseudo(pseudo::WORK_END))
        .exit(0)
}

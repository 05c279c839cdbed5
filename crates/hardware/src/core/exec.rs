//! Instruction semantics shared by every core model.
//!
//! Both the functional and the detailed model call `execute`, so a program
//! observes exactly the same architectural effects whichever model runs it.
//! The models differ only in when they retire an instruction and how many
//! cycles they charge for it.

use serde::{Deserialize, Serialize};

use crate::common::error::SimulationFault;
use crate::core::state::CoreState;
use crate::isa::opcodes::{self, alu, branch, funct7, load, pseudo, store};
use crate::isa::{abi, decode};

/// Value returned by a memory access together with the cycles it cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timed<T> {
    /// Access result.
    pub value: T,
    /// Latency in core cycles.
    pub cycles: u64,
}

/// Memory interface a core executes against.
///
/// Implementations route every access through the core's caches and return
/// `None` for addresses outside simulated memory.
pub trait DataPort {
    /// Fetches the 32-bit instruction at `pc`.
    fn fetch(&mut self, pc: u64) -> Option<Timed<u32>>;
    /// Loads `size` bytes (1, 2, 4, or 8), zero-extended.
    fn load(&mut self, addr: u64, size: usize) -> Option<Timed<u64>>;
    /// Stores the low `size` bytes of `val`.
    fn store(&mut self, addr: u64, size: usize, val: u64) -> Option<Timed<()>>;
}

/// Broad instruction class, used for latency and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpClass {
    /// Integer arithmetic and logic.
    Alu,
    /// Integer multiply.
    Mul,
    /// Memory load.
    Load,
    /// Memory store.
    Store,
    /// Branch or jump.
    Branch,
    /// Fence, environment call, or simulator pseudo-instruction.
    System,
}

/// Simulator pseudo-instructions a workload can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PseudoOp {
    /// End the whole simulation with the given code.
    Exit(u64),
    /// Start of the region of interest.
    WorkBegin,
    /// End of the region of interest.
    WorkEnd,
    /// Ask for this core to change execution model.
    SwitchCpu,
    /// Ask for a checkpoint to be taken.
    Checkpoint,
}

/// Side effect an instruction has beyond register and memory updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// None.
    None,
    /// The core halts with this exit code once the instruction retires.
    Halt(u64),
    /// A pseudo-instruction retired.
    Pseudo(PseudoOp),
}

/// Result of executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executed {
    /// Address of the instruction.
    pub pc: u64,
    /// Raw encoding.
    pub raw: u32,
    /// Instruction class.
    pub class: OpClass,
    /// Retirement side effect.
    pub effect: Effect,
    /// Cycles spent fetching.
    pub fetch_cycles: u64,
    /// Cycles spent on the data access, if any.
    pub data_cycles: u64,
}

/// Executes the instruction at `state.pc`.
///
/// Registers, memory, and the program counter are updated immediately. The
/// retired-instruction count and any halt are left to the caller, which
/// applies them when the owning model retires the instruction.
///
/// # Errors
///
/// `MisalignedFetch`, `MemoryFault`, or `IllegalInstruction`; the state is
/// left untouched when an error is returned.
pub fn execute(
    core: usize,
    state: &mut CoreState,
    port: &mut dyn DataPort,
) -> Result<Executed, SimulationFault> {
    let pc = state.pc;
    if pc % 4 != 0 {
        return Err(SimulationFault::MisalignedFetch { core, pc });
    }
    let fetched = port
        .fetch(pc)
        .ok_or(SimulationFault::MemoryFault { core, pc, addr: pc })?;
    let d = decode(fetched.value);
    let illegal = SimulationFault::IllegalInstruction {
        core,
        pc,
        raw: d.raw,
    };

    let rs1 = state.regs.read(d.rs1);
    let rs2 = state.regs.read(d.rs2);
    let imm = d.imm as u64;
    let mut next_pc = pc.wrapping_add(4);
    let mut data_cycles = 0;
    let mut effect = Effect::None;

    let class = match d.opcode {
        opcodes::OP_LUI => {
            state.regs.write(d.rd, imm);
            OpClass::Alu
        }
        opcodes::OP_AUIPC => {
            state.regs.write(d.rd, pc.wrapping_add(imm));
            OpClass::Alu
        }
        opcodes::OP_JAL => {
            state.regs.write(d.rd, next_pc);
            next_pc = pc.wrapping_add(imm);
            OpClass::Branch
        }
        opcodes::OP_JALR => {
            let target = rs1.wrapping_add(imm) & !1;
            state.regs.write(d.rd, next_pc);
            next_pc = target;
            OpClass::Branch
        }
        opcodes::OP_BRANCH => {
            let taken = match d.funct3 {
                branch::BEQ => rs1 == rs2,
                branch::BNE => rs1 != rs2,
                branch::BLT => (rs1 as i64) < (rs2 as i64),
                branch::BGE => (rs1 as i64) >= (rs2 as i64),
                branch::BLTU => rs1 < rs2,
                branch::BGEU => rs1 >= rs2,
                _ => return Err(illegal),
            };
            if taken {
                next_pc = pc.wrapping_add(imm);
            }
            OpClass::Branch
        }
        opcodes::OP_LOAD => {
            let (size, signed) = match d.funct3 {
                load::LB => (1, true),
                load::LH => (2, true),
                load::LW => (4, true),
                load::LD => (8, false),
                load::LBU => (1, false),
                load::LHU => (2, false),
                load::LWU => (4, false),
                _ => return Err(illegal),
            };
            let addr = rs1.wrapping_add(imm);
            let loaded = port
                .load(addr, size)
                .ok_or(SimulationFault::MemoryFault { core, pc, addr })?;
            let value = if signed {
                sign_extend(loaded.value, size)
            } else {
                loaded.value
            };
            state.regs.write(d.rd, value);
            data_cycles = loaded.cycles;
            OpClass::Load
        }
        opcodes::OP_STORE => {
            let size = match d.funct3 {
                store::SB => 1,
                store::SH => 2,
                store::SW => 4,
                store::SD => 8,
                _ => return Err(illegal),
            };
            let addr = rs1.wrapping_add(imm);
            let stored = port
                .store(addr, size, rs2)
                .ok_or(SimulationFault::MemoryFault { core, pc, addr })?;
            data_cycles = stored.cycles;
            OpClass::Store
        }
        opcodes::OP_IMM => {
            let shamt = (d.imm as u64 & 0x3F) as u32;
            let value = match d.funct3 {
                alu::ADD_SUB => rs1.wrapping_add(imm),
                alu::SLT => u64::from((rs1 as i64) < d.imm),
                alu::SLTU => u64::from(rs1 < imm),
                alu::XOR => rs1 ^ imm,
                alu::OR => rs1 | imm,
                alu::AND => rs1 & imm,
                alu::SLL => rs1 << shamt,
                alu::SRL_SRA if d.funct7 >> 1 == funct7::ALT >> 1 => ((rs1 as i64) >> shamt) as u64,
                alu::SRL_SRA => rs1 >> shamt,
                _ => return Err(illegal),
            };
            state.regs.write(d.rd, value);
            OpClass::Alu
        }
        opcodes::OP_IMM_32 => {
            let shamt = (d.imm as u64 & 0x1F) as u32;
            let value = match d.funct3 {
                alu::ADD_SUB => (rs1 as i32).wrapping_add(d.imm as i32),
                alu::SLL => (rs1 as i32) << shamt,
                alu::SRL_SRA if d.funct7 == funct7::ALT => (rs1 as i32) >> shamt,
                alu::SRL_SRA => ((rs1 as u32) >> shamt) as i32,
                _ => return Err(illegal),
            };
            state.regs.write(d.rd, value as i64 as u64);
            OpClass::Alu
        }
        opcodes::OP_REG => {
            let (value, class) = reg_op(d.funct3, d.funct7, rs1, rs2).ok_or(illegal)?;
            state.regs.write(d.rd, value);
            class
        }
        opcodes::OP_REG_32 => {
            let (value, class) = reg_op_32(d.funct3, d.funct7, rs1, rs2).ok_or(illegal)?;
            state.regs.write(d.rd, value);
            class
        }
        opcodes::OP_MISC_MEM => OpClass::System,
        opcodes::OP_SYSTEM => {
            if d.funct3 != 0 || d.imm != opcodes::ECALL_IMM {
                return Err(illegal);
            }
            if state.regs.read(abi::REG_A7) == opcodes::SYS_EXIT {
                effect = Effect::Halt(state.regs.read(abi::REG_A0));
            }
            OpClass::System
        }
        opcodes::OP_PSEUDO => {
            let op = match d.funct7 {
                pseudo::EXIT => PseudoOp::Exit(state.regs.read(abi::REG_A0)),
                pseudo::WORK_BEGIN => PseudoOp::WorkBegin,
                pseudo::WORK_END => PseudoOp::WorkEnd,
                pseudo::SWITCH_CPU => PseudoOp::SwitchCpu,
                pseudo::CHECKPOINT => PseudoOp::Checkpoint,
                _ => return Err(illegal),
            };
            effect = Effect::Pseudo(op);
            OpClass::System
        }
        _ => return Err(illegal),
    };

    state.pc = next_pc;
    Ok(Executed {
        pc,
        raw: d.raw,
        class,
        effect,
        fetch_cycles: fetched.cycles,
        data_cycles,
    })
}

/// Register-register operations, including `MUL`.
fn reg_op(funct3: u32, f7: u32, a: u64, b: u64) -> Option<(u64, OpClass)> {
    let shamt = (b & 0x3F) as u32;
    let value = match (f7, funct3) {
        (funct7::MULDIV, alu::ADD_SUB) => return Some((a.wrapping_mul(b), OpClass::Mul)),
        (funct7::DEFAULT, alu::ADD_SUB) => a.wrapping_add(b),
        (funct7::ALT, alu::ADD_SUB) => a.wrapping_sub(b),
        (funct7::DEFAULT, alu::SLL) => a << shamt,
        (funct7::DEFAULT, alu::SLT) => u64::from((a as i64) < (b as i64)),
        (funct7::DEFAULT, alu::SLTU) => u64::from(a < b),
        (funct7::DEFAULT, alu::XOR) => a ^ b,
        (funct7::DEFAULT, alu::SRL_SRA) => a >> shamt,
        (funct7::ALT, alu::SRL_SRA) => ((a as i64) >> shamt) as u64,
        (funct7::DEFAULT, alu::OR) => a | b,
        (funct7::DEFAULT, alu::AND) => a & b,
        _ => return None,
    };
    Some((value, OpClass::Alu))
}

/// 32-bit register-register operations; results are sign-extended.
fn reg_op_32(funct3: u32, f7: u32, a: u64, b: u64) -> Option<(u64, OpClass)> {
    let (a, b) = (a as i32, b as i32);
    let shamt = (b & 0x1F) as u32;
    let (value, class) = match (f7, funct3) {
        (funct7::MULDIV, alu::ADD_SUB) => (a.wrapping_mul(b), OpClass::Mul),
        (funct7::DEFAULT, alu::ADD_SUB) => (a.wrapping_add(b), OpClass::Alu),
        (funct7::ALT, alu::ADD_SUB) => (a.wrapping_sub(b), OpClass::Alu),
        (funct7::DEFAULT, alu::SLL) => (a << shamt, OpClass::Alu),
        (funct7::DEFAULT, alu::SRL_SRA) => (((a as u32) >> shamt) as i32, OpClass::Alu),
        (funct7::ALT, alu::SRL_SRA) => (a >> shamt, OpClass::Alu),
        _ => return None,
    };
    Some((value as i64 as u64, class))
}

/// Sign-extends a `size`-byte value to 64 bits.
fn sign_extend(value: u64, size: usize) -> u64 {
    let shift = 64 - 8 * size as u32;
    (((value << shift) as i64) >> shift) as u64
}

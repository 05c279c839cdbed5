//! Register indices with a fixed role for the executor and the workload loader.

/// Stack pointer (`sp`, x2); the loader sets it to the top of each core's stack.
pub const REG_SP: usize = 2;
/// First argument and exit code (`a0`, x10); holds the hart id at entry.
pub const REG_A0: usize = 10;
/// System call number (`a7`, x17).
pub const REG_A7: usize = 17;

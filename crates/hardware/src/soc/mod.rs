//! System-on-Chip components.
//!
//! This module organizes the parts a board is built from: the cache model,
//! main memory with its controllers, the bindings that attach both to a
//! processor, and the `Board` that owns everything.

/// Board assembly and core memory ports.
pub mod board;

/// Cache and memory bindings.
pub mod binding;

/// Set-associative cache model.
pub mod cache;

/// Main memory, buffers, and controllers.
pub mod memory;

pub use board::Board;

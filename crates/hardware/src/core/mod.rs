//! Processor cores.
//!
//! This module contains everything that executes instructions. It provides:
//! 1. **Architecture:** Register file and privilege modes.
//! 2. **State:** `CoreState` and the neutral `CoreSnapshot` used for model transfers.
//! 3. **Execution:** Instruction semantics shared by every model.
//! 4. **Models:** Functional and detailed engines behind `ModelDispatch`.
//! 5. **Processor:** `SwitchableProcessor` and its core slots.

/// Architectural state components (GPRs, privilege modes).
pub mod arch;

/// Shared instruction semantics and the memory port trait.
pub mod exec;

/// Execution models and CPU type identifiers.
pub mod models;

/// Switchable processor and core slots.
pub mod processor;

/// Core state and snapshots.
pub mod state;

pub use self::models::CpuType;
pub use self::processor::{ActiveVariant, SwitchOutcome, SwitchableProcessor};
pub use self::state::{CoreSnapshot, CoreState};

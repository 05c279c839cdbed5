//! Simulation driver and its collaborators.
//!
//! This module drives a built board through simulated time. It provides:
//! 1. **Driver:** The lifecycle state machine and event dispatch loop.
//! 2. **Event queue:** Time-ordered events with deterministic tie-breaking.
//! 3. **Policies:** Pluggable triggers for core-type switches.
//! 4. **Workloads:** Resource providers that resolve program images.
//! 5. **Checkpoints:** Serializable snapshots of the complete simulator.

/// Checkpoint documents.
pub mod checkpoint;

/// Lifecycle state machine and dispatch loop.
pub mod driver;

/// Time-ordered event queue.
pub mod event;

/// Switch trigger policies.
pub mod policy;

/// Workload images and resource providers.
pub mod workload;

pub use checkpoint::Checkpoint;
pub use driver::{
    CancelToken, ExitCause, ExitEvent, SimPhase, SimulationDriver, SimulationOptions,
    SimulationState,
};
pub use event::EventQueue;
pub use policy::{PolicyConfig, SwitchPolicy};
pub use workload::{DirectoryProvider, InMemoryProvider, ResourceProvider, WorkloadImage};

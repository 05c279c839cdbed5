//! Common types shared by every part of the simulator.
//!
//! This module provides the building blocks the rest of the crate depends on:
//! 1. **Error Handling:** The configuration/resource/switch/fault taxonomy and exit statuses.
//! 2. **Units:** Byte sizes, frequencies, ticks, and the board clock domain.

/// Error types and exit statuses.
pub mod error;

/// Size, frequency, and time-base units.
pub mod units;

pub use error::{
    CheckpointError, ConfigurationError, ExitStatus, ResourceNotFoundError, SimError,
    SimulationFault, SwitchError,
};
pub use units::{ByteSize, ClockDomain, Frequency, Tick};

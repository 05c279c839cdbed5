//! # Unit Components
//!
//! Tests grouped by the component they exercise, bottom-up from requirement
//! validation to the simulation driver.


/// Size, frequency, and clock-domain units.
pub mod units;

/// JSON configuration loading and spec conversion.
pub mod config;




/// Switchable processor and core-state transfer.
pub mod processor;



/// Workload images and resource providers.
pub mod workload;



/// Statistics counters and reports.
pub mod stats;

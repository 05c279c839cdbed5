//! Memory controller implementations for latency modeling.
//!
//! This module provides:
//! 1. **SimpleController:** Fixed latency per access (no row-buffer modeling).
//! 2. **DramController:** Row-buffer-aware latency (CAS, RAS, precharge) for DRAM-style timing.
//! 3. **ChannelController:** Serializable enum over both, one per memory channel.
//!
//! Every controller counts its accesses and row-buffer hits so the statistics
//! dump can report them per channel.

use serde::{Deserialize, Serialize};

/// Trait for memory controller implementations that report access latency in cycles.
pub trait MemoryController {
    /// Returns the number of cycles required for an access to the given channel-local address.
    ///
    /// # Arguments
    ///
    /// * `addr` - Channel-local address being accessed (used for row-buffer modeling).
    ///
    /// # Returns
    ///
    /// Latency in board cycles.
    fn access_latency(&mut self, addr: u64) -> u64;

    /// Accesses served so far.
    fn accesses(&self) -> u64;

    /// Accesses that hit the open row.
    fn row_hits(&self) -> u64;
}

/// Fixed-latency memory controller; every access takes the same number of cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleController {
    latency: u64,
    accesses: u64,
}

impl SimpleController {
    /// Creates a simple controller with the given fixed latency in cycles.
    pub const fn new(latency: u64) -> Self {
        Self {
            latency,
            accesses: 0,
        }
    }
}

impl MemoryController for SimpleController {
    fn access_latency(&mut self, _addr: u64) -> u64 {
        self.accesses += 1;
        self.latency
    }

    fn accesses(&self) -> u64 {
        self.accesses
    }

    fn row_hits(&self) -> u64 {
        0
    }
}

/// DRAM-style controller with row buffer; models CAS, RAS, and precharge latencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DramController {
    open_row: Option<u64>,
    t_cas: u64,
    t_ras: u64,
    t_pre: u64,
    row_shift: u32,
    accesses: u64,
    row_hits: u64,
}

impl DramController {
    /// Creates a DRAM controller with the given timing parameters (in cycles).
    ///
    /// # Arguments
    ///
    /// * `t_cas` - Column access strobe latency.
    /// * `t_ras` - Row access strobe latency.
    /// * `t_pre` - Precharge latency.
    /// * `row_bytes` - Row buffer size; rounded up to a power of two.
    ///
    /// # Returns
    ///
    /// A new `DramController` with no row currently open.
    pub const fn new(t_cas: u64, t_ras: u64, t_pre: u64, row_bytes: u64) -> Self {
        Self {
            open_row: None,
            t_cas,
            t_ras,
            t_pre,
            row_shift: row_bytes.next_power_of_two().trailing_zeros(),
            accesses: 0,
            row_hits: 0,
        }
    }

    /// Currently open row, if any.
    pub const fn open_row(&self) -> Option<u64> {
        self.open_row
    }
}

impl MemoryController for DramController {
    fn access_latency(&mut self, addr: u64) -> u64 {
        self.accesses += 1;
        let row = addr >> self.row_shift;
        match self.open_row {
            Some(open) if open == row => {
                self.row_hits += 1;
                self.t_cas
            }
            Some(_) => {
                self.open_row = Some(row);
                self.t_pre + self.t_ras + self.t_cas
            }
            None => {
                self.open_row = Some(row);
                self.t_ras + self.t_cas
            }
        }
    }

    fn accesses(&self) -> u64 {
        self.accesses
    }

    fn row_hits(&self) -> u64 {
        self.row_hits
    }
}

/// Controller for one memory channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelController {
    /// Fixed latency.
    Simple(SimpleController),
    /// Row-buffer DRAM.
    Dram(DramController),
}

impl ChannelController {
    /// Zeroes the access counters, keeping the open row.
    pub fn reset_counters(&mut self) {
        match self {
            Self::Simple(c) => c.accesses = 0,
            Self::Dram(c) => {
                c.accesses = 0;
                c.row_hits = 0;
            }
        }
    }
}

impl MemoryController for ChannelController {
    fn access_latency(&mut self, addr: u64) -> u64 {
        match self {
            Self::Simple(c) => c.access_latency(addr),
            Self::Dram(c) => c.access_latency(addr),
        }
    }

    fn accesses(&self) -> u64 {
        match self {
            Self::Simple(c) => c.accesses(),
            Self::Dram(c) => c.accesses(),
        }
    }

    fn row_hits(&self) -> u64 {
        match self {
            Self::Simple(c) => c.row_hits(),
            Self::Dram(c) => c.row_hits(),
        }
    }
}

//! Main memory system.
//!
//! This module implements the board's DRAM. It provides:
//! 1. **Timing classes:** Named DRAM generations with their CAS/RCD/RP timings.
//! 2. **Buffer:** A sparse page store holding memory contents.
//! 3. **Controllers:** One latency model per channel; channels are interleaved
//!    at cache-line granularity.

/// Sparse page store for memory contents.
pub mod buffer;

/// Memory controller implementations for access latency modeling.
pub mod controller;

use std::fmt;

use serde::{Deserialize, Serialize};

use self::buffer::PageStore;
use self::controller::{ChannelController, DramController, MemoryController, SimpleController};
use crate::common::error::CheckpointError;
use crate::common::units::ClockDomain;
use crate::topology::MemorySpec;

/// DRAM timing class of every channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryTiming {
    /// DDR3-1600, 8 devices of x8.
    #[serde(rename = "DDR3_1600", alias = "DDR3_1600_8x8")]
    Ddr3_1600,
    /// DDR4-2400, 8 devices of x8.
    #[serde(rename = "DDR4_2400", alias = "DDR4_2400_8x8")]
    Ddr4_2400,
    /// LPDDR3-1600, one x32 device.
    #[serde(rename = "LPDDR3_1600", alias = "LPDDR3_1600_1x32")]
    Lpddr3_1600,
    /// HBM at 1000 MHz, one x128 pseudo-channel.
    #[serde(rename = "HBM_1000", alias = "HBM_1000_4H_1x128")]
    Hbm1000,
    /// Fixed latency, no row buffer.
    #[serde(rename = "SIMPLE", alias = "Simple")]
    Simple,
}

/// Device timings in picoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DramTimings {
    /// Column access latency.
    pub t_cl: u64,
    /// Row activate to column access.
    pub t_rcd: u64,
    /// Row precharge.
    pub t_rp: u64,
    /// Row buffer size in bytes.
    pub row_bytes: u64,
}

impl MemoryTiming {
    /// Canonical configuration name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ddr3_1600 => "DDR3_1600",
            Self::Ddr4_2400 => "DDR4_2400",
            Self::Lpddr3_1600 => "LPDDR3_1600",
            Self::Hbm1000 => "HBM_1000",
            Self::Simple => "SIMPLE",
        }
    }

    /// Device timings. For `Simple` only `t_cl` is meaningful.
    pub const fn timings(self) -> DramTimings {
        match self {
            Self::Ddr3_1600 => DramTimings {
                t_cl: 13_750,
                t_rcd: 13_750,
                t_rp: 13_750,
                row_bytes: 8192,
            },
            Self::Ddr4_2400 => DramTimings {
                t_cl: 14_160,
                t_rcd: 14_160,
                t_rp: 14_160,
                row_bytes: 8192,
            },
            Self::Lpddr3_1600 => DramTimings {
                t_cl: 15_000,
                t_rcd: 18_000,
                t_rp: 18_000,
                row_bytes: 4096,
            },
            Self::Hbm1000 => DramTimings {
                t_cl: 7_000,
                t_rcd: 7_000,
                t_rp: 7_000,
                row_bytes: 2048,
            },
            Self::Simple => DramTimings {
                t_cl: 30_000,
                t_rcd: 0,
                t_rp: 0,
                row_bytes: 0,
            },
        }
    }

    fn controller(self, clock: &ClockDomain) -> ChannelController {
        let t = self.timings();
        let cycles = |ps: u64| ps.div_ceil(clock.period());
        match self {
            Self::Simple => ChannelController::Simple(SimpleController::new(cycles(t.t_cl))),
            _ => ChannelController::Dram(DramController::new(
                cycles(t.t_cl),
                cycles(t.t_rcd),
                cycles(t.t_rp),
                t.row_bytes,
            )),
        }
    }
}

impl fmt::Display for MemoryTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Contents and controller state captured by a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryImage {
    /// Memory contents.
    pub pages: PageStore,
    /// Per-channel controller state.
    pub channels: Vec<ChannelController>,
}

/// Board main memory: contents plus per-channel latency models.
#[derive(Debug, Clone)]
pub struct MemorySystem {
    base: u64,
    capacity: u64,
    line_bytes: u64,
    timing: MemoryTiming,
    writeback_cycles: u64,
    channels: Vec<ChannelController>,
    store: PageStore,
}

impl MemorySystem {
    /// Builds memory from an already-checked spec.
    pub(crate) fn new(spec: &MemorySpec, line_bytes: usize, clock: &ClockDomain) -> Self {
        let channels = (0..spec.channels)
            .map(|_| spec.timing.controller(clock))
            .collect();
        Self {
            base: spec.base,
            capacity: spec.capacity.bytes(),
            line_bytes: line_bytes as u64,
            timing: spec.timing,
            writeback_cycles: spec.timing.timings().t_cl.div_ceil(clock.period()),
            channels,
            store: PageStore::new(),
        }
    }

    /// Physical base address.
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Capacity in bytes.
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Timing class.
    pub const fn timing(&self) -> MemoryTiming {
        self.timing
    }

    /// Channel controllers.
    pub fn channels(&self) -> &[ChannelController] {
        &self.channels
    }

    /// Whether `[addr, addr + len)` lies inside memory.
    pub fn contains(&self, addr: u64, len: u64) -> bool {
        // Offsets keep this valid when memory ends exactly at 2^64.
        addr >= self.base
            && (addr - self.base)
                .checked_add(len)
                .is_some_and(|end| end <= self.capacity)
    }

    /// Reads `size` little-endian bytes, zero-extended.
    pub fn read(&self, addr: u64, size: usize) -> Option<u64> {
        if size > 8 || !self.contains(addr, size as u64) {
            return None;
        }
        let mut buf = [0u8; 8];
        self.store.read(addr - self.base, &mut buf[..size]);
        Some(u64::from_le_bytes(buf))
    }

    /// Writes the low `size` bytes of `val`, little-endian.
    pub fn write(&mut self, addr: u64, size: usize, val: u64) -> bool {
        if size > 8 || !self.contains(addr, size as u64) {
            return false;
        }
        self.store
            .write(addr - self.base, &val.to_le_bytes()[..size]);
        true
    }

    /// Copies a workload segment into memory.
    pub fn load(&mut self, addr: u64, data: &[u8]) -> bool {
        if !self.contains(addr, data.len() as u64) {
            return false;
        }
        self.store.write(addr - self.base, data);
        true
    }

    /// Channel serving `addr` and the address within that channel.
    pub fn channel_of(&self, addr: u64) -> (usize, u64) {
        let offset = addr.saturating_sub(self.base);
        let line = offset / self.line_bytes;
        let channels = self.channels.len() as u64;
        let channel = (line % channels) as usize;
        let local = (line / channels) * self.line_bytes + offset % self.line_bytes;
        (channel, local)
    }

    /// Latency in cycles of a line fill from `addr`.
    pub fn access_latency(&mut self, addr: u64) -> u64 {
        let (channel, local) = self.channel_of(addr);
        self.channels
            .get_mut(channel)
            .map_or(0, |c| c.access_latency(local))
    }

    /// Cycles charged for writing a dirty line back.
    pub const fn writeback_latency(&self) -> u64 {
        self.writeback_cycles
    }

    /// Total accesses and row hits across every channel.
    pub fn totals(&self) -> (u64, u64) {
        self.channels
            .iter()
            .fold((0, 0), |(a, h), c| (a + c.accesses(), h + c.row_hits()))
    }

    /// Zeroes every channel's counters.
    pub fn reset_counters(&mut self) {
        self.channels
            .iter_mut()
            .for_each(ChannelController::reset_counters);
    }

    /// Captures contents and controller state.
    pub fn image(&self) -> MemoryImage {
        MemoryImage {
            pages: self.store.clone(),
            channels: self.channels.clone(),
        }
    }

    /// Restores contents and controller state.
    ///
    /// # Errors
    ///
    /// `CheckpointError::Incompatible` when the channel count differs.
    pub fn restore(&mut self, image: MemoryImage) -> Result<(), CheckpointError> {
        if image.channels.len() != self.channels.len() {
            return Err(CheckpointError::Incompatible(format!(
                "checkpoint has {} memory channels, board has {}",
                image.channels.len(),
                self.channels.len()
            )));
        }
        self.store = image.pages;
        self.channels = image.channels;
        Ok(())
    }
}

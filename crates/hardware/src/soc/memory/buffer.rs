//! Sparse backing store for simulated DRAM.
//!
//! Pages are allocated on first write, so a multi-gigabyte memory costs only
//! what the workload touches. Unwritten bytes read as zero. The page map is
//! ordered, which keeps checkpoint encodings deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Bytes per backing page.
pub const PAGE_BYTES: u64 = 4096;

/// Sparse, page-granular byte store addressed by offset from the memory base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStore {
    pages: BTreeMap<u64, Vec<u8>>,
}

impl PageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of allocated pages.
    pub fn resident_pages(&self) -> usize {
        self.pages.len()
    }

    /// Copies `buf.len()` bytes starting at `offset` into `buf`.
    pub fn read(&self, offset: u64, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            let at = offset + i as u64;
            *byte = self
                .pages
                .get(&(at / PAGE_BYTES))
                .map_or(0, |page| page[(at % PAGE_BYTES) as usize]);
        }
    }

    /// Writes `data` starting at `offset`.
    pub fn write(&mut self, offset: u64, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            let at = offset + i as u64;
            let page = self
                .pages
                .entry(at / PAGE_BYTES)
                .or_insert_with(|| vec![0; PAGE_BYTES as usize]);
            page[(at % PAGE_BYTES) as usize] = byte;
        }
    }
}

//! Set-associative cache model.
//!
//! Tag-only model: contents live in main memory, the cache tracks which lines
//! are resident and dirty so that hits, misses, and write-backs can be timed
//! and counted. Replacement is least-recently-used per set. All state is
//! serializable for checkpoints.

use serde::{Deserialize, Serialize};

/// Cache line entry containing tag, validity, and dirty bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CacheLine {
    tag: u64,
    valid: bool,
    dirty: bool,
}

/// Hit, miss, write-back, and invalidation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCounters {
    /// Lookups that found the line.
    pub hits: u64,
    /// Lookups that installed the line.
    pub misses: u64,
    /// Dirty victims written back.
    pub writebacks: u64,
    /// Lines removed by another core's store.
    pub invalidations: u64,
}

impl CacheCounters {
    /// Hits plus misses.
    pub const fn accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    /// The line was resident.
    pub hit: bool,
    /// A dirty victim was evicted to make room.
    pub writeback: bool,
}

/// Set-associative cache with LRU replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    latency: u64,
    num_sets: usize,
    ways: usize,
    line_bytes: usize,
    lines: Vec<CacheLine>,
    /// Per-set usage stack; index 0 is most recently used.
    usage: Vec<Vec<usize>>,
    counters: CacheCounters,
}

impl Cache {
    /// Creates a cache of `num_sets` sets of `ways` lines.
    ///
    /// Geometry must already be validated; zero values are clamped to one.
    pub fn new(num_sets: usize, ways: usize, line_bytes: usize, latency: u64) -> Self {
        let num_sets = num_sets.max(1);
        let ways = ways.max(1);
        Self {
            latency,
            num_sets,
            ways,
            line_bytes: line_bytes.max(1),
            lines: vec![CacheLine::default(); num_sets * ways],
            usage: (0..num_sets).map(|_| (0..ways).collect()).collect(),
            counters: CacheCounters::default(),
        }
    }

    /// Hit latency in cycles.
    pub const fn latency(&self) -> u64 {
        self.latency
    }

    /// Number of sets.
    pub const fn num_sets(&self) -> usize {
        self.num_sets
    }

    /// Associativity.
    pub const fn ways(&self) -> usize {
        self.ways
    }

    /// Accumulated counters.
    pub const fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    /// Zeroes the counters, keeping contents.
    pub fn reset_counters(&mut self) {
        self.counters = CacheCounters::default();
    }

    fn locate(&self, addr: u64) -> (usize, u64) {
        let line = addr / self.line_bytes as u64;
        let set = (line % self.num_sets as u64) as usize;
        let tag = line / self.num_sets as u64;
        (set, tag)
    }

    fn find(&self, set: usize, tag: u64) -> Option<usize> {
        let base = set * self.ways;
        (0..self.ways).find(|&way| {
            let line = &self.lines[base + way];
            line.valid && line.tag == tag
        })
    }

    fn touch(&mut self, set: usize, way: usize) {
        let stack = &mut self.usage[set];
        if let Some(pos) = stack.iter().position(|&w| w == way) {
            let _ = stack.remove(pos);
        }
        stack.insert(0, way);
    }

    /// Whether the line holding `addr` is resident.
    pub fn contains(&self, addr: u64) -> bool {
        let (set, tag) = self.locate(addr);
        self.find(set, tag).is_some()
    }

    /// Looks up `addr`, installing the line on a miss.
    ///
    /// A write marks the line dirty. On a miss the LRU way is replaced and a
    /// write-back is reported if it was dirty.
    pub fn access(&mut self, addr: u64, is_write: bool) -> Lookup {
        let (set, tag) = self.locate(addr);
        if let Some(way) = self.find(set, tag) {
            self.touch(set, way);
            if is_write {
                self.lines[set * self.ways + way].dirty = true;
            }
            self.counters.hits += 1;
            return Lookup {
                hit: true,
                writeback: false,
            };
        }

        self.counters.misses += 1;
        let victim = self.usage[set].last().copied().unwrap_or(0);
        let idx = set * self.ways + victim;
        let writeback = self.lines[idx].valid && self.lines[idx].dirty;
        if writeback {
            self.counters.writebacks += 1;
        }
        self.lines[idx] = CacheLine {
            tag,
            valid: true,
            dirty: is_write,
        };
        self.touch(set, victim);
        Lookup {
            hit: false,
            writeback,
        }
    }

    /// Drops the line holding `addr`, if resident. Returns whether it was.
    pub fn invalidate(&mut self, addr: u64) -> bool {
        let (set, tag) = self.locate(addr);
        match self.find(set, tag) {
            Some(way) => {
                self.lines[set * self.ways + way] = CacheLine::default();
                self.counters.invalidations += 1;
                true
            }
            None => false,
        }
    }
}

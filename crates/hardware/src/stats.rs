//! Simulation statistics collection and reporting.
//!
//! This module tracks performance metrics for a board run. It provides:
//! 1. **Core counters:** Cycles, retired instructions split by active variant, instruction mix, switches.
//! 2. **Hardware counters:** Per-cache hits, misses, write-backs; per-channel accesses and row hits.
//! 3. **Named dump:** A sorted `name -> value` map and a `name value # description` text file.
//! 4. **Summary:** Instructions, cycles, IPC, and per-level miss rate and MPKI.
//!
//! Counters cover the measured region: they are zeroed when warm-up ends.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::units::{TICKS_PER_SECOND, Tick};
use crate::core::exec::{Executed, OpClass};
use crate::core::processor::ActiveVariant;
use crate::soc::Board;
use crate::soc::cache::CacheCounters;
use crate::soc::memory::controller::MemoryController;

/// Per-core counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreStats {
    /// Cycles the core was occupied.
    pub cycles: u64,
    /// Instructions retired on the starting variant.
    pub insts_starting: u64,
    /// Instructions retired on the switch variant.
    pub insts_switch: u64,
    /// ALU and multiply instructions.
    pub inst_alu: u64,
    /// Loads.
    pub inst_load: u64,
    /// Stores.
    pub inst_store: u64,
    /// Branches and jumps.
    pub inst_branch: u64,
    /// Fences, environment calls, pseudo-instructions.
    pub inst_system: u64,
    /// Completed model switches.
    pub switches: u64,
}

impl CoreStats {
    /// Instructions retired on either variant.
    pub const fn instructions(&self) -> u64 {
        self.insts_starting + self.insts_switch
    }
}

/// Per-channel memory counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Line fills served.
    pub accesses: u64,
    /// Fills that hit the open row.
    pub row_hits: u64,
}

/// Simulation statistics for one board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStats {
    /// Tick at which the measured region began.
    pub roi_start: Tick,
    /// Tick of the last update.
    pub final_tick: Tick,
    /// Board clock period in ticks.
    pub clock_period: Tick,
    /// Per-core counters.
    pub cores: Vec<CoreStats>,
    /// Per-core L1 instruction cache counters.
    pub l1i: Vec<CacheCounters>,
    /// Per-core L1 data cache counters.
    pub l1d: Vec<CacheCounters>,
    /// Per-bank L2 counters.
    pub l2: Vec<CacheCounters>,
    /// Per-channel memory counters.
    pub memory: Vec<ChannelStats>,
}

/// Section names for selective stats output.
///
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "core", "instruction_mix", "memory"];

impl SimStats {
    /// Zeroed statistics for `cores` cores.
    pub fn new(cores: usize, clock_period: Tick) -> Self {
        Self {
            clock_period,
            cores: vec![CoreStats::default(); cores],
            ..Self::default()
        }
    }

    /// Simulated ticks in the measured region.
    pub const fn sim_ticks(&self) -> Tick {
        self.final_tick.saturating_sub(self.roi_start)
    }

    /// Instructions retired by every core.
    pub fn total_instructions(&self) -> u64 {
        self.cores.iter().map(CoreStats::instructions).sum()
    }

    /// Cycles of the busiest core.
    pub fn total_cycles(&self) -> u64 {
        self.cores.iter().map(|c| c.cycles).max().unwrap_or(0)
    }

    /// Charges `cycles` of occupancy to `core`.
    pub fn add_cycles(&mut self, core: usize, cycles: u64) {
        if let Some(c) = self.cores.get_mut(core) {
            c.cycles += cycles;
        }
    }

    /// Counts a retirement on `core`.
    pub fn record_retire(&mut self, core: usize, variant: ActiveVariant, executed: &Executed) {
        let Some(c) = self.cores.get_mut(core) else {
            return;
        };
        match variant {
            ActiveVariant::Starting => c.insts_starting += 1,
            ActiveVariant::Switch => c.insts_switch += 1,
        }
        match executed.class {
            OpClass::Alu | OpClass::Mul => c.inst_alu += 1,
            OpClass::Load => c.inst_load += 1,
            OpClass::Store => c.inst_store += 1,
            OpClass::Branch => c.inst_branch += 1,
            OpClass::System => c.inst_system += 1,
        }
    }

    /// Counts a completed switch on `core`.
    pub fn record_switch(&mut self, core: usize) {
        if let Some(c) = self.cores.get_mut(core) {
            c.switches += 1;
        }
    }

    /// Zeroes every counter and starts the measured region at `tick`.
    pub fn reset(&mut self, tick: Tick) {
        let cores = self.cores.len();
        *self = Self {
            roi_start: tick,
            final_tick: tick,
            clock_period: self.clock_period,
            cores: vec![CoreStats::default(); cores],
            ..Self::default()
        };
    }

    /// Copies the cache and memory counters out of `board` and stamps `tick`.
    pub fn sync_hardware(&mut self, board: &Board, tick: Tick) {
        let caches = board.caches();
        self.final_tick = tick;
        self.l1i = caches.l1i().iter().map(|c| *c.counters()).collect();
        self.l1d = caches.l1d().iter().map(|c| *c.counters()).collect();
        self.l2 = caches.l2_banks().iter().map(|c| *c.counters()).collect();
        self.memory = board
            .memory()
            .channels()
            .iter()
            .map(|c| ChannelStats {
                accesses: c.accesses(),
                row_hits: c.row_hits(),
            })
            .collect();
    }

    fn entries(&self) -> Vec<(String, u64, &'static str)> {
        let mut out = vec![
            ("sim_ticks".to_string(), self.sim_ticks(), "Number of ticks simulated"),
            ("final_tick".to_string(), self.final_tick, "Number of ticks from beginning of simulation"),
            ("sim_freq".to_string(), TICKS_PER_SECOND, "Number of ticks per simulated second"),
            ("sim_insts".to_string(), self.total_instructions(), "Number of instructions simulated"),
            ("board.clk_domain.clock".to_string(), self.clock_period, "Clock period in ticks"),
        ];
        for (i, c) in self.cores.iter().enumerate() {
            let p = format!("board.processor.cores{i}");
            out.extend([
                (format!("{p}.num_cycles"), c.cycles, "Number of cycles the core was occupied"),
                (format!("{p}.committed_insts"), c.instructions(), "Number of instructions committed"),
                (format!("{p}.committed_insts_starting"), c.insts_starting, "Instructions committed on the starting model"),
                (format!("{p}.committed_insts_switch"), c.insts_switch, "Instructions committed on the switch model"),
                (format!("{p}.num_alu_insts"), c.inst_alu, "Number of integer ALU instructions"),
                (format!("{p}.num_load_insts"), c.inst_load, "Number of load instructions"),
                (format!("{p}.num_store_insts"), c.inst_store, "Number of store instructions"),
                (format!("{p}.num_branch_insts"), c.inst_branch, "Number of branch and jump instructions"),
                (format!("{p}.num_system_insts"), c.inst_system, "Number of system instructions"),
                (format!("{p}.num_switches"), c.switches, "Number of execution model switches"),
            ]);
        }
        let caches = [
            ("l1icaches", &self.l1i),
            ("l1dcaches", &self.l1d),
            ("l2_banks", &self.l2),
        ];
        for (name, level) in caches {
            for (i, c) in level.iter().enumerate() {
                let p = format!("board.cache_hierarchy.{name}{i}");
                out.extend([
                    (format!("{p}.hits"), c.hits, "Number of hits"),
                    (format!("{p}.misses"), c.misses, "Number of misses"),
                    (format!("{p}.writebacks"), c.writebacks, "Number of dirty lines written back"),
                    (format!("{p}.invalidations"), c.invalidations, "Number of lines invalidated by remote stores"),
                ]);
            }
        }
        for (i, c) in self.memory.iter().enumerate() {
            let p = format!("board.memory.channels{i}");
            out.extend([
                (format!("{p}.accesses"), c.accesses, "Number of line fills served"),
                (format!("{p}.row_hits"), c.row_hits, "Number of fills that hit the open row"),
            ]);
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Every counter by name, sorted.
    pub fn named_counters(&self) -> BTreeMap<String, u64> {
        self.entries()
            .into_iter()
            .map(|(name, value, _)| (name, value))
            .collect()
    }

    /// Writes the counters as `name value # description` lines.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from `out`.
    pub fn write_stats<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "---------- Begin Simulation Statistics ----------")?;
        for (name, value, desc) in self.entries() {
            writeln!(out, "{name:<60} {value:>20} # {desc}")?;
        }
        writeln!(out, "---------- End Simulation Statistics   ----------")
    }

    /// Writes the counters to a `stats.txt`-style file.
    ///
    /// # Errors
    ///
    /// Propagates file creation and write errors.
    pub fn write_stats_txt(&self, path: &Path) -> io::Result<()> {
        let mut file = io::BufWriter::new(fs::File::create(path)?);
        self.write_stats(&mut file)?;
        file.flush()
    }

    /// Derived headline metrics.
    pub fn summary(&self) -> StatsSummary {
        let instructions = self.total_instructions();
        let cycles = self.total_cycles();
        let level = |counters: &[CacheCounters]| {
            let accesses: u64 = counters.iter().map(CacheCounters::accesses).sum();
            let misses: u64 = counters.iter().map(|c| c.misses).sum();
            LevelSummary {
                accesses,
                misses,
                miss_rate: ratio(misses, accesses),
                mpki: ratio(misses * 1000, instructions),
            }
        };
        let mut levels = BTreeMap::new();
        let _ = levels.insert("l1i".to_string(), level(&self.l1i));
        let _ = levels.insert("l1d".to_string(), level(&self.l1d));
        let _ = levels.insert("l2".to_string(), level(&self.l2));
        StatsSummary {
            instructions,
            cycles,
            ipc: ratio(instructions, cycles),
            sim_seconds: self.sim_ticks() as f64 / TICKS_PER_SECOND as f64,
            levels,
        }
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// Each element of `sections` should be one of `STATS_SECTIONS`. Pass an
    /// empty slice to print all sections.
    pub fn print_sections(&self, sections: &[String]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let summary = self.summary();

        if want("summary") {
            println!("\n==========================================================");
            println!("BOARD SIMULATION STATISTICS");
            println!("==========================================================");
            println!("sim_ticks                {}", self.sim_ticks());
            println!("sim_seconds              {:.6}", summary.sim_seconds);
            println!("sim_cycles               {}", summary.cycles);
            println!("sim_insts                {}", summary.instructions);
            println!("sim_ipc                  {:.4}", summary.ipc);
            println!("----------------------------------------------------------");
        }
        if want("core") {
            println!("CORE BREAKDOWN");
            for (i, c) in self.cores.iter().enumerate() {
                println!(
                    "  core{i:<3} cycles: {:<10} | insts: {:<10} (starting {} / switch {}) | switches: {}",
                    c.cycles,
                    c.instructions(),
                    c.insts_starting,
                    c.insts_switch,
                    c.switches
                );
            }
            println!("----------------------------------------------------------");
        }
        if want("instruction_mix") {
            let total = self.total_instructions().max(1) as f64;
            let sum = |f: fn(&CoreStats) -> u64| self.cores.iter().map(f).sum::<u64>();
            println!("INSTRUCTION MIX");
            for (name, count) in [
                ("op.alu", sum(|c| c.inst_alu)),
                ("op.load", sum(|c| c.inst_load)),
                ("op.store", sum(|c| c.inst_store)),
                ("op.branch", sum(|c| c.inst_branch)),
                ("op.system", sum(|c| c.inst_system)),
            ] {
                println!(
                    "  {name:<22} {count} ({:.2}%)",
                    (count as f64 / total) * 100.0
                );
            }
            println!("----------------------------------------------------------");
        }
        if want("memory") {
            println!("MEMORY HIERARCHY");
            for (name, level) in &summary.levels {
                println!(
                    "  {:<6} accesses: {:<10} | misses: {:<10} | miss_rate: {:.2}% | mpki: {:.3}",
                    name,
                    level.accesses,
                    level.misses,
                    level.miss_rate * 100.0,
                    level.mpki
                );
            }
            for (i, c) in self.memory.iter().enumerate() {
                println!(
                    "  mem{i:<3} accesses: {:<10} | row_hits: {}",
                    c.accesses, c.row_hits
                );
            }
        }
        println!("==========================================================");
    }
}

/// `num / den`, or zero when `den` is zero.
fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Per-level derived metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    /// Hits plus misses.
    pub accesses: u64,
    /// Misses.
    pub misses: u64,
    /// Misses per access.
    pub miss_rate: f64,
    /// Misses per thousand instructions.
    pub mpki: f64,
}

/// Headline metrics of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    /// Instructions retired by every core.
    pub instructions: u64,
    /// Cycles of the busiest core.
    pub cycles: u64,
    /// Instructions per cycle.
    pub ipc: f64,
    /// Simulated seconds in the measured region.
    pub sim_seconds: f64,
    /// `l1i`, `l1d`, `l2`.
    pub levels: BTreeMap<String, LevelSummary>,
}

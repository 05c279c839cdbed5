//! # Statistics Tests

use boardsim_core::core::exec::{Effect, Executed, OpClass};
use boardsim_core::core::processor::ActiveVariant;
use boardsim_core::stats::{STATS_SECTIONS, SimStats};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::builder::instruction::counting_loop;
use crate::common::harness::{BoardHarness, MEMORY_BASE};

fn executed(class: OpClass) -> Executed {
    Executed {
        pc: MEMORY_BASE,
        raw: 0x0000_0013,
        class,
        effect: Effect::None,
        fetch_cycles: 1,
        data_cycles: 0,
    }
}

#[test]
fn named_counters_cover_every_core() {
    let stats = SimStats::new(2, 1000);

    let counters = stats.named_counters();

    for key in [
        "sim_ticks",
        "final_tick",
        "sim_freq",
        "sim_insts",
        "board.clk_domain.clock",
        "board.processor.cores0.num_cycles",
        "board.processor.cores1.committed_insts_switch",
        "board.processor.cores1.num_switches",
    ] {
        assert!(counters.contains_key(key), "missing {key}");
    }
    assert!(!counters.keys().any(|k| k.starts_with("board.processor.cores2")));
    assert_eq!(counters["sim_freq"], 1_000_000_000_000);
    assert_eq!(counters["board.clk_domain.clock"], 1000);
}

#[rstest]
#[case(OpClass::Alu)]
#[case(OpClass::Mul)]
#[case(OpClass::Load)]
#[case(OpClass::Store)]
#[case(OpClass::Branch)]
#[case(OpClass::System)]
fn retirements_land_in_one_mix_bucket(#[case] class: OpClass) {
    let mut stats = SimStats::new(1, 1000);

    stats.record_retire(0, ActiveVariant::Starting, &executed(class));

    let c = &stats.cores[0];
    let mix = c.inst_alu + c.inst_load + c.inst_store + c.inst_branch + c.inst_system;
    assert_eq!(mix, 1);
    assert_eq!(c.instructions(), 1);
}

#[test]
fn retirements_are_split_by_active_variant() {
    let mut stats = SimStats::new(2, 1000);

    stats.record_retire(1, ActiveVariant::Starting, &executed(OpClass::Alu));
    stats.record_retire(1, ActiveVariant::Switch, &executed(OpClass::Load));
    stats.record_retire(1, ActiveVariant::Switch, &executed(OpClass::Store));
    stats.record_switch(1);
    stats.add_cycles(1, 12);
    stats.add_cycles(0, 3);
    // Out-of-range cores are ignored.
    stats.record_retire(9, ActiveVariant::Switch, &executed(OpClass::Alu));

    let c = &stats.cores[1];
    assert_eq!((c.insts_starting, c.insts_switch), (1, 2));
    assert_eq!((c.inst_load, c.inst_store), (1, 1));
    assert_eq!(c.switches, 1);
    assert_eq!(stats.total_instructions(), 3);
    assert_eq!(stats.total_cycles(), 12);
}

#[test]
fn reset_starts_a_new_measured_region() {
    let mut stats = SimStats::new(2, 500);
    stats.record_retire(0, ActiveVariant::Starting, &executed(OpClass::Alu));
    stats.add_cycles(0, 4);

    stats.reset(9_000);

    assert_eq!(stats.cores.len(), 2);
    assert_eq!(stats.clock_period, 500);
    assert_eq!(stats.roi_start, 9_000);
    assert_eq!(stats.total_instructions(), 0);
    assert_eq!(stats.sim_ticks(), 0);
}

#[test]
fn text_dump_is_sorted_and_bracketed() {
    let mut stats = SimStats::new(1, 1000);
    stats.record_retire(0, ActiveVariant::Starting, &executed(OpClass::Alu));

    let mut out = Vec::new();
    stats.write_stats(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "---------- Begin Simulation Statistics ----------");
    assert_eq!(
        lines[lines.len() - 1],
        "---------- End Simulation Statistics   ----------"
    );
    let body = &lines[1..lines.len() - 1];
    let names: Vec<&str> = body
        .iter()
        .map(|l| l.split_whitespace().next().unwrap())
        .collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);

    let insts = body
        .iter()
        .find(|l| l.starts_with("sim_insts "))
        .unwrap();
    let fields: Vec<&str> = insts.split_whitespace().collect();
    assert_eq!(fields[1], "1");
    assert!(insts.ends_with("# Number of instructions simulated"));
}

#[test]
fn summary_derives_ipc_and_miss_rates() {
    let mut stats = SimStats::new(2, 1000);
    for _ in 0..4 {
        stats.record_retire(0, ActiveVariant::Starting, &executed(OpClass::Alu));
    }
    stats.add_cycles(0, 8);
    stats.add_cycles(1, 2);
    stats.final_tick = 2_000_000;

    let summary = stats.summary();

    assert_eq!(summary.instructions, 4);
    assert_eq!(summary.cycles, 8);
    assert!((summary.ipc - 0.5).abs() < f64::EPSILON);
    assert!((summary.sim_seconds - 2e-6).abs() < 1e-15);
    assert_eq!(
        summary.levels.keys().map(String::as_str).collect::<Vec<_>>(),
        ["l1d", "l1i", "l2"]
    );
    // No hardware counters were synced.
    assert_eq!(summary.levels["l2"].accesses, 0);
    assert!(summary.levels["l2"].miss_rate.abs() < f64::EPSILON);
}

#[test]
fn run_statistics_include_hardware_counters() {
    let mut driver = BoardHarness::new().driver(&counting_loop(8));
    let _ = driver.run_to_completion().unwrap();

    let stats = driver.stats();
    let counters = stats.named_counters();

    assert_eq!(counters["sim_insts"], stats.total_instructions());
    assert_eq!(counters["sim_insts"], 2 * (4 * 8 + 4));
    for core in 0..2 {
        let l1i = &stats.l1i[core];
        assert!(l1i.hits > 0 && l1i.misses > 0);
        assert_eq!(
            counters[&format!("board.cache_hierarchy.l1icaches{core}.hits")],
            l1i.hits
        );
        assert!(stats.cores[core].inst_store > 0);
    }
    let fills: u64 = stats.memory.iter().map(|c| c.accesses).sum();
    assert!(fills > 0);
    assert!(counters.contains_key("board.memory.channels1.row_hits"));

    let summary = stats.summary();
    assert!(summary.ipc > 0.0);
    assert!(summary.levels["l1i"].miss_rate > 0.0 && summary.levels["l1i"].miss_rate < 1.0);
}

#[test]
fn stats_file_is_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.txt");
    let mut driver = BoardHarness::new().driver(&counting_loop(2));
    let _ = driver.run_to_completion().unwrap();

    driver.stats().write_stats_txt(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("---------- Begin Simulation Statistics"));
    assert!(text.contains("board.processor.cores1.committed_insts"));
}

#[test]
fn section_names_are_stable() {
    assert_eq!(STATS_SECTIONS, ["summary", "core", "instruction_mix", "memory"]);
}

//! # Switchable Processor Tests
//!
//! Core-type switching, model engines, and the snapshot that carries
//! architectural state between them.

use boardsim_core::common::error::{SimulationFault, SwitchError};
use boardsim_core::core::exec::{DataPort, Effect, Executed, OpClass, Timed};
use boardsim_core::core::models::{CpuType, LatencyModel, ModelDispatch, Step};
use boardsim_core::core::processor::{ActiveVariant, SwitchOutcome, SwitchableProcessor};
use boardsim_core::core::state::{CoreSnapshot, CoreState};
use proptest::prelude::*;
use rstest::rstest;

use crate::common::builder::instruction::inst;
use crate::common::harness::processor;

/// Serves the same instruction at every address.
struct RepeatPort(u32);

impl DataPort for RepeatPort {
    fn fetch(&mut self, _pc: u64) -> Option<Timed<u32>> {
        Some(Timed {
            value: self.0,
            cycles: 4,
        })
    }

    fn load(&mut self, _addr: u64, _size: usize) -> Option<Timed<u64>> {
        None
    }

    fn store(&mut self, _addr: u64, _size: usize, _val: u64) -> Option<Timed<()>> {
        None
    }
}

fn addi_port() -> RepeatPort {
    RepeatPort(inst().addi(1, 1, 3).build())
}

fn entry_states(n: usize) -> Vec<CoreState> {
    (0..n)
        .map(|hart| CoreState::at_entry(hart, 0x8000_0000, 0x8100_0000 - hart as u64 * 0x1_0000))
        .collect()
}

#[test]
fn cores_start_on_the_starting_variant() {
    let cpu = SwitchableProcessor::new(&processor(4, CpuType::Atomic, CpuType::O3));
    assert_eq!(cpu.num_cores(), 4);
    for slot in cpu.cores() {
        assert_eq!(slot.active(), ActiveVariant::Starting);
        assert_eq!(slot.active_type(), CpuType::Atomic);
        assert_eq!(slot.dormant_type(), CpuType::O3);
        assert_eq!(slot.epoch(), 0);
        assert!(!slot.busy());
    }
    assert!(cpu.core(4).is_none());
}

#[test]
fn idle_switch_is_immediate_and_reversible() {
    let mut cpu = SwitchableProcessor::new(&processor(2, CpuType::Timing, CpuType::O3));
    cpu.reset(entry_states(2));
    let before = cpu.cores()[1].state().clone();

    assert_eq!(
        cpu.switch_core_type(1),
        Ok(SwitchOutcome::Switched {
            from: CpuType::Timing,
            to: CpuType::O3,
        })
    );
    let slot = &cpu.cores()[1];
    assert_eq!(slot.active(), ActiveVariant::Switch);
    assert_eq!(slot.epoch(), 1);
    assert_eq!(slot.switch_count(), 1);
    assert_eq!(slot.state(), &before);

    assert_eq!(
        cpu.switch_core_type(1),
        Ok(SwitchOutcome::Switched {
            from: CpuType::O3,
            to: CpuType::Timing,
        })
    );
    assert_eq!(cpu.cores()[1].state(), &before);
    assert_eq!(cpu.cores()[1].epoch(), 2);
    assert_eq!(cpu.cores()[0].epoch(), 0, "other cores are untouched");
}

#[test]
fn out_of_range_core_is_rejected() {
    let mut cpu = SwitchableProcessor::new(&processor(2, CpuType::Timing, CpuType::O3));
    assert_eq!(
        cpu.switch_core_type(5),
        Err(SwitchError::NoSuchCore { index: 5, count: 2 })
    );
}

#[test]
fn identical_variants_cannot_switch() {
    let mut cpu = SwitchableProcessor::new(&processor(1, CpuType::O3, CpuType::O3));
    assert_eq!(
        cpu.switch_core_type(0),
        Err(SwitchError::IncompatiblePairing {
            index: 0,
            cpu_type: CpuType::O3,
        })
    );
}

#[test]
fn halted_core_cannot_switch() {
    let mut cpu = SwitchableProcessor::new(&processor(2, CpuType::Timing, CpuType::O3));
    let mut states = entry_states(2);
    states[0].exit_code = Some(0);
    cpu.reset(states);
    assert_eq!(cpu.switch_core_type(0), Err(SwitchError::CoreHalted(0)));
    assert!(cpu.switch_core_type(1).is_ok());
    assert!(!cpu.all_halted());
}

#[test]
fn reset_returns_cores_to_starting_variant() {
    let mut cpu = SwitchableProcessor::new(&processor(2, CpuType::Timing, CpuType::Minor));
    let _ = cpu.switch_core_type(0).unwrap();
    cpu.reset(entry_states(2));
    assert_eq!(cpu.cores()[0].active(), ActiveVariant::Starting);
    assert_eq!(cpu.cores()[0].epoch(), 0);
    assert_eq!(cpu.cores()[0].switch_count(), 0);
}

#[test]
fn images_restore_slot_bookkeeping() {
    let mut cpu = SwitchableProcessor::new(&processor(2, CpuType::Atomic, CpuType::O3));
    cpu.reset(entry_states(2));
    let _ = cpu.switch_core_type(1).unwrap();
    let images = cpu.images();

    let mut fresh = SwitchableProcessor::new(&processor(2, CpuType::Atomic, CpuType::O3));
    fresh.restore_images(&images).unwrap();
    assert_eq!(fresh.images(), images);
    assert_eq!(fresh.cores()[1].active_type(), CpuType::O3);
    assert_eq!(fresh.cores()[1].epoch(), 1);

    let mut smaller = SwitchableProcessor::new(&processor(1, CpuType::Atomic, CpuType::O3));
    assert!(matches!(
        smaller.restore_images(&images),
        Err(SwitchError::InvalidSnapshot(_))
    ));
}

#[test]
fn functional_engine_retires_in_one_cycle() {
    let mut engine = ModelDispatch::new(CpuType::Atomic, CoreState::at_entry(0, 0x8000_0000, 0));
    let step = engine.step(0, &mut addi_port()).unwrap();
    assert!(matches!(step, Step::Retired { cycles: 1, .. }));
    assert_eq!(engine.state().instret, 1);
    assert_eq!(engine.state().regs.read(1), 3);
    assert!(engine.in_flight().is_none());
    assert_eq!(engine.complete(0), Err(SimulationFault::SpuriousCompletion(0)));
}

#[rstest]
#[case(CpuType::Timing, 1 + 4)]
#[case(CpuType::Minor, 1 + 1)]
#[case(CpuType::O3, 1)]
fn detailed_engine_holds_instruction_until_completion(
    #[case] cpu_type: CpuType,
    #[case] expected_cycles: u64,
) {
    let mut engine = ModelDispatch::new(cpu_type, CoreState::at_entry(0, 0x8000_0000, 0));
    let step = engine.step(0, &mut addi_port()).unwrap();
    assert_eq!(step, Step::Issued { cycles: expected_cycles });
    assert_eq!(engine.state().regs.read(1), 3, "effects apply at issue");
    assert_eq!(engine.state().instret, 0);
    assert!(engine.in_flight().is_some());

    assert_eq!(
        engine.step(0, &mut addi_port()),
        Err(SimulationFault::SpuriousCompletion(0))
    );

    let done = engine.complete(0).unwrap();
    assert_eq!(done.class, OpClass::Alu);
    assert_eq!(engine.state().instret, 1);
    assert!(engine.in_flight().is_none());
}

#[test]
fn latency_overlap_hides_part_of_memory_time() {
    let load = Executed {
        pc: 0,
        raw: 0,
        class: OpClass::Load,
        effect: Effect::None,
        fetch_cycles: 8,
        data_cycles: 10,
    };
    assert_eq!(LatencyModel::for_type(CpuType::Timing).cycles(&load), 1 + 8 + 10);
    assert_eq!(LatencyModel::for_type(CpuType::Minor).cycles(&load), 1 + 2 + 10);
    assert_eq!(LatencyModel::for_type(CpuType::O3).cycles(&load), 1 + 1 + 5);
}

#[test]
fn cpu_types_parse_configuration_names() {
    let types: Vec<CpuType> = serde_json::from_str(r#"["ATOMIC", "timing", "MINOR", "O3"]"#).unwrap();
    assert_eq!(
        types,
        vec![CpuType::Atomic, CpuType::Timing, CpuType::Minor, CpuType::O3]
    );
    assert!(!CpuType::Atomic.is_detailed());
    assert!(CpuType::Timing.is_detailed());
}

fn valid_snapshot() -> impl Strategy<Value = CoreSnapshot> {
    (
        prop::collection::vec(any::<u64>(), 31),
        any::<u64>(),
        prop::sample::select(vec![0u8, 1, 3]),
        prop::option::of(any::<u64>()),
        any::<u64>(),
    )
        .prop_map(|(tail, pc, mode, exit_code, instret)| {
            let mut regs = vec![0];
            regs.extend(tail);
            CoreSnapshot {
                regs,
                pc: pc & !3,
                mode,
                exit_code,
                instret,
            }
        })
}

proptest! {
    #[test]
    fn snapshot_survives_every_model(
        snapshot in valid_snapshot(),
        cpu_type in prop::sample::select(vec![CpuType::Atomic, CpuType::Timing, CpuType::Minor, CpuType::O3]),
    ) {
        let engine = ModelDispatch::from_snapshot(cpu_type, &snapshot).unwrap();
        prop_assert_eq!(engine.state().snapshot(), snapshot);
    }

    #[test]
    fn switching_out_and_back_preserves_state(
        snapshot in valid_snapshot().prop_filter("running cores only", |s| s.exit_code.is_none()),
    ) {
        let mut cpu = SwitchableProcessor::new(&processor(1, CpuType::Atomic, CpuType::O3));
        cpu.reset(vec![CoreState::from_snapshot(&snapshot).unwrap()]);
        let _ = cpu.switch_core_type(0).unwrap();
        let _ = cpu.switch_core_type(0).unwrap();
        prop_assert_eq!(cpu.cores()[0].state().snapshot(), snapshot);
        prop_assert_eq!(cpu.cores()[0].switch_count(), 2);
    }
}

#[rstest]
#[case::short_register_file(|s: &mut CoreSnapshot| { let _ = s.regs.pop(); })]
#[case::nonzero_x0(|s: &mut CoreSnapshot| s.regs[0] = 1)]
#[case::reserved_mode(|s: &mut CoreSnapshot| s.mode = 2)]
#[case::misaligned_pc(|s: &mut CoreSnapshot| s.pc = 0x8000_0002)]
fn malformed_snapshots_are_rejected(#[case] corrupt: fn(&mut CoreSnapshot)) {
    let mut snapshot = CoreState::at_entry(0, 0x8000_0000, 0x8100_0000).snapshot();
    corrupt(&mut snapshot);
    assert!(matches!(
        CoreState::from_snapshot(&snapshot),
        Err(SwitchError::InvalidSnapshot(_))
    ));
}

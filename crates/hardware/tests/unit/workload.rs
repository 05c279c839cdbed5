//! # Workload Resource Tests
//!
//! Image formats, the bundled providers, and attaching a workload to a board
//! through an injected (mocked) provider.

use std::fs;

use boardsim_core::common::error::ResourceNotFoundError;
use boardsim_core::common::units::{ByteSize, Frequency};
use boardsim_core::core::models::CpuType;
use boardsim_core::isa::abi::{REG_A0, REG_SP};
use boardsim_core::sim::workload::{
    DirectoryProvider, InMemoryProvider, ResourceProvider, Segment, WorkloadImage,
    WorkloadResource,
};
use boardsim_core::sim::{ExitCause, SimulationDriver, SimulationOptions};
use boardsim_core::soc::Board;
use boardsim_core::soc::board::STACK_BYTES_PER_CORE;
use boardsim_core::topology::{MemorySpec, TopologyBuilder};
use boardsim_core::RequirementValidator;

use crate::common::builder::instruction::counting_loop;
use crate::common::harness::{
    BoardHarness, MEMORY_BASE, cache, init_tracing, memory, processor, requirements,
};
use crate::common::mocks::provider::MockProvider;

/// Minimal little-endian RV64 executable with one loadable segment.
fn riscv_elf(entry: u64, vaddr: u64, code: &[u8]) -> Vec<u8> {
    const EHDR: u64 = 64;
    const PHDR: u64 = 56;
    let mut elf = Vec::new();
    elf.extend_from_slice(b"\x7fELF");
    elf.extend_from_slice(&[2, 1, 1, 0]);
    elf.extend_from_slice(&[0; 8]);
    elf.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    elf.extend_from_slice(&243u16.to_le_bytes()); // EM_RISCV
    elf.extend_from_slice(&1u32.to_le_bytes());
    elf.extend_from_slice(&entry.to_le_bytes());
    elf.extend_from_slice(&EHDR.to_le_bytes()); // e_phoff
    elf.extend_from_slice(&0u64.to_le_bytes()); // e_shoff
    elf.extend_from_slice(&0u32.to_le_bytes());
    elf.extend_from_slice(&(EHDR as u16).to_le_bytes());
    elf.extend_from_slice(&(PHDR as u16).to_le_bytes());
    elf.extend_from_slice(&1u16.to_le_bytes());
    elf.extend_from_slice(&64u16.to_le_bytes());
    elf.extend_from_slice(&0u16.to_le_bytes());
    elf.extend_from_slice(&0u16.to_le_bytes());

    elf.extend_from_slice(&1u32.to_le_bytes()); // PT_LOAD
    elf.extend_from_slice(&5u32.to_le_bytes()); // R+X
    elf.extend_from_slice(&(EHDR + PHDR).to_le_bytes());
    elf.extend_from_slice(&vaddr.to_le_bytes());
    elf.extend_from_slice(&vaddr.to_le_bytes());
    elf.extend_from_slice(&(code.len() as u64).to_le_bytes());
    elf.extend_from_slice(&(code.len() as u64).to_le_bytes());
    elf.extend_from_slice(&4u64.to_le_bytes());
    elf.extend_from_slice(code);
    elf
}

#[test]
fn flat_bytes_load_at_the_base() {
    let image = WorkloadImage::from_bytes("prog", vec![1, 2, 3, 4], MEMORY_BASE).unwrap();
    assert_eq!(image.entry, MEMORY_BASE);
    assert_eq!(
        image.segments,
        vec![Segment {
            addr: MEMORY_BASE,
            data: vec![1, 2, 3, 4],
        }]
    );
}

#[test]
fn empty_file_is_malformed() {
    assert!(matches!(
        WorkloadImage::from_bytes("empty", Vec::new(), MEMORY_BASE),
        Err(ResourceNotFoundError::Malformed { id, .. }) if id == "empty"
    ));
}

#[test]
fn elf_segments_and_entry_are_used() {
    let code = counting_loop(3).to_bytes();
    let elf = riscv_elf(MEMORY_BASE + 0x1000, MEMORY_BASE + 0x1000, &code);
    let image = WorkloadImage::from_bytes("loop.elf", elf, MEMORY_BASE).unwrap();
    assert_eq!(image.entry, MEMORY_BASE + 0x1000);
    assert_eq!(image.segments.len(), 1);
    assert_eq!(image.segments[0].addr, MEMORY_BASE + 0x1000);
    assert_eq!(image.segments[0].data, code);
}

#[test]
fn truncated_elf_is_malformed() {
    let mut bytes = b"\x7fELF".to_vec();
    bytes.extend_from_slice(&[2, 1, 1, 0, 0, 0]);
    assert!(matches!(
        WorkloadImage::from_bytes("broken", bytes, MEMORY_BASE),
        Err(ResourceNotFoundError::Malformed { .. })
    ));
}

#[test]
fn in_memory_provider_resolves_registered_ids() {
    let image = WorkloadImage {
        entry: MEMORY_BASE + 8,
        segments: vec![Segment {
            addr: MEMORY_BASE,
            data: vec![0; 16],
        }],
    };
    let provider = InMemoryProvider::new()
        .with_image("prebuilt", image.clone())
        .with_flat("raw", vec![0x13, 0, 0, 0]);

    assert_eq!(provider.resolve("prebuilt", 0).unwrap().image, image);
    assert_eq!(provider.resolve("raw", MEMORY_BASE).unwrap().image.entry, MEMORY_BASE);
    assert!(matches!(
        provider.resolve("riscv-hello", MEMORY_BASE),
        Err(ResourceNotFoundError::Unknown(id)) if id == "riscv-hello"
    ));
}

#[test]
fn directory_provider_reads_files_under_its_root() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("bin")).unwrap();
    fs::write(dir.path().join("bin/loop.bin"), counting_loop(2).to_bytes()).unwrap();
    fs::write(dir.path().join("empty.bin"), b"").unwrap();

    let provider = DirectoryProvider::new(dir.path());
    assert_eq!(provider.root(), dir.path());

    let resource = provider.resolve("bin/loop.bin", MEMORY_BASE).unwrap();
    assert_eq!(resource.id, "bin/loop.bin");
    assert_eq!(resource.image.entry, MEMORY_BASE);

    assert!(matches!(
        provider.resolve("bin/missing.bin", MEMORY_BASE),
        Err(ResourceNotFoundError::Unknown(_))
    ));
    assert!(matches!(
        provider.resolve("../loop.bin", MEMORY_BASE),
        Err(ResourceNotFoundError::Unknown(_))
    ));
    assert!(matches!(
        provider.resolve("bin", MEMORY_BASE),
        Err(ResourceNotFoundError::Unknown(_))
    ));
    assert!(matches!(
        provider.resolve("empty.bin", MEMORY_BASE),
        Err(ResourceNotFoundError::Malformed { .. })
    ));
}

#[test]
fn attaching_a_workload_resets_every_core_to_the_entry() {
    let harness = BoardHarness::new().cores(2);
    let mut board = harness.board();
    let entry = MEMORY_BASE + 0x40;

    let mut provider = MockProvider::new();
    provider
        .expect_resolve()
        .withf(|id, load_base| id == "riscv-hello" && *load_base == MEMORY_BASE)
        .times(1)
        .returning(move |id, _| {
            Ok(WorkloadResource {
                id: id.to_string(),
                image: WorkloadImage {
                    entry,
                    segments: vec![Segment {
                        addr: entry,
                        data: vec![0xAA; 8],
                    }],
                },
            })
        });

    board.set_workload(&provider, "riscv-hello").unwrap();
    assert_eq!(board.workload().map(|w| w.id.as_str()), Some("riscv-hello"));
    assert_eq!(board.memory().read(entry, 1), Some(0xAA));

    let top = MEMORY_BASE + board.memory().capacity();
    for (hart, slot) in board.processor().cores().iter().enumerate() {
        let state = slot.state();
        assert_eq!(state.pc, entry);
        assert_eq!(state.regs.read(REG_A0), hart as u64);
        assert_eq!(state.regs.read(REG_SP), top - hart as u64 * STACK_BYTES_PER_CORE);
        assert_eq!(state.instret, 0);
    }
}

#[test]
fn unresolvable_workload_leaves_board_unloaded() {
    let mut board = BoardHarness::new().board();
    let mut provider = MockProvider::new();
    provider
        .expect_resolve()
        .returning(|id, _| Err(ResourceNotFoundError::Unknown(id.to_string())));

    assert!(matches!(
        board.set_workload(&provider, "riscv-hello"),
        Err(ResourceNotFoundError::Unknown(id)) if id == "riscv-hello"
    ));
    assert!(board.workload().is_none());
}

#[test]
fn segment_outside_memory_is_rejected_before_loading() {
    let mut board = BoardHarness::new().board();
    let end = MEMORY_BASE + board.memory().capacity();
    let mut provider = MockProvider::new();
    provider.expect_resolve().returning(move |id, _| {
        Ok(WorkloadResource {
            id: id.to_string(),
            image: WorkloadImage {
                entry: MEMORY_BASE,
                segments: vec![
                    Segment {
                        addr: MEMORY_BASE,
                        data: vec![0x55; 4],
                    },
                    Segment {
                        addr: end - 2,
                        data: vec![0; 4],
                    },
                ],
            },
        })
    });

    assert!(matches!(
        board.set_workload(&provider, "oversized"),
        Err(ResourceNotFoundError::OutOfRange { addr, len: 4, .. }) if addr == end - 2
    ));
    assert!(board.workload().is_none());
    assert_eq!(board.memory().read(MEMORY_BASE, 1), Some(0));
}

#[test]
fn memory_ending_at_the_top_of_the_address_space_is_usable() {
    init_tracing();
    let base = 0u64.wrapping_sub(ByteSize::mib(16).bytes());
    let mut cpu = processor(2, CpuType::Timing, CpuType::O3);
    cpu.address_bits = 64;
    let validated = RequirementValidator::default()
        .validate(&requirements())
        .unwrap();
    let topology = TopologyBuilder::new(validated)
        .processor(cpu)
        .cache_hierarchy(cache(2))
        .memory(MemorySpec {
            channels: 1,
            base,
            ..memory()
        })
        .clock(Frequency::ghz(1))
        .build()
        .unwrap();
    let mut board = Board::new(topology).unwrap();

    let provider = InMemoryProvider::new().with_flat("top", counting_loop(3).to_bytes());
    board.set_workload(&provider, "top").unwrap();

    let mem = board.memory();
    assert!(mem.contains(u64::MAX, 1));
    assert!(mem.contains(base, ByteSize::mib(16).bytes()));
    assert!(!mem.contains(u64::MAX, 2));
    assert!(!mem.contains(base - 1, 1));
    assert_eq!(mem.read(u64::MAX - 7, 8), Some(0));
    let stacks: Vec<u64> = board
        .processor()
        .cores()
        .iter()
        .map(|slot| slot.state().regs.read(REG_SP))
        .collect();
    assert_eq!(
        stacks,
        [u64::MAX & !0xf, 0u64.wrapping_sub(STACK_BYTES_PER_CORE)]
    );

    let mut driver = SimulationDriver::new(board, SimulationOptions::default());
    let exit = driver.run_to_completion().unwrap();
    assert_eq!(exit.cause, ExitCause::WorkloadCompleted { code: 0 });
}

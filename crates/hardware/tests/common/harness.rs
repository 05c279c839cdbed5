use boardsim_core::common::units::{ByteSize, Frequency};
use boardsim_core::core::models::CpuType;
use boardsim_core::requires::{CoherenceProtocol, Isa, RequirementSpec, RequirementValidator};
use boardsim_core::sim::driver::{SimulationDriver, SimulationOptions};
use boardsim_core::sim::workload::InMemoryProvider;
use boardsim_core::soc::Board;
use boardsim_core::soc::memory::MemoryTiming;
use boardsim_core::topology::{
    CacheHierarchySpec, CacheSpec, MemorySpec, ProcessorSpec, Topology, TopologyBuilder,
};

use super::builder::instruction::Program;

pub const MEMORY_BASE: u64 = 0x8000_0000;

/// Installs a test-writer subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("warn")
        .try_init();
}

pub fn requirements() -> RequirementSpec {
    RequirementSpec::new(Isa::RiscV, CoherenceProtocol::MesiTwoLevel)
}

pub fn processor(cores: usize, starting: CpuType, switch: CpuType) -> ProcessorSpec {
    ProcessorSpec::new(Isa::RiscV, cores, starting, switch)
}

pub fn cache(banks: usize) -> CacheHierarchySpec {
    CacheHierarchySpec {
        protocol: CoherenceProtocol::MesiTwoLevel,
        l1i: CacheSpec::new(ByteSize::kib(4), 2, 1),
        l1d: CacheSpec::new(ByteSize::kib(4), 2, 1),
        l2: CacheSpec::new(ByteSize::kib(64), 8, 10),
        num_l2_banks: banks,
        line_bytes: 64,
    }
}

pub fn memory() -> MemorySpec {
    MemorySpec {
        timing: MemoryTiming::Ddr3_1600,
        capacity: ByteSize::mib(16),
        channels: 2,
        base: MEMORY_BASE,
    }
}

/// Small board shape with fast defaults.
pub struct BoardHarness {
    cores: usize,
    starting: CpuType,
    switch: CpuType,
    banks: usize,
    clock: Frequency,
}

impl Default for BoardHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardHarness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            cores: 2,
            starting: CpuType::Timing,
            switch: CpuType::O3,
            banks: 2,
            clock: Frequency::ghz(1),
        }
    }

    pub fn cores(mut self, cores: usize) -> Self {
        self.cores = cores;
        self
    }

    pub fn types(mut self, starting: CpuType, switch: CpuType) -> Self {
        self.starting = starting;
        self.switch = switch;
        self
    }

    pub fn banks(mut self, banks: usize) -> Self {
        self.banks = banks;
        self
    }

    pub fn topology(&self) -> Topology {
        let validated = RequirementValidator::default()
            .validate(&requirements())
            .unwrap();
        TopologyBuilder::new(validated)
            .processor(processor(self.cores, self.starting, self.switch))
            .cache_hierarchy(cache(self.banks))
            .memory(memory())
            .clock(self.clock)
            .build()
            .unwrap()
    }

    pub fn board(&self) -> Board {
        Board::new(self.topology()).unwrap()
    }

    /// Board with `program` attached as workload `"test"`.
    pub fn board_with(&self, program: &Program) -> Board {
        let mut board = self.board();
        let provider = InMemoryProvider::new().with_flat("test", program.to_bytes());
        board.set_workload(&provider, "test").unwrap();
        board
    }

    pub fn driver(&self, program: &Program) -> SimulationDriver {
        self.driver_with(program, SimulationOptions::default())
    }

    pub fn driver_with(&self, program: &Program, options: SimulationOptions) -> SimulationDriver {
        SimulationDriver::new(self.board_with(program), options)
    }
}

//! # Configuration Tests

use boardsim_core::common::error::ConfigurationError;
use boardsim_core::common::units::{ByteSize, Frequency};
use boardsim_core::config::Config;
use boardsim_core::core::models::CpuType;
use boardsim_core::requires::{CoherenceProtocol, RequirementValidator};
use boardsim_core::sim::PolicyConfig;
use boardsim_core::soc::memory::MemoryTiming;
use pretty_assertions::assert_eq;
use std::io::Write;

#[test]
fn empty_document_yields_defaults() {
    let config = Config::from_json_str("{}").unwrap();
    assert_eq!(config.processor.num_cores, 2);
    assert_eq!(config.processor.starting_core_type, CpuType::Timing);
    assert_eq!(config.processor.switch_core_type, CpuType::O3);
    assert_eq!(config.board.clk_freq, Frequency::ghz(3));
    assert_eq!(config.cache.l2_size, ByteSize::kib(256));
    assert_eq!(config.memory.timing, MemoryTiming::Ddr3_1600);
    assert_eq!(config.switching.policy, PolicyConfig::Manual);
    assert!(config.workload.resource.is_none());
}

#[test]
fn defaults_compose_a_valid_topology() {
    let topology = Config::default()
        .build_topology(&RequirementValidator::default())
        .unwrap();
    assert_eq!(topology.processor().num_cores, 2);
    assert_eq!(topology.clock().period(), 333);
}

#[test]
fn sections_map_onto_specs() {
    let config = Config::from_json_str(
        r#"{
            "requirements": { "coherence_protocol": "MOESI_CMP_directory" },
            "board": { "clk_freq": "1GHz" },
            "processor": { "num_cores": 4, "starting_core_type": "ATOMIC",
                           "switch_core_type": "MINOR", "address_bits": 40 },
            "cache": { "protocol": "MOESI_CMP_DIRECTORY", "l1d_size": "16KiB",
                       "l1d_assoc": 4, "num_l2_banks": 2, "l2_latency": 12 },
            "memory": { "timing": "DDR4_2400", "size": "1GiB", "channels": 2 },
            "workload": { "resource": "riscv-hello" },
            "switching": { "policy": { "kind": "after_instructions", "instructions": 500 } },
            "simulation": { "max_ticks": 1000000, "warmup_instructions": 20, "trace": true }
        }"#,
    )
    .unwrap();

    let processor = config.processor_spec();
    assert_eq!(processor.num_cores, 4);
    assert_eq!(processor.starting_core_type, CpuType::Atomic);
    assert_eq!(processor.switch_core_type, CpuType::Minor);
    assert_eq!(processor.address_bits, 40);

    let cache = config.cache_spec();
    assert_eq!(cache.protocol, CoherenceProtocol::MoesiCmpDirectory);
    assert_eq!(cache.l1d.size, ByteSize::kib(16));
    assert_eq!(cache.l1d.assoc, 4);
    assert_eq!(cache.l1i.size, ByteSize::kib(32));
    assert_eq!(cache.l2.latency, 12);
    assert_eq!(cache.num_l2_banks, 2);

    let memory = config.memory_spec();
    assert_eq!(memory.timing, MemoryTiming::Ddr4_2400);
    assert_eq!(memory.capacity, ByteSize::gib(1));
    assert_eq!(memory.base, 0x8000_0000);

    assert_eq!(config.workload.resource.as_deref(), Some("riscv-hello"));
    assert_eq!(
        config.switching.policy,
        PolicyConfig::AfterInstructions { instructions: 500 }
    );

    let options = config.simulation_options();
    assert_eq!(options.max_ticks, Some(1_000_000));
    assert_eq!(options.warmup_instructions, 20);
    assert!(options.trace);
    assert!(!options.checkpoint_on_exit);

    let topology = config
        .build_topology(&RequirementValidator::default())
        .unwrap();
    assert_eq!(topology.clock().period(), 1000);
}

#[test]
fn bad_size_literal_is_reported_verbatim() {
    let err = Config::from_json_str(r#"{ "cache": { "l2_size": "1 furlong" } }"#).unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::InvalidLiteral {
            kind: "size",
            literal: "1 furlong".to_string(),
        }
    );
}

#[test]
fn bad_frequency_literal_is_reported_verbatim() {
    let err = Config::from_json_str(r#"{ "board": { "clk_freq": "fast" } }"#).unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::InvalidLiteral {
            kind: "frequency",
            literal: "fast".to_string(),
        }
    );
}

#[test]
fn unknown_identifiers_are_parse_errors() {
    let err = Config::from_json_str(r#"{ "requirements": { "isa": "VAX" } }"#).unwrap_err();
    assert!(matches!(err, ConfigurationError::Parse(_)), "{err:?}");
}

#[test]
fn build_topology_surfaces_validator_errors_first() {
    let config = Config::from_json_str(
        r#"{ "requirements": { "coherence_protocol": "CHI" },
             "cache": { "num_l2_banks": 3 } }"#,
    )
    .unwrap();
    assert_eq!(
        config.build_topology(&RequirementValidator::default()),
        Err(ConfigurationError::UnsupportedProtocol(CoherenceProtocol::Chi))
    );
}

#[test]
fn from_file_reads_documents_and_reports_missing_files() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "processor": {{ "num_cores": 8 }} }}"#).unwrap();
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.processor.num_cores, 8);

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.json");
    assert!(matches!(
        Config::from_file(&missing),
        Err(ConfigurationError::Unreadable { path, .. }) if path == missing
    ));
}

#[test]
fn shipped_configuration_composes() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../configs/two_core_switch.json");
    let config = Config::from_file(&path).unwrap();

    let topology = config
        .build_topology(&RequirementValidator::default())
        .unwrap();

    assert_eq!(topology.cache().num_l2_banks, 2);
    assert_eq!(config.switching.policy, PolicyConfig::OnWorkBegin);
    assert_eq!(
        config.simulation_options().checkpoint_dir.as_deref(),
        Some(std::path::Path::new("m5out"))
    );
}

//! # Unit Conversion Tests

use boardsim_core::common::error::ConfigurationError;
use boardsim_core::common::units::{ByteSize, ClockDomain, Frequency};
use rstest::rstest;

#[rstest]
#[case("64", 64)]
#[case("32KiB", 32 * 1024)]
#[case("256kB", 256 * 1024)]
#[case("2 GiB", 2 << 30)]
#[case("512MB", 512 << 20)]
fn size_literals(#[case] text: &str, #[case] bytes: u64) {
    assert_eq!(text.parse::<ByteSize>().unwrap().bytes(), bytes);
}

#[rstest]
#[case("")]
#[case("KiB")]
#[case("12 parsecs")]
#[case("-4KiB")]
fn malformed_size_literals(#[case] text: &str) {
    assert_eq!(
        text.parse::<ByteSize>(),
        Err(ConfigurationError::InvalidLiteral {
            kind: "size",
            literal: text.to_string(),
        })
    );
}

#[rstest]
#[case("3GHz", 3_000_000_000)]
#[case("800 MHz", 800_000_000)]
#[case("100kHz", 100_000)]
#[case("1000", 1000)]
fn frequency_literals(#[case] text: &str, #[case] hz: u64) {
    assert_eq!(text.parse::<Frequency>().unwrap().hz(), hz);
}

#[test]
fn frequency_rejects_size_suffix() {
    assert!(matches!(
        "3GiB".parse::<Frequency>(),
        Err(ConfigurationError::InvalidLiteral { kind: "frequency", .. })
    ));
}

#[test]
fn display_picks_largest_exact_unit() {
    assert_eq!(ByteSize::kib(32).to_string(), "32KiB");
    assert_eq!(ByteSize::mib(2048).to_string(), "2GiB");
    assert_eq!(ByteSize(1000).to_string(), "1000B");
    assert_eq!(Frequency::ghz(3).to_string(), "3GHz");
    assert_eq!(Frequency::mhz(1500).to_string(), "1500MHz");
}

#[test]
fn sizes_deserialize_from_numbers_and_literals() {
    let sizes: Vec<ByteSize> = serde_json::from_str(r#"[4096, "4KiB"]"#).unwrap();
    assert_eq!(sizes[0], sizes[1]);
}

#[test]
fn clock_period_in_picoseconds() {
    assert_eq!(ClockDomain::new(Frequency::ghz(1)).unwrap().period(), 1000);
    assert_eq!(ClockDomain::new(Frequency::ghz(3)).unwrap().period(), 333);
    assert_eq!(ClockDomain::new(Frequency::mhz(800)).unwrap().period(), 1250);
}

#[test]
fn clock_converts_between_cycles_and_ticks() {
    let clock = ClockDomain::new(Frequency::ghz(2)).unwrap();
    assert_eq!(clock.cycles_to_ticks(10), 5000);
    assert_eq!(clock.ticks_to_cycles(5499), 10);
}

#[test]
fn zero_frequency_is_rejected() {
    assert_eq!(
        ClockDomain::new(Frequency(0)),
        Err(ConfigurationError::NonPositive("board clock frequency"))
    );
}

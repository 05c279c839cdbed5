//! Size, frequency, and time-base units.
//!
//! This module converts human-written configuration literals into machine units. It provides:
//! 1. **Sizes:** `ByteSize` accepts integers or literals such as `"32KiB"`, `"256kB"`, `"2GiB"`.
//! 2. **Frequencies:** `Frequency` accepts integers (Hz) or literals such as `"3GHz"`.
//! 3. **Time base:** One tick is one picosecond; `ClockDomain` converts ticks to cycles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ConfigurationError;

/// Simulated ticks per second (one tick is one picosecond).
pub const TICKS_PER_SECOND: u64 = 1_000_000_000_000;

/// Simulated time, in ticks.
pub type Tick = u64;

/// Raw form of a size or frequency as it appears in a configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    /// Plain integer in base units.
    Number(u64),
    /// Number followed by a unit suffix.
    Text(String),
}

/// A capacity in bytes.
///
/// Binary suffixes (`KiB`, `MiB`, `GiB`) are powers of 1024. Decimal-looking
/// suffixes (`kB`, `MB`, `GB`) are also treated as powers of 1024, matching how
/// simulator configurations conventionally write cache and DRAM sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Literal", into = "u64")]
pub struct ByteSize(pub u64);

impl ByteSize {
    /// Size in bytes.
    pub const fn bytes(self) -> u64 {
        self.0
    }

    /// Constructs a size of `n` KiB.
    pub const fn kib(n: u64) -> Self {
        Self(n * 1024)
    }

    /// Constructs a size of `n` MiB.
    pub const fn mib(n: u64) -> Self {
        Self(n * 1024 * 1024)
    }

    /// Constructs a size of `n` GiB.
    pub const fn gib(n: u64) -> Self {
        Self(n * 1024 * 1024 * 1024)
    }
}

impl FromStr for ByteSize {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigurationError::InvalidLiteral {
            kind: "size",
            literal: s.to_string(),
        };
        let (number, suffix) = split_literal(s).ok_or_else(invalid)?;
        let multiplier: u64 = match suffix.to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" | "kib" => 1 << 10,
            "m" | "mb" | "mib" => 1 << 20,
            "g" | "gb" | "gib" => 1 << 30,
            "t" | "tb" | "tib" => 1 << 40,
            _ => return Err(invalid()),
        };
        number.checked_mul(multiplier).map(Self).ok_or_else(invalid)
    }
}

impl TryFrom<Literal> for ByteSize {
    type Error = ConfigurationError;

    fn try_from(value: Literal) -> Result<Self, Self::Error> {
        match value {
            Literal::Number(n) => Ok(Self(n)),
            Literal::Text(s) => s.parse(),
        }
    }
}

impl From<ByteSize> for u64 {
    fn from(value: ByteSize) -> Self {
        value.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(&str, u64); 3] = [("GiB", 1 << 30), ("MiB", 1 << 20), ("KiB", 1 << 10)];
        for (name, scale) in UNITS {
            if self.0 >= scale && self.0 % scale == 0 {
                return write!(f, "{}{}", self.0 / scale, name);
            }
        }
        write!(f, "{}B", self.0)
    }
}

/// A clock frequency in hertz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Literal", into = "u64")]
pub struct Frequency(pub u64);

impl Frequency {
    /// Frequency in hertz.
    pub const fn hz(self) -> u64 {
        self.0
    }

    /// Constructs a frequency of `n` MHz.
    pub const fn mhz(n: u64) -> Self {
        Self(n * 1_000_000)
    }

    /// Constructs a frequency of `n` GHz.
    pub const fn ghz(n: u64) -> Self {
        Self(n * 1_000_000_000)
    }
}

impl FromStr for Frequency {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigurationError::InvalidLiteral {
            kind: "frequency",
            literal: s.to_string(),
        };
        let (number, suffix) = split_literal(s).ok_or_else(invalid)?;
        let multiplier: u64 = match suffix.to_ascii_lowercase().as_str() {
            "" | "hz" => 1,
            "khz" => 1_000,
            "mhz" => 1_000_000,
            "ghz" => 1_000_000_000,
            _ => return Err(invalid()),
        };
        number.checked_mul(multiplier).map(Self).ok_or_else(invalid)
    }
}

impl TryFrom<Literal> for Frequency {
    type Error = ConfigurationError;

    fn try_from(value: Literal) -> Result<Self, Self::Error> {
        match value {
            Literal::Number(n) => Ok(Self(n)),
            Literal::Text(s) => s.parse(),
        }
    }
}

impl From<Frequency> for u64 {
    fn from(value: Frequency) -> Self {
        value.0
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000_000_000 && self.0 % 1_000_000_000 == 0 {
            write!(f, "{}GHz", self.0 / 1_000_000_000)
        } else if self.0 >= 1_000_000 && self.0 % 1_000_000 == 0 {
            write!(f, "{}MHz", self.0 / 1_000_000)
        } else {
            write!(f, "{}Hz", self.0)
        }
    }
}

/// Splits `"32KiB"` into `(32, "KiB")`. Whitespace between the parts is allowed.
fn split_literal(s: &str) -> Option<(u64, &str)> {
    let s = s.trim();
    let digits_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    if digits_end == 0 {
        return None;
    }
    let number = s[..digits_end].parse().ok()?;
    Some((number, s[digits_end..].trim()))
}

/// Clock domain shared by every component on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockDomain {
    frequency: Frequency,
    period: Tick,
}

impl ClockDomain {
    /// Creates a clock domain; the period is rounded to the nearest tick.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::NonPositive` for a zero frequency or one so
    /// high that the period would round to zero ticks.
    pub fn new(frequency: Frequency) -> Result<Self, ConfigurationError> {
        let hz = frequency.hz();
        if hz == 0 {
            return Err(ConfigurationError::NonPositive("board clock frequency"));
        }
        let period = (TICKS_PER_SECOND + hz / 2) / hz;
        if period == 0 {
            return Err(ConfigurationError::NonPositive("board clock period"));
        }
        Ok(Self { frequency, period })
    }

    /// Configured frequency.
    pub const fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Clock period in ticks.
    pub const fn period(&self) -> Tick {
        self.period
    }

    /// Ticks spanned by `cycles` clock cycles.
    pub const fn cycles_to_ticks(&self, cycles: u64) -> Tick {
        cycles * self.period
    }

    /// Whole cycles elapsed in `ticks`.
    pub const fn ticks_to_cycles(&self, ticks: Tick) -> u64 {
        ticks / self.period
    }
}

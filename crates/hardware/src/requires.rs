//! Requirement validation.
//!
//! Every board starts from a `RequirementSpec` naming the ISA and coherence
//! protocol the configuration was written for. The validator checks the pair
//! against the set this build can execute before any component is constructed.
//! Success is witnessed by a `ValidatedRequirements` token, which is the only
//! way to obtain a `TopologyBuilder`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::error::ConfigurationError;

/// Instruction-set architecture identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Isa {
    /// x86-64.
    #[serde(alias = "x86")]
    X86,
    /// Arm AArch64.
    #[serde(alias = "arm")]
    Arm,
    /// RISC-V RV64.
    #[serde(alias = "RiscV", alias = "riscv")]
    RiscV,
    /// IBM POWER.
    Power,
    /// MIPS.
    Mips,
    /// SPARC.
    Sparc,
}

impl Isa {
    /// Every ISA identifier the configuration surface knows about.
    pub const ALL: [Self; 6] = [
        Self::X86,
        Self::Arm,
        Self::RiscV,
        Self::Power,
        Self::Mips,
        Self::Sparc,
    ];

    /// Canonical configuration name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::X86 => "X86",
            Self::Arm => "ARM",
            Self::RiscV => "RISCV",
            Self::Power => "POWER",
            Self::Mips => "MIPS",
            Self::Sparc => "SPARC",
        }
    }

    /// Default physical address width for cores of this ISA.
    pub const fn default_address_bits(self) -> u32 {
        match self {
            Self::X86 | Self::Arm | Self::Power => 48,
            Self::RiscV => 56,
            Self::Mips | Self::Sparc => 40,
        }
    }
}

impl fmt::Display for Isa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cache coherence protocol identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CoherenceProtocol {
    /// Two-level MESI with private L1s and a shared banked L2.
    #[serde(rename = "MESI_TWO_LEVEL", alias = "MESI_Two_Level")]
    MesiTwoLevel,
    /// Three-level MESI.
    #[serde(rename = "MESI_THREE_LEVEL", alias = "MESI_Three_Level")]
    MesiThreeLevel,
    /// Directory-based MOESI with a shared L2.
    #[serde(rename = "MOESI_CMP_DIRECTORY", alias = "MOESI_CMP_directory")]
    MoesiCmpDirectory,
    /// Broadcast MOESI (AMD Hammer style).
    #[serde(rename = "MOESI_HAMMER", alias = "MOESI_hammer")]
    MoesiHammer,
    /// Minimal MI example protocol.
    #[serde(rename = "MI_EXAMPLE", alias = "MI_example")]
    MiExample,
    /// Arm Coherent Hub Interface.
    #[serde(rename = "CHI")]
    Chi,
}

impl CoherenceProtocol {
    /// Every protocol identifier the configuration surface knows about.
    pub const ALL: [Self; 6] = [
        Self::MesiTwoLevel,
        Self::MesiThreeLevel,
        Self::MoesiCmpDirectory,
        Self::MoesiHammer,
        Self::MiExample,
        Self::Chi,
    ];

    /// Canonical configuration name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::MesiTwoLevel => "MESI_TWO_LEVEL",
            Self::MesiThreeLevel => "MESI_THREE_LEVEL",
            Self::MoesiCmpDirectory => "MOESI_CMP_DIRECTORY",
            Self::MoesiHammer => "MOESI_HAMMER",
            Self::MiExample => "MI_EXAMPLE",
            Self::Chi => "CHI",
        }
    }
}

impl fmt::Display for CoherenceProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// ISA and coherence protocol a configuration requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementSpec {
    /// Required ISA.
    pub isa: Isa,
    /// Required coherence protocol.
    pub coherence_protocol: CoherenceProtocol,
}

impl RequirementSpec {
    /// Creates a requirement spec.
    pub const fn new(isa: Isa, coherence_protocol: CoherenceProtocol) -> Self {
        Self {
            isa,
            coherence_protocol,
        }
    }
}

/// ISA/protocol pairs a build can execute.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SupportedSet {
    pairs: BTreeSet<(Isa, CoherenceProtocol)>,
}

impl SupportedSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The pairs this crate's core models and cache hierarchy implement.
    ///
    /// Only the RV64 executor exists, and the hierarchy is a private-L1 plus
    /// shared-banked-L2 organisation, which matches the two-level protocols.
    pub fn builtin() -> Self {
        Self::new()
            .with(Isa::RiscV, CoherenceProtocol::MesiTwoLevel)
            .with(Isa::RiscV, CoherenceProtocol::MoesiCmpDirectory)
    }

    /// Adds a supported pair.
    #[must_use]
    pub fn with(mut self, isa: Isa, protocol: CoherenceProtocol) -> Self {
        let _ = self.pairs.insert((isa, protocol));
        self
    }

    /// Whether any pair uses `isa`.
    pub fn supports_isa(&self, isa: Isa) -> bool {
        self.pairs.iter().any(|(i, _)| *i == isa)
    }

    /// Whether any pair uses `protocol`.
    pub fn supports_protocol(&self, protocol: CoherenceProtocol) -> bool {
        self.pairs.iter().any(|(_, p)| *p == protocol)
    }

    /// Whether the exact pair is supported.
    pub fn supports(&self, isa: Isa, protocol: CoherenceProtocol) -> bool {
        self.pairs.contains(&(isa, protocol))
    }
}

/// Proof that a `RequirementSpec` passed validation.
///
/// Only `RequirementValidator::validate` can create one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedRequirements(RequirementSpec);

impl ValidatedRequirements {
    /// The validated spec.
    pub const fn spec(&self) -> RequirementSpec {
        self.0
    }

    /// Required ISA.
    pub const fn isa(&self) -> Isa {
        self.0.isa
    }

    /// Required coherence protocol.
    pub const fn coherence_protocol(&self) -> CoherenceProtocol {
        self.0.coherence_protocol
    }
}

/// Gatekeeper run before any board component is constructed.
#[derive(Debug, Clone)]
pub struct RequirementValidator {
    supported: SupportedSet,
}

impl Default for RequirementValidator {
    fn default() -> Self {
        Self::new(SupportedSet::builtin())
    }
}

impl RequirementValidator {
    /// Creates a validator over an explicit supported set.
    pub const fn new(supported: SupportedSet) -> Self {
        Self { supported }
    }

    /// The set this validator checks against.
    pub const fn supported(&self) -> &SupportedSet {
        &self.supported
    }

    /// Validates a requirement spec.
    ///
    /// The ISA is checked first, then the protocol, then the exact pairing, so
    /// a spec with several problems always reports the same one.
    ///
    /// # Errors
    ///
    /// `UnsupportedIsa`, `UnsupportedProtocol`, or `UnsupportedCombination`.
    pub fn validate(
        &self,
        spec: &RequirementSpec,
    ) -> Result<ValidatedRequirements, ConfigurationError> {
        if !self.supported.supports_isa(spec.isa) {
            return Err(ConfigurationError::UnsupportedIsa(spec.isa));
        }
        if !self.supported.supports_protocol(spec.coherence_protocol) {
            return Err(ConfigurationError::UnsupportedProtocol(
                spec.coherence_protocol,
            ));
        }
        if !self.supported.supports(spec.isa, spec.coherence_protocol) {
            return Err(ConfigurationError::UnsupportedCombination {
                isa: spec.isa,
                protocol: spec.coherence_protocol,
            });
        }
        debug!(isa = %spec.isa, protocol = %spec.coherence_protocol, "requirements satisfied");
        Ok(ValidatedRequirements(*spec))
    }
}

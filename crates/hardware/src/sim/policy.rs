//! Switch trigger policies.
//!
//! A policy is polled after every retirement and names the cores the driver
//! should switch. Threshold policies fire once per core: they only select
//! cores that have not switched yet, so they keep no state of their own and
//! survive checkpoints unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::units::Tick;
use crate::core::exec::PseudoOp;
use crate::core::processor::{CoreSlot, SwitchableProcessor};

/// What a policy sees when it is polled.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    /// Current tick.
    pub tick: Tick,
    /// Core that just retired an instruction.
    pub core: usize,
    /// Pseudo-instruction that retired, if any.
    pub pseudo: Option<PseudoOp>,
    /// Processor state.
    pub processor: &'a SwitchableProcessor,
}

impl PolicyContext<'_> {
    fn unswitched(&self) -> impl Iterator<Item = (usize, &CoreSlot)> + '_ {
        self.processor.cores().iter().enumerate().filter(|(_, slot)| {
            slot.switch_count() == 0 && !slot.pending_switch() && !slot.state().halted()
        })
    }
}

/// Decides when cores change execution model.
pub trait SwitchPolicy: fmt::Debug {
    /// Cores to switch now.
    fn poll(&self, ctx: &PolicyContext<'_>) -> Vec<usize>;
}

/// Never switches; the caller drives every switch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Manual;

impl SwitchPolicy for Manual {
    fn poll(&self, _ctx: &PolicyContext<'_>) -> Vec<usize> {
        Vec::new()
    }
}

/// Switches every core once the clock reaches a tick.
#[derive(Debug, Clone, Copy)]
pub struct AtTick(pub Tick);

impl SwitchPolicy for AtTick {
    fn poll(&self, ctx: &PolicyContext<'_>) -> Vec<usize> {
        if ctx.tick < self.0 {
            return Vec::new();
        }
        ctx.unswitched().map(|(i, _)| i).collect()
    }
}

/// Switches each core once it has retired a number of instructions.
#[derive(Debug, Clone, Copy)]
pub struct AfterInstructions(pub u64);

impl SwitchPolicy for AfterInstructions {
    fn poll(&self, ctx: &PolicyContext<'_>) -> Vec<usize> {
        ctx.unswitched()
            .filter(|(_, slot)| slot.state().instret >= self.0)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Switches every core when any core retires `work_begin`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnWorkBegin;

impl SwitchPolicy for OnWorkBegin {
    fn poll(&self, ctx: &PolicyContext<'_>) -> Vec<usize> {
        if ctx.pseudo != Some(PseudoOp::WorkBegin) {
            return Vec::new();
        }
        ctx.unswitched().map(|(i, _)| i).collect()
    }
}

/// Switches the core that retired `switch_cpu`, every time it does.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnRequest;

impl SwitchPolicy for OnRequest {
    fn poll(&self, ctx: &PolicyContext<'_>) -> Vec<usize> {
        if ctx.pseudo == Some(PseudoOp::SwitchCpu) {
            vec![ctx.core]
        } else {
            Vec::new()
        }
    }
}

/// Configuration form of the built-in policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// `Manual`.
    #[default]
    Manual,
    /// `AtTick`.
    AtTick {
        /// Trigger tick.
        tick: Tick,
    },
    /// `AfterInstructions`.
    AfterInstructions {
        /// Per-core retired-instruction threshold.
        instructions: u64,
    },
    /// `OnWorkBegin`.
    OnWorkBegin,
    /// `OnRequest`.
    OnRequest,
}

impl PolicyConfig {
    /// Instantiates the policy.
    pub fn build(self) -> Box<dyn SwitchPolicy> {
        match self {
            Self::Manual => Box::new(Manual),
            Self::AtTick { tick } => Box::new(AtTick(tick)),
            Self::AfterInstructions { instructions } => Box::new(AfterInstructions(instructions)),
            Self::OnWorkBegin => Box::new(OnWorkBegin),
            Self::OnRequest => Box::new(OnRequest),
        }
    }
}

//! Switchable multi-core processor.
//!
//! Each core slot pairs a *starting* and a *switch* model type. Exactly one
//! of them is active and owns the core's architectural state; the other is a
//! bare type tag. A switch quiesces only the target core (its pending events
//! are invalidated by bumping the slot epoch), moves the state through a
//! neutral `CoreSnapshot`, and activates the other variant.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::error::{SimulationFault, SwitchError};
use crate::common::units::Tick;
use crate::core::exec::{DataPort, Executed};
use crate::core::models::{CpuType, ModelDispatch, Step};
use crate::core::state::{CoreSnapshot, CoreState};
use crate::topology::ProcessorSpec;

/// Which of the two variants is active in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveVariant {
    /// The configured starting model.
    Starting,
    /// The configured switch model.
    Switch,
}

impl ActiveVariant {
    /// The other variant.
    pub const fn other(self) -> Self {
        match self {
            Self::Starting => Self::Switch,
            Self::Switch => Self::Starting,
        }
    }
}

/// Result of a switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The core now runs on `to`.
    Switched {
        /// Type that was active.
        from: CpuType,
        /// Type that is now active.
        to: CpuType,
    },
    /// The core had an instruction in flight; the switch happens when it retires.
    Deferred,
}

/// One core of the processor.
#[derive(Debug, Clone)]
pub struct CoreSlot {
    engine: ModelDispatch,
    active: ActiveVariant,
    starting_type: CpuType,
    switch_type: CpuType,
    epoch: u64,
    pending_switch: bool,
    switch_count: u64,
    next_issue: Tick,
    halted_at: Option<Tick>,
}

impl CoreSlot {
    fn new(starting_type: CpuType, switch_type: CpuType, state: CoreState) -> Self {
        Self {
            engine: ModelDispatch::new(starting_type, state),
            active: ActiveVariant::Starting,
            starting_type,
            switch_type,
            epoch: 0,
            pending_switch: false,
            switch_count: 0,
            next_issue: 0,
            halted_at: None,
        }
    }

    /// Type of a variant in this slot.
    pub const fn type_of(&self, variant: ActiveVariant) -> CpuType {
        match variant {
            ActiveVariant::Starting => self.starting_type,
            ActiveVariant::Switch => self.switch_type,
        }
    }

    /// Active variant.
    pub const fn active(&self) -> ActiveVariant {
        self.active
    }

    /// Type of the active variant.
    pub const fn active_type(&self) -> CpuType {
        self.type_of(self.active)
    }

    /// Type tag of the dormant variant.
    pub const fn dormant_type(&self) -> CpuType {
        self.type_of(self.active.other())
    }

    /// Architectural state, held by the active variant.
    pub fn state(&self) -> &CoreState {
        self.engine.state()
    }

    /// Event epoch; events stamped with an older epoch are stale.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a deferred switch is waiting for the in-flight instruction.
    pub const fn pending_switch(&self) -> bool {
        self.pending_switch
    }

    /// Number of completed switches.
    pub const fn switch_count(&self) -> u64 {
        self.switch_count
    }

    /// Tick at which the core next issues.
    pub const fn next_issue(&self) -> Tick {
        self.next_issue
    }

    /// Tick at which the core halted.
    pub const fn halted_at(&self) -> Option<Tick> {
        self.halted_at
    }

    /// Whether an instruction is in flight.
    pub fn busy(&self) -> bool {
        self.engine.in_flight().is_some()
    }

    fn swap_variant(&mut self) -> Result<(CpuType, CpuType), SwitchError> {
        let from = self.active_type();
        let to = self.dormant_type();
        let snapshot = self.engine.state().snapshot();
        self.engine = ModelDispatch::from_snapshot(to, &snapshot)?;
        self.active = self.active.other();
        self.epoch += 1;
        self.switch_count += 1;
        self.pending_switch = false;
        Ok((from, to))
    }
}

/// Serializable image of a core slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotImage {
    /// Active variant.
    pub active: ActiveVariant,
    /// Architectural state.
    pub snapshot: CoreSnapshot,
    /// Instruction in flight on a detailed engine.
    pub in_flight: Option<Executed>,
    /// Event epoch.
    pub epoch: u64,
    /// Deferred switch flag.
    pub pending_switch: bool,
    /// Completed switches.
    pub switch_count: u64,
    /// Next issue tick.
    pub next_issue: Tick,
    /// Halt tick.
    pub halted_at: Option<Tick>,
}

/// Processor owning a fixed number of switchable cores.
#[derive(Debug, Clone)]
pub struct SwitchableProcessor {
    cores: Vec<CoreSlot>,
}

impl SwitchableProcessor {
    /// Creates the cores described by `spec`, each in reset state on its starting variant.
    pub fn new(spec: &ProcessorSpec) -> Self {
        let cores = (0..spec.num_cores)
            .map(|_| {
                CoreSlot::new(
                    spec.starting_core_type,
                    spec.switch_core_type,
                    CoreState::default(),
                )
            })
            .collect();
        Self { cores }
    }

    /// Number of cores.
    pub fn num_cores(&self) -> usize {
        self.cores.len()
    }

    /// Core slot `index`.
    pub fn core(&self, index: usize) -> Option<&CoreSlot> {
        self.cores.get(index)
    }

    /// All core slots.
    pub fn cores(&self) -> &[CoreSlot] {
        &self.cores
    }

    /// Whether every core has halted.
    pub fn all_halted(&self) -> bool {
        self.cores.iter().all(|c| c.state().halted())
    }

    /// Replaces every core's state, e.g. when a workload is attached.
    ///
    /// Cores return to their starting variant with fresh epochs.
    pub fn reset(&mut self, states: Vec<CoreState>) {
        for (slot, state) in self.cores.iter_mut().zip(states) {
            *slot = CoreSlot::new(slot.starting_type, slot.switch_type, state);
        }
    }

    /// Switches core `index` to its dormant variant.
    ///
    /// # Errors
    ///
    /// `NoSuchCore`, `IncompatiblePairing` when both variants share a type,
    /// `CoreHalted` once the core has exited, or `InvalidSnapshot`.
    pub fn switch_core_type(&mut self, index: usize) -> Result<SwitchOutcome, SwitchError> {
        let count = self.cores.len();
        let slot = self
            .cores
            .get_mut(index)
            .ok_or(SwitchError::NoSuchCore { index, count })?;
        if slot.starting_type == slot.switch_type {
            return Err(SwitchError::IncompatiblePairing {
                index,
                cpu_type: slot.starting_type,
            });
        }
        if slot.state().halted() {
            return Err(SwitchError::CoreHalted(index));
        }
        if slot.busy() {
            slot.pending_switch = true;
            debug!(core = index, "switch deferred until in-flight instruction retires");
            return Ok(SwitchOutcome::Deferred);
        }
        let (from, to) = slot.swap_variant()?;
        info!(core = index, %from, %to, "switched core type");
        Ok(SwitchOutcome::Switched { from, to })
    }

    /// Performs a deferred switch on `index` if one is pending and the core is idle.
    pub(crate) fn finish_deferred(
        &mut self,
        index: usize,
    ) -> Result<Option<SwitchOutcome>, SwitchError> {
        let Some(slot) = self.cores.get_mut(index) else {
            return Ok(None);
        };
        if !slot.pending_switch || slot.busy() {
            return Ok(None);
        }
        if slot.state().halted() {
            slot.pending_switch = false;
            return Ok(None);
        }
        let (from, to) = slot.swap_variant()?;
        info!(core = index, %from, %to, "switched core type after deferral");
        Ok(Some(SwitchOutcome::Switched { from, to }))
    }

    /// Issues on core `index`.
    pub(crate) fn step(
        &mut self,
        index: usize,
        port: &mut dyn DataPort,
    ) -> Result<Step, SimulationFault> {
        self.cores
            .get_mut(index)
            .ok_or(SimulationFault::StateLost(index))?
            .engine
            .step(index, port)
    }

    /// Retires the in-flight instruction on core `index`.
    pub(crate) fn complete(&mut self, index: usize) -> Result<Executed, SimulationFault> {
        self.cores
            .get_mut(index)
            .ok_or(SimulationFault::StateLost(index))?
            .engine
            .complete(index)
    }

    pub(crate) fn set_next_issue(&mut self, index: usize, tick: Tick) {
        if let Some(slot) = self.cores.get_mut(index) {
            slot.next_issue = tick;
        }
    }

    pub(crate) fn mark_halted(&mut self, index: usize, tick: Tick) {
        if let Some(slot) = self.cores.get_mut(index) {
            let _ = slot.halted_at.get_or_insert(tick);
            slot.pending_switch = false;
        }
    }

    /// Captures every slot for a checkpoint.
    pub fn images(&self) -> Vec<SlotImage> {
        self.cores
            .iter()
            .map(|slot| SlotImage {
                active: slot.active,
                snapshot: slot.state().snapshot(),
                in_flight: slot.engine.in_flight().copied(),
                epoch: slot.epoch,
                pending_switch: slot.pending_switch,
                switch_count: slot.switch_count,
                next_issue: slot.next_issue,
                halted_at: slot.halted_at,
            })
            .collect()
    }

    /// Restores every slot from checkpoint images.
    ///
    /// # Errors
    ///
    /// `InvalidSnapshot` if the image count differs from the core count or a
    /// snapshot is malformed.
    pub fn restore_images(&mut self, images: &[SlotImage]) -> Result<(), SwitchError> {
        if images.len() != self.cores.len() {
            return Err(SwitchError::InvalidSnapshot(format!(
                "checkpoint has {} cores, processor has {}",
                images.len(),
                self.cores.len()
            )));
        }
        for (slot, image) in self.cores.iter_mut().zip(images) {
            let cpu_type = slot.type_of(image.active);
            slot.engine = ModelDispatch::from_snapshot(cpu_type, &image.snapshot)?;
            slot.engine.set_in_flight(image.in_flight);
            slot.active = image.active;
            slot.epoch = image.epoch;
            slot.pending_switch = image.pending_switch;
            slot.switch_count = image.switch_count;
            slot.next_issue = image.next_issue;
            slot.halted_at = image.halted_at;
        }
        Ok(())
    }
}

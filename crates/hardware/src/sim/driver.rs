//! Simulation driver: owns the board and the event queue side by side.
//!
//! The driver is the only mutator of simulation state. It provides:
//! 1. **Lifecycle:** `Constructing → WarmingUp → Running → (Switching ⇄ Running)* → Halted`.
//! 2. **Dispatch:** One global queue ordered by `(tick, insertion sequence)`.
//! 3. **Switching:** Caller-driven `switch_core_type` plus a pluggable `SwitchPolicy`.
//! 4. **Exit events:** Workload pseudo-instructions pause `run`; exits and limits halt it.
//! 5. **Checkpoints:** Capture and restore of the complete simulator state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::common::error::{
    CheckpointError, ExitStatus, ResourceNotFoundError, SimError, SimulationFault, SwitchError,
};
use crate::common::units::Tick;
use crate::core::exec::{Effect, Executed, PseudoOp};
use crate::core::models::Step;
use crate::core::processor::SwitchOutcome;
use crate::sim::checkpoint::{CHECKPOINT_VERSION, Checkpoint};
use crate::sim::event::{EventKind, EventQueue, ScheduledEvent};
use crate::sim::policy::{Manual, PolicyContext, SwitchPolicy};
use crate::soc::Board;
use crate::stats::SimStats;

/// Driver lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimPhase {
    /// Board built, no event dispatched yet.
    Constructing,
    /// Dispatching; statistics are discarded when warm-up ends.
    WarmingUp,
    /// Dispatching the measured region.
    Running,
    /// A core switch is in progress.
    Switching,
    /// Finished; no further events are dispatched.
    Halted,
}

impl SimPhase {
    /// Phase name used in logs and errors.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Constructing => "Constructing",
            Self::WarmingUp => "WarmingUp",
            Self::Running => "Running",
            Self::Switching => "Switching",
            Self::Halted => "Halted",
        }
    }

    /// Whether events may be dispatched and cores switched.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::WarmingUp | Self::Running)
    }
}

impl fmt::Display for SimPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitCause {
    /// Every core executed its exit call; `code` is core 0's exit code.
    WorkloadCompleted {
        /// Exit code.
        code: u64,
    },
    /// A core executed the `exit` pseudo-instruction.
    PseudoExit {
        /// Issuing core.
        core: usize,
        /// Exit code.
        code: u64,
    },
    /// A core executed `work_begin`.
    WorkBegin {
        /// Issuing core.
        core: usize,
    },
    /// A core executed `work_end`.
    WorkEnd {
        /// Issuing core.
        core: usize,
    },
    /// A core executed `switch_cpu`.
    SwitchRequested {
        /// Issuing core.
        core: usize,
    },
    /// A core executed `checkpoint`.
    Checkpoint {
        /// Issuing core.
        core: usize,
    },
    /// The configured tick limit was reached.
    TickLimit,
    /// The cancel token was raised.
    Cancelled,
}

impl ExitCause {
    /// Whether the driver halts on this cause.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::WorkloadCompleted { .. } | Self::PseudoExit { .. } | Self::TickLimit | Self::Cancelled
        )
    }
}

/// An exit event handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitEvent {
    /// Tick at which the run stopped.
    pub tick: Tick,
    /// Reason.
    pub cause: ExitCause,
}

/// Driver-owned simulation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Current simulated tick.
    pub tick: Tick,
    /// Lifecycle phase.
    pub phase: SimPhase,
    /// Final status, set on halt.
    pub exit_status: Option<ExitStatus>,
    /// Last exit cause reported to the caller.
    pub exit_cause: Option<ExitCause>,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            tick: 0,
            phase: SimPhase::Constructing,
            exit_status: None,
            exit_cause: None,
        }
    }
}

/// Run limits and output options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationOptions {
    /// Halt once the next event would lie beyond this tick.
    pub max_ticks: Option<Tick>,
    /// Instructions (summed over cores) retired before statistics start.
    pub warmup_instructions: u64,
    /// Where checkpoints are written.
    pub checkpoint_dir: Option<PathBuf>,
    /// Write a checkpoint on every halt. It is taken just before the halt, so
    /// restoring it continues past the exit event (after `exit` the
    /// remaining cores keep running).
    pub checkpoint_on_exit: bool,
    /// Log every retirement at trace level.
    pub trace: bool,
}

/// Cooperative cancellation flag, observed between events.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a lowered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a halt.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a halt was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Top-level simulator: board plus event queue.
#[derive(Debug)]
pub struct SimulationDriver {
    board: Board,
    options: SimulationOptions,
    policy: Box<dyn SwitchPolicy>,
    queue: EventQueue,
    state: SimulationState,
    stats: SimStats,
    cancel: CancelToken,
}

impl SimulationDriver {
    /// Creates a driver in `Constructing` with the `Manual` policy.
    pub fn new(board: Board, options: SimulationOptions) -> Self {
        let stats = SimStats::new(board.processor().num_cores(), board.clock().period());
        Self {
            board,
            options,
            policy: Box::new(Manual),
            queue: EventQueue::new(),
            state: SimulationState::default(),
            stats,
            cancel: CancelToken::new(),
        }
    }

    /// Replaces the switch policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Box<dyn SwitchPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// A token that halts the run when raised.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Driver state.
    pub const fn state(&self) -> &SimulationState {
        &self.state
    }

    /// The board.
    pub const fn board(&self) -> &Board {
        &self.board
    }

    /// Mutable board access, only while `Constructing` (to attach a workload).
    pub fn board_mut(&mut self) -> Option<&mut Board> {
        (self.state.phase == SimPhase::Constructing).then_some(&mut self.board)
    }

    /// Run options.
    pub const fn options(&self) -> &SimulationOptions {
        &self.options
    }

    /// Statistics with hardware counters brought up to date.
    pub fn stats(&self) -> SimStats {
        let mut stats = self.stats.clone();
        stats.sync_hardware(&self.board, self.queue.now());
        stats
    }

    /// Dispatches events until an exit event.
    ///
    /// Non-terminal causes (`work_begin`, `work_end`, `switch_cpu`,
    /// `checkpoint`) leave the driver live so the caller can act and call
    /// `run` again. Calling `run` after a halt returns the final event.
    ///
    /// # Errors
    ///
    /// `ResourceNotFoundError::NoWorkload` if no workload is attached (the
    /// clock stays at zero), `SimulationFault` if dispatch detects an
    /// inconsistency (the driver halts).
    pub fn run(&mut self) -> Result<ExitEvent, SimError> {
        match self.state.phase {
            SimPhase::Constructing => self.start()?,
            SimPhase::Halted => {
                return Ok(ExitEvent {
                    tick: self.state.tick,
                    cause: self.state.exit_cause.unwrap_or(ExitCause::Cancelled),
                });
            }
            _ => {}
        }
        self.dispatch()
    }

    /// Calls `run` until a terminal exit event.
    ///
    /// # Errors
    ///
    /// As `run`.
    pub fn run_to_completion(&mut self) -> Result<ExitEvent, SimError> {
        loop {
            let event = self.run()?;
            if event.cause.is_terminal() {
                return Ok(event);
            }
        }
    }

    fn start(&mut self) -> Result<(), SimError> {
        if self.board.workload().is_none() {
            return Err(ResourceNotFoundError::NoWorkload.into());
        }
        for (core, slot) in self.board.processor().cores().iter().enumerate() {
            let _ = self.queue.schedule(
                0,
                EventKind::CoreTick {
                    core,
                    epoch: slot.epoch(),
                },
            )?;
        }
        let phase = if self.options.warmup_instructions > 0 {
            SimPhase::WarmingUp
        } else {
            SimPhase::Running
        };
        self.enter(phase);
        Ok(())
    }

    fn enter(&mut self, phase: SimPhase) {
        let from = self.state.phase;
        self.state.phase = phase;
        if matches!(phase, SimPhase::Switching) || matches!(from, SimPhase::Switching) {
            debug!(tick = self.queue.now(), %from, to = %phase, "phase transition");
        } else {
            info!(tick = self.queue.now(), %from, to = %phase, "phase transition");
        }
    }

    fn dispatch(&mut self) -> Result<ExitEvent, SimError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.halt(ExitCause::Cancelled));
            }
            if self.board.processor().all_halted() {
                let code = self.exit_code();
                return Ok(self.halt(ExitCause::WorkloadCompleted { code }));
            }
            let Some(next) = self.queue.peek_tick() else {
                let code = self.exit_code();
                return Ok(self.halt(ExitCause::WorkloadCompleted { code }));
            };
            if let Some(limit) = self.options.max_ticks.filter(|&limit| next > limit) {
                self.queue.advance_to(limit);
                return Ok(self.halt(ExitCause::TickLimit));
            }
            let event = match self.queue.pop() {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(fault) => return Err(self.fault(fault)),
            };
            self.state.tick = self.queue.now();
            match self.handle(event) {
                Ok(None) => {}
                Ok(Some(cause)) if cause.is_terminal() => return Ok(self.halt(cause)),
                Ok(Some(cause)) => return Ok(self.pause(cause)),
                Err(fault) => return Err(self.fault(fault)),
            }
        }
    }

    fn handle(&mut self, event: ScheduledEvent) -> Result<Option<ExitCause>, SimulationFault> {
        let core = event.kind.core();
        let slot = self
            .board
            .processor()
            .core(core)
            .ok_or(SimulationFault::StateLost(core))?;
        if slot.epoch() != event.kind.epoch() || slot.halted_at().is_some() {
            trace!(core, tick = event.tick, "dropping stale event");
            return Ok(None);
        }

        let now = self.queue.now();
        let period = self.board.clock().period();
        match event.kind {
            EventKind::CoreTick { epoch, .. } => match self.board.step_core(core)? {
                Step::Retired { executed, cycles } => {
                    self.stats.add_cycles(core, cycles);
                    self.retire(core, executed, now + cycles * period)
                }
                Step::Issued { cycles } => {
                    self.stats.add_cycles(core, cycles);
                    let done = now + cycles * period;
                    self.board.processor_mut().set_next_issue(core, done);
                    let _ = self
                        .queue
                        .schedule(done, EventKind::CoreComplete { core, epoch })?;
                    Ok(None)
                }
            },
            EventKind::CoreComplete { .. } => {
                let executed = self.board.complete_core(core)?;
                self.retire(core, executed, now)
            }
        }
    }

    fn retire(
        &mut self,
        core: usize,
        executed: Executed,
        next: Tick,
    ) -> Result<Option<ExitCause>, SimulationFault> {
        let now = self.queue.now();
        let variant = self
            .board
            .processor()
            .core(core)
            .ok_or(SimulationFault::StateLost(core))?
            .active();
        self.stats.record_retire(core, variant, &executed);
        if self.options.trace {
            trace!(
                core,
                tick = now,
                pc = format_args!("{:#x}", executed.pc),
                raw = format_args!("{:#010x}", executed.raw),
                "retired"
            );
        }

        let mut pseudo = None;
        let cause = match executed.effect {
            Effect::None => None,
            Effect::Halt(code) => {
                info!(core, code, tick = now, "core exited");
                self.board
                    .processor()
                    .all_halted()
                    .then(|| ExitCause::WorkloadCompleted {
                        code: self.exit_code(),
                    })
            }
            Effect::Pseudo(op) => {
                pseudo = Some(op);
                Some(match op {
                    PseudoOp::Exit(code) => ExitCause::PseudoExit { core, code },
                    PseudoOp::WorkBegin => ExitCause::WorkBegin { core },
                    PseudoOp::WorkEnd => ExitCause::WorkEnd { core },
                    PseudoOp::SwitchCpu => ExitCause::SwitchRequested { core },
                    PseudoOp::Checkpoint => ExitCause::Checkpoint { core },
                })
            }
        };

        let halted = self
            .board
            .processor()
            .core(core)
            .is_some_and(|slot| slot.state().halted());
        if halted {
            self.board.processor_mut().mark_halted(core, now);
        } else {
            self.board.processor_mut().set_next_issue(core, next);
            let deferred = self
                .board
                .processor_mut()
                .finish_deferred(core)
                .map_err(|source| SimulationFault::DeferredSwitch { core, source })?;
            if let Some(SwitchOutcome::Switched { .. }) = deferred {
                self.stats.record_switch(core);
            }
            let epoch = self
                .board
                .processor()
                .core(core)
                .ok_or(SimulationFault::StateLost(core))?
                .epoch();
            let _ = self
                .queue
                .schedule(next, EventKind::CoreTick { core, epoch })?;
        }

        if self.state.phase == SimPhase::WarmingUp {
            let retired: u64 = self
                .board
                .processor()
                .cores()
                .iter()
                .map(|slot| slot.state().instret)
                .sum();
            if retired >= self.options.warmup_instructions {
                self.end_warmup(now);
            }
        }

        if matches!(cause, Some(ExitCause::Checkpoint { .. })) {
            self.pseudo_checkpoint();
        }

        if !cause.is_some_and(ExitCause::is_terminal) {
            self.apply_policy(core, pseudo);
        }
        Ok(cause)
    }

    fn end_warmup(&mut self, tick: Tick) {
        self.stats.reset(tick);
        self.board.caches_mut().reset_counters();
        self.board.memory_mut().reset_counters();
        info!(tick, "warm-up complete, statistics reset");
        self.enter(SimPhase::Running);
    }

    fn apply_policy(&mut self, core: usize, pseudo: Option<PseudoOp>) {
        let targets = {
            let ctx = PolicyContext {
                tick: self.queue.now(),
                core,
                pseudo,
                processor: self.board.processor(),
            };
            self.policy.poll(&ctx)
        };
        for target in targets {
            if let Err(e) = self.switch_core_type(target) {
                warn!(core = target, error = %e, "policy switch rejected");
            }
        }
    }

    /// Switches core `index` to its dormant model.
    ///
    /// Only the target core is affected: its pending events are invalidated
    /// and it resumes at its next issue tick on the new model. A core with an
    /// instruction in flight switches when that instruction retires.
    ///
    /// # Errors
    ///
    /// `SwitchError::NotRunning` outside `WarmingUp`/`Running`, otherwise any
    /// `SwitchError` the processor reports. The simulation is unaffected by a
    /// rejected request.
    pub fn switch_core_type(&mut self, index: usize) -> Result<SwitchOutcome, SimError> {
        let phase = self.state.phase;
        if !phase.is_live() {
            return Err(SwitchError::NotRunning(phase.name()).into());
        }
        self.enter(SimPhase::Switching);
        let result = self.switch_and_resume(index);
        self.enter(phase);
        result
    }

    fn switch_and_resume(&mut self, index: usize) -> Result<SwitchOutcome, SimError> {
        let outcome = self.board.processor_mut().switch_core_type(index)?;
        if let SwitchOutcome::Switched { .. } = outcome {
            self.stats.record_switch(index);
            let slot = self
                .board
                .processor()
                .core(index)
                .ok_or(SimulationFault::StateLost(index))?;
            let tick = slot.next_issue().max(self.queue.now());
            let epoch = slot.epoch();
            let _ = self
                .queue
                .schedule(tick, EventKind::CoreTick { core: index, epoch })?;
        }
        Ok(outcome)
    }

    fn exit_code(&self) -> u64 {
        self.board
            .processor()
            .core(0)
            .and_then(|slot| slot.state().exit_code)
            .unwrap_or(0)
    }

    fn pause(&mut self, cause: ExitCause) -> ExitEvent {
        let tick = self.queue.now();
        self.state.tick = tick;
        self.state.exit_cause = Some(cause);
        info!(tick, ?cause, "exit event");
        ExitEvent { tick, cause }
    }

    fn halt(&mut self, cause: ExitCause) -> ExitEvent {
        let tick = self.queue.now();
        self.state.tick = tick;
        // Taken before the phase changes so that a restore resumes dispatch.
        if self.options.checkpoint_on_exit || cause == ExitCause::Cancelled {
            self.best_effort_checkpoint();
        }
        self.state.exit_cause = Some(cause);
        self.state.exit_status = Some(if cause == ExitCause::Cancelled {
            ExitStatus::Cancelled
        } else {
            ExitStatus::Completed
        });
        self.enter(SimPhase::Halted);
        self.stats.sync_hardware(&self.board, tick);
        info!(
            tick,
            ?cause,
            instructions = self.stats.total_instructions(),
            cycles = self.stats.total_cycles(),
            "simulation halted"
        );
        ExitEvent { tick, cause }
    }

    fn fault(&mut self, fault: SimulationFault) -> SimError {
        let tick = self.queue.now();
        self.state.tick = tick;
        self.state.exit_status = Some(ExitStatus::SimulationFault);
        self.enter(SimPhase::Halted);
        self.stats.sync_hardware(&self.board, tick);
        error!(tick, error = %fault, "simulation fault");
        self.best_effort_checkpoint();
        fault.into()
    }

    fn best_effort_checkpoint(&self) {
        let Some(dir) = self.options.checkpoint_dir.as_deref() else {
            return;
        };
        if let Err(e) = self.write_checkpoint(dir) {
            warn!(error = %e, "failed to write checkpoint");
        }
    }

    fn pseudo_checkpoint(&self) {
        if self.options.checkpoint_dir.is_none() {
            debug!("checkpoint requested but no checkpoint directory is configured");
        }
        self.best_effort_checkpoint();
    }

    /// Writes a checkpoint into `dir` and returns its path.
    ///
    /// # Errors
    ///
    /// `CheckpointError` if the directory or file cannot be written.
    pub fn write_checkpoint(&self, dir: &Path) -> Result<PathBuf, CheckpointError> {
        let path = self.checkpoint().save_in(dir)?;
        debug!(path = %path.display(), "checkpoint written");
        Ok(path)
    }

    /// Captures the complete simulator state.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            version: CHECKPOINT_VERSION,
            topology: self.board.topology().clone(),
            state: self.state.clone(),
            slots: self.board.processor().images(),
            memory: self.board.memory().image(),
            caches: self.board.caches().image(),
            queue: self.queue.image(),
            stats: self.stats.clone(),
        }
    }

    /// Rebuilds a driver from a checkpoint on a freshly built board.
    ///
    /// Checkpoints written on cancellation or with `checkpoint_on_exit` are
    /// captured while dispatch is still live, so `run` continues from where
    /// the original run stopped. A checkpoint written after a fault is
    /// already `Halted` and only reports its final state. The policy defaults
    /// to `Manual`; use `with_policy` to reinstall one.
    ///
    /// # Errors
    ///
    /// `CheckpointError::Incompatible` if the checkpoint was taken on a board
    /// with a different topology, before the run started (no workload state
    /// to resume), or its contents cannot be applied.
    pub fn restore(
        mut board: Board,
        checkpoint: Checkpoint,
        options: SimulationOptions,
    ) -> Result<Self, SimError> {
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::Incompatible(format!(
                "format version {}",
                checkpoint.version
            ))
            .into());
        }
        if checkpoint.state.phase == SimPhase::Constructing {
            return Err(CheckpointError::Incompatible(
                "checkpoint was taken before the run started".to_string(),
            )
            .into());
        }
        if board.topology() != &checkpoint.topology {
            return Err(CheckpointError::Incompatible(
                "checkpoint topology differs from the board".to_string(),
            )
            .into());
        }
        board
            .processor_mut()
            .restore_images(&checkpoint.slots)
            .map_err(|e| CheckpointError::Incompatible(e.to_string()))?;
        board.memory_mut().restore(checkpoint.memory)?;
        board.caches_mut().restore(checkpoint.caches)?;
        let queue = EventQueue::from_image(checkpoint.queue)
            .map_err(|e| CheckpointError::Incompatible(e.to_string()))?;

        info!(tick = checkpoint.state.tick, phase = %checkpoint.state.phase, "restored from checkpoint");
        Ok(Self {
            board,
            options,
            policy: Box::new(Manual),
            queue,
            state: checkpoint.state,
            stats: checkpoint.stats,
            cancel: CancelToken::new(),
        })
    }
}

//! Global event queue.
//!
//! Events are ordered by `(tick, insertion sequence)`, so events scheduled
//! for the same tick dispatch in the order they were scheduled. The queue
//! owns simulated time: popping an event advances `now` to its tick, and the
//! queue refuses both scheduling into the past and dispatching backwards.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::common::error::SimulationFault;
use crate::common::units::Tick;

/// What an event does when dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Core issues its next instruction.
    CoreTick {
        /// Target core.
        core: usize,
        /// Slot epoch when scheduled.
        epoch: u64,
    },
    /// Core retires its in-flight instruction.
    CoreComplete {
        /// Target core.
        core: usize,
        /// Slot epoch when scheduled.
        epoch: u64,
    },
}

impl EventKind {
    /// Core the event targets.
    pub const fn core(&self) -> usize {
        match *self {
            Self::CoreTick { core, .. } | Self::CoreComplete { core, .. } => core,
        }
    }

    /// Epoch the event was stamped with.
    pub const fn epoch(&self) -> u64 {
        match *self {
            Self::CoreTick { epoch, .. } | Self::CoreComplete { epoch, .. } => epoch,
        }
    }
}

/// An event with its dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// Dispatch tick.
    pub tick: Tick,
    /// Insertion sequence number, unique per queue.
    pub seq: u64,
    /// Payload.
    pub kind: EventKind,
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.tick, self.seq).cmp(&(other.tick, other.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Serializable queue contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueImage {
    /// Current tick.
    pub now: Tick,
    /// Next sequence number.
    pub next_seq: u64,
    /// Pending events in dispatch order.
    pub pending: Vec<ScheduledEvent>,
}

/// Min-heap of scheduled events plus the simulated clock.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<ScheduledEvent>>,
    next_seq: u64,
    now: Tick,
}

impl EventQueue {
    /// Empty queue at tick zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated tick.
    pub const fn now(&self) -> Tick {
        self.now
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Tick of the next event.
    pub fn peek_tick(&self) -> Option<Tick> {
        self.heap.peek().map(|Reverse(e)| e.tick)
    }

    /// Schedules `kind` at `tick`.
    ///
    /// # Errors
    ///
    /// `ScheduledInPast` if `tick` is earlier than the current tick.
    pub fn schedule(&mut self, tick: Tick, kind: EventKind) -> Result<u64, SimulationFault> {
        if tick < self.now {
            return Err(SimulationFault::ScheduledInPast {
                now: self.now,
                scheduled: tick,
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(ScheduledEvent { tick, seq, kind }));
        Ok(seq)
    }

    /// Removes the earliest event and advances the clock to it.
    ///
    /// # Errors
    ///
    /// `TimeOrdering` if the event is older than the current tick.
    pub fn pop(&mut self) -> Result<Option<ScheduledEvent>, SimulationFault> {
        let Some(Reverse(event)) = self.heap.pop() else {
            return Ok(None);
        };
        if event.tick < self.now {
            return Err(SimulationFault::TimeOrdering {
                previous: self.now,
                scheduled: event.tick,
            });
        }
        self.now = event.tick;
        Ok(Some(event))
    }

    /// Moves the clock forward without dispatching anything.
    pub fn advance_to(&mut self, tick: Tick) {
        self.now = self.now.max(tick);
    }

    /// Captures the queue.
    pub fn image(&self) -> QueueImage {
        let mut pending: Vec<ScheduledEvent> = self.heap.iter().map(|Reverse(e)| *e).collect();
        pending.sort();
        QueueImage {
            now: self.now,
            next_seq: self.next_seq,
            pending,
        }
    }

    /// Rebuilds a queue from an image.
    ///
    /// # Errors
    ///
    /// `ScheduledInPast` if an image event predates the image clock.
    pub fn from_image(image: QueueImage) -> Result<Self, SimulationFault> {
        let mut queue = Self {
            heap: BinaryHeap::with_capacity(image.pending.len()),
            next_seq: image.next_seq,
            now: image.now,
        };
        for event in image.pending {
            if event.tick < image.now {
                return Err(SimulationFault::ScheduledInPast {
                    now: image.now,
                    scheduled: event.tick,
                });
            }
            queue.next_seq = queue.next_seq.max(event.seq + 1);
            queue.heap.push(Reverse(event));
        }
        Ok(queue)
    }
}

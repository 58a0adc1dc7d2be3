//! Contains the [`RendezvousState`] shared by the sender, the receiver and the
//! interrupt handler, and the [`Fault`]s they report.
//!
//! Each round has exactly one writer per field: the sender (or the interrupt
//! handler) arms the flag and stores `start`, then the receiver reads `start`
//! and disarms the flag. There is no lock. The scheduler's promise that a
//! waiting task is not resumed before its signal is what orders the
//! accesses; the flag checks catch it when that promise is broken.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use crate::console::{Console, print};
use crate::kernel::{Primitive, SignalError};

/// One measured sequence of rounds
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Plain yield between the two tasks
    Yield,
    /// A primitive signalled by the sender task
    Task(Primitive),
    /// A primitive signalled by the periodic interrupt
    Isr(Primitive),
    /// Randomised allocate/free sequences
    MemPool,
}

impl Phase {
    /// Report label for this phase
    pub const fn label(self) -> &'static str {
        match self {
            Phase::Yield => "Yield",
            Phase::Task(primitive) => primitive.label(),
            Phase::Isr(primitive) => primitive.isr_label(),
            Phase::MemPool => "Memory allocation/free pair",
        }
    }

    /// The primitive this phase signals, if any
    pub const fn primitive(self) -> Option<Primitive> {
        match self {
            Phase::Task(primitive) | Phase::Isr(primitive) => Some(primitive),
            Phase::Yield | Phase::MemPool => None,
        }
    }
}

/// Something went wrong, but measurement carries on
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// The sender found the flag still armed: the last stimulus was not seen
    SenderHandoff {
        /// What was being measured
        phase: Phase,
        /// Round the sender was starting
        round: u32,
    },
    /// The receiver woke up with the flag disarmed
    ReceiverHandoff {
        /// What was being measured
        phase: Phase,
        /// Round the receiver was finishing
        round: u32,
        /// Sample the sender left
        start: u16,
        /// Sample the receiver took
        end: u16,
    },
    /// The interrupt fired again before the receiver consumed the last event
    InterruptReentered,
    /// A signal sent from the interrupt was refused
    IsrSignal {
        /// What the interrupt was signalling
        primitive: Primitive,
        /// Why it was refused
        error: SignalError,
    },
    /// A signal sent from the sender task was refused
    TaskSignal {
        /// What the sender was signalling
        primitive: Primitive,
        /// Round the sender was on
        round: u32,
        /// Why it was refused
        error: SignalError,
    },
    /// One of the first four stress test allocations came back empty. The
    /// pool is meant to always have room for these.
    GuaranteedAllocation {
        /// Round of the stress test
        round: u32,
        /// Position in the allocation order, `0..4`
        order: u8,
        /// Bytes requested
        size: u32,
    },
    /// One of the last four stress test allocations came back empty, which
    /// fragmentation can cause
    Allocation {
        /// Round of the stress test
        round: u32,
        /// Position in the allocation order, `0..8`
        order: u8,
        /// Bytes requested
        size: u32,
    },
}

impl core::fmt::Display for Fault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Fault::SenderHandoff { phase, round } => {
                write!(f, "{} error in sender @ round {}.", phase.label(), round)
            }
            Fault::ReceiverHandoff {
                phase,
                round,
                start,
                end,
            } => {
                write!(
                    f,
                    "{} error in receiver @ round {}, {}, {}.",
                    phase.label(),
                    round,
                    start,
                    end
                )
            }
            Fault::InterruptReentered => write!(f, "Interrupt reentered."),
            Fault::IsrSignal { primitive, error } => {
                write!(f, "{} from ISR failed: {}.", primitive.label(), error)
            }
            Fault::TaskSignal {
                primitive,
                round,
                error,
            } => {
                write!(
                    f,
                    "{} signal failed @ round {}: {}.",
                    primitive.label(),
                    round,
                    error
                )
            }
            Fault::GuaranteedAllocation { round, order, size } => {
                write!(
                    f,
                    "Allocation invariant broken @ round {round}, order {order}, {size} bytes."
                )
            }
            Fault::Allocation { round, order, size } => {
                write!(
                    f,
                    "Allocation failure @ round {round}, order {order}, {size} bytes."
                )
            }
        }
    }
}

/// Everything the sender (or interrupt) and the receiver share
pub struct RendezvousState {
    /// Armed by whoever issues a stimulus, disarmed by the receiver
    flip: AtomicBool,
    /// Counter sample taken just before the stimulus
    start: AtomicU16,
    /// How many faults have been reported
    faults: AtomicU32,
}

impl RendezvousState {
    /// Make a disarmed state with no faults
    pub const fn new() -> RendezvousState {
        RendezvousState {
            flip: AtomicBool::new(false),
            start: AtomicU16::new(0),
            faults: AtomicU32::new(0),
        }
    }

    /// Arm the flag ahead of a stimulus
    ///
    /// Returns `false` if it was already armed, meaning the previous round's
    /// handoff never completed.
    pub fn arm(&self) -> bool {
        // Single writer, so no read-modify-write needed (Armv6-M has none)
        let was_armed = self.flip.load(Ordering::Acquire);
        self.flip.store(true, Ordering::Release);
        !was_armed
    }

    /// Disarm the flag once a stimulus has been observed
    ///
    /// Returns `false` if it was not armed, meaning we woke up without the
    /// stimulus having been issued.
    pub fn disarm(&self) -> bool {
        let was_armed = self.flip.load(Ordering::Acquire);
        self.flip.store(false, Ordering::Release);
        was_armed
    }

    /// Is the flag armed right now?
    pub fn is_armed(&self) -> bool {
        self.flip.load(Ordering::Acquire)
    }

    /// Publish the sample taken just before a stimulus
    pub fn set_start(&self, start: u16) {
        self.start.store(start, Ordering::Release);
    }

    /// Get the sample taken just before the last stimulus
    pub fn start(&self) -> u16 {
        self.start.load(Ordering::Acquire)
    }

    /// How many faults have been reported so far
    pub fn faults(&self) -> u32 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Report a fault on the console and the log, and count it
    pub fn fault<O>(&self, console: &O, fault: Fault)
    where
        O: Console + ?Sized,
    {
        warn!("fault: {}", fault);
        print(console, format_args!("{fault}\r\n"));

        #[cfg(not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base")))]
        self.faults.fetch_add(1, Ordering::Relaxed);

        #[cfg(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base"))]
        cortex_m::interrupt::free(|_| {
            self.faults.store(
                self.faults.load(Ordering::Relaxed).wrapping_add(1),
                Ordering::Relaxed,
            );
        });
    }
}

impl Default for RendezvousState {
    fn default() -> Self {
        RendezvousState::new()
    }
}


// End of File

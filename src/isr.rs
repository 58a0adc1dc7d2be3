//! Contains the [`IsrDriver`], which plays the sender during the interrupt
//! tests

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::console::Console;
use crate::harness::Harness;
use crate::kernel::{InterruptSource, IsrKernel, Primitive};
use crate::rendezvous::Fault;
use crate::timer::CycleCounter;

/// Counts interrupts and decides what each one signals
///
/// The first `rounds` interrupts send notifications, the next `rounds` give
/// the semaphore, the next `rounds` send messages, and the one after that
/// switches the interrupt off. Put one in a `static` and call
/// [`IsrDriver::on_interrupt`] from the interrupt handler.
///
/// Only the interrupt handler changes it, so the count is a plain
/// load/store.
#[derive(Debug)]
pub struct IsrDriver {
    fired: AtomicU32,
    finished: AtomicBool,
}

impl IsrDriver {
    /// Make a driver which has not seen any interrupts
    pub const fn new() -> IsrDriver {
        IsrDriver {
            fired: AtomicU32::new(0),
            finished: AtomicBool::new(false),
        }
    }

    /// Handle one interrupt
    ///
    /// The receiver must have enabled `irq` and be waiting on the primitive
    /// for the current phase.
    pub fn on_interrupt<C, O, K, I>(&self, harness: &Harness<'_, C, O>, kernel: &K, irq: &I)
    where
        C: CycleCounter + ?Sized,
        O: Console + ?Sized,
        K: IsrKernel + ?Sized,
        I: InterruptSource + ?Sized,
    {
        let fired = self.fired.load(Ordering::Relaxed);
        let Some(primitive) = phase_of(fired, harness.config.rounds) else {
            irq.disable();
            if !self.finished.load(Ordering::Relaxed) {
                self.finished.store(true, Ordering::Relaxed);
                debug!("interrupt tests finished after {} interrupts", fired);
            }
            return;
        };

        if !harness.state.arm() {
            harness
                .state
                .fault(harness.console, Fault::InterruptReentered);
        }
        self.fired.store(fired + 1, Ordering::Relaxed);

        harness.state.set_start(harness.counter.read());
        match primitive.signal_from_isr(kernel) {
            Ok(wake) => kernel.yield_from_isr(wake),
            Err(error) => harness
                .state
                .fault(harness.console, Fault::IsrSignal { primitive, error }),
        }
    }

    /// How many interrupts have sent a signal
    pub fn fired(&self) -> u32 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Has the driver switched the interrupt off?
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    /// Which primitive the next interrupt will signal, if any
    pub fn next_primitive(&self, rounds: u32) -> Option<Primitive> {
        phase_of(self.fired(), rounds)
    }
}

impl Default for IsrDriver {
    fn default() -> Self {
        IsrDriver::new()
    }
}

fn phase_of(fired: u32, rounds: u32) -> Option<Primitive> {
    let phase = usize::try_from(fired.checked_div(rounds)?).ok()?;
    Primitive::ALL.get(phase).copied()
}


// End of File

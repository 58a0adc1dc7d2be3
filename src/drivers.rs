//! The measurement loops run by the sender and the receiver tasks
//!
//! Each round, the sender arms the flag, samples the counter and issues a
//! stimulus. The receiver samples the counter as soon as it is resumed,
//! records the distance, and disarms the flag.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::console::Console;
use crate::harness::Harness;
use crate::kernel::{Kernel, Primitive};
use crate::rendezvous::{Fault, Phase};
use crate::stats::Accumulator;
use crate::timer::CycleCounter;

/// Sender half of the yield test
pub(crate) fn send_yield<C, O, K>(harness: &Harness<'_, C, O>, kernel: &K)
where
    C: CycleCounter + ?Sized,
    O: Console + ?Sized,
    K: Kernel + ?Sized,
{
    for round in 0..harness.config.rounds {
        stimulus_begins(harness, Phase::Yield, round);
        kernel.yield_now();
    }
}

/// Sender half of a task-to-task signal test
pub(crate) fn send_signal<C, O, K>(harness: &Harness<'_, C, O>, kernel: &K, primitive: Primitive)
where
    C: CycleCounter + ?Sized,
    O: Console + ?Sized,
    K: Kernel + ?Sized,
{
    for round in 0..harness.config.rounds {
        stimulus_begins(harness, Phase::Task(primitive), round);
        // The receiver outranks us, so it has run by the time this returns
        if let Err(error) = primitive.signal(kernel) {
            harness.state.fault(
                harness.console,
                Fault::TaskSignal {
                    primitive,
                    round,
                    error,
                },
            );
        }
    }
}

/// Receiver half of any test
///
/// Once per round, waits on the phase's primitive, or yields if it has none.
pub(crate) fn receive<C, O, K>(
    harness: &Harness<'_, C, O>,
    kernel: &K,
    phase: Phase,
    acc: &mut Accumulator,
) where
    C: CycleCounter + ?Sized,
    O: Console + ?Sized,
    K: Kernel + ?Sized,
{
    acc.reset();
    for round in 0..harness.config.rounds {
        match phase.primitive() {
            Some(primitive) => primitive.wait(kernel),
            None => kernel.yield_now(),
        }
        let end = harness.counter.read();
        let start = harness.state.start();
        acc.record(start, end);
        if !harness.state.disarm() {
            harness.state.fault(
                harness.console,
                Fault::ReceiverHandoff {
                    phase,
                    round,
                    start,
                    end,
                },
            );
        }
    }
}

/// Arm the flag and publish the start sample, complaining if the flag is
/// still armed from last time
fn stimulus_begins<C, O>(harness: &Harness<'_, C, O>, phase: Phase, round: u32)
where
    C: CycleCounter + ?Sized,
    O: Console + ?Sized,
{
    if !harness.state.arm() {
        harness
            .state
            .fault(harness.console, Fault::SenderHandoff { phase, round });
    }
    // Sample last, so the arming is not part of what we measure
    harness.state.set_start(harness.counter.read());
}

// End of File

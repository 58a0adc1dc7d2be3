//! Contains the [`Harness`], which runs the benchmark on the two tasks
//!
//! The port creates the kernel objects, then starts two tasks: the sender
//! (at [`SENDER_INITIAL_PRIORITY`](crate::config::SENDER_INITIAL_PRIORITY))
//! calls [`Harness::sender`] and the receiver (at
//! [`RECEIVER_INITIAL_PRIORITY`](crate::config::RECEIVER_INITIAL_PRIORITY))
//! calls [`Harness::receiver`]. The periodic interrupt calls
//! [`IsrDriver::on_interrupt`](crate::IsrDriver::on_interrupt) with the same
//! harness.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::config::{Config, OVERFLOW_NUM, RECEIVER_PRIORITY, SENDER_PRIORITY};
use crate::console::{Console, print};
use crate::drivers;
use crate::kernel::{InterruptSource, Kernel, Primitive, Role};
use crate::monitor::OverflowMonitor;
use crate::rendezvous::{Phase, RendezvousState};
use crate::stats::{Accumulator, LABEL_WIDTH, Report, Stats};
use crate::timer::CycleCounter;

#[cfg(feature = "mem-pool")]
use crate::mempool::{self, Pool};

/// Printed before the report
const SEPARATOR: &str = "====================================================\r\n";

/// Lines in a complete report
pub const REPORT_LINES: usize = 8;

/// Why the benchmark stopped early
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BenchError {
    /// The large allocation after a stress test round failed, so the pool
    /// leaked or fragmented
    PoolExhausted {
        /// The round that failed, counting from zero
        round: u32,
    },
}

impl core::fmt::Display for BenchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BenchError::PoolExhausted { round } => {
                write!(f, "memory pool exhausted in round {round}")
            }
        }
    }
}

/// Everything the receiver measured
#[derive(Debug, Clone, Default)]
pub struct Summary {
    reports: heapless::Vec<Report, REPORT_LINES>,
    faults: u32,
}

impl Summary {
    /// Every report line, in the order they were printed
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Look up the results for one label
    pub fn get(&self, label: &str) -> Option<Stats> {
        self.reports
            .iter()
            .find(|report| report.label == label)
            .map(|report| report.stats)
    }

    /// Faults reported during the whole run
    pub fn faults(&self) -> u32 {
        self.faults
    }
}

/// The shared pieces of the benchmark
///
/// Cheap to make, and `const`, so it can live in a `static` where the
/// interrupt handler can see it.
pub struct Harness<'a, C: ?Sized, O: ?Sized> {
    pub(crate) config: Config,
    pub(crate) state: &'a RendezvousState,
    pub(crate) counter: &'a C,
    pub(crate) console: &'a O,
}

impl<'a, C, O> Harness<'a, C, O>
where
    C: CycleCounter + ?Sized,
    O: Console + ?Sized,
{
    /// Bundle up the benchmark's shared pieces
    pub const fn new(
        config: Config,
        state: &'a RendezvousState,
        counter: &'a C,
        console: &'a O,
    ) -> Harness<'a, C, O> {
        Harness {
            config,
            state,
            counter,
            console,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the shared rendezvous state
    pub fn state(&self) -> &RendezvousState {
        self.state
    }

    /// Body of the sender task
    ///
    /// Prints the report header, then issues every stimulus for the yield
    /// test and the three task-to-task tests. Returns once it has nothing
    /// left to send, before the interrupt tests start. Most kernels fault
    /// when a task function returns, so the port must delete or suspend the
    /// sender task after this.
    pub fn sender<K>(&self, kernel: &K)
    where
        K: Kernel + ?Sized,
    {
        print(self.console, format_args!("{SEPARATOR}"));
        print(
            self.console,
            format_args!(
                "{:<width$} : AVG / MAX / MIN\r\n",
                "Test (number in CPU cycles)",
                width = LABEL_WIDTH
            ),
        );
        info!("sender starting, {} rounds", self.config.rounds);

        // Now equal with the receiver, which gets to run
        kernel.set_priority(Role::Sender, SENDER_PRIORITY);
        drivers::send_yield(self, kernel);

        // The receiver does this too, but it might be blocked by now
        kernel.set_priority(Role::Receiver, RECEIVER_PRIORITY);
        for primitive in Primitive::ALL {
            debug!("sending {}", primitive);
            drivers::send_signal(self, kernel, primitive);
        }
        info!("sender finished");
    }

    /// Body of the receiver task, without the allocator stress test
    ///
    /// `irq` is the periodic interrupt, which must be disabled until now.
    /// Returns the results if
    /// [`exit_after_benchmark`](Config::exit_after_benchmark) is set,
    /// otherwise parks in the overflow monitor.
    pub fn receiver<K, I>(&self, kernel: &K, irq: &I) -> Result<Summary, BenchError>
    where
        K: Kernel + ?Sized,
        I: InterruptSource + ?Sized,
    {
        self.receive(kernel, irq, |_| Ok(None), |_, _| {})
    }

    /// Body of the receiver task, including the allocator stress test
    ///
    /// As [`Harness::receiver`], but stops with
    /// [`BenchError::PoolExhausted`] if the pool stops being able to satisfy
    /// its large allocation.
    #[cfg(feature = "mem-pool")]
    pub fn receiver_with_pool<K, I, P>(
        &self,
        kernel: &K,
        irq: &I,
        pool: &P,
    ) -> Result<Summary, BenchError>
    where
        K: Kernel + ?Sized,
        I: InterruptSource + ?Sized,
        P: Pool + ?Sized,
    {
        self.receive(
            kernel,
            irq,
            |acc| mempool::stress(self, pool, acc).map(Some),
            |_, _| {},
        )
    }

    /// Watch for counter overflows, forever
    ///
    /// Use this as the idle loop once the benchmark is over.
    pub fn park(&self) -> ! {
        info!("benchmark over, watching the counter");
        let mut monitor = OverflowMonitor::new(self.counter.read(), OVERFLOW_NUM);
        loop {
            if let Some(count) = monitor.poll(self.counter.read()) {
                print(self.console, format_args!("{count} overflows\r\n"));
            }
        }
    }

    /// Run every receiver phase in order
    ///
    /// `measured` sees each phase's results the moment they are taken,
    /// before anything else runs.
    fn receive<K, I, F, M>(
        &self,
        kernel: &K,
        irq: &I,
        mem_test: F,
        mut measured: M,
    ) -> Result<Summary, BenchError>
    where
        K: Kernel + ?Sized,
        I: InterruptSource + ?Sized,
        F: FnOnce(&mut Accumulator) -> Result<Option<Stats>, BenchError>,
        M: FnMut(Phase, Stats),
    {
        let mut summary = Summary::default();
        let mut acc = Accumulator::new(self.config.rounds);

        drivers::receive(self, kernel, Phase::Yield, &mut acc);
        measured(Phase::Yield, acc.snapshot());
        self.publish(&mut summary, Phase::Yield, acc.snapshot());

        // From here on every signal preempts the sender
        kernel.set_priority(Role::Receiver, RECEIVER_PRIORITY);
        for primitive in Primitive::ALL {
            let phase = Phase::Task(primitive);
            drivers::receive(self, kernel, phase, &mut acc);
            measured(phase, acc.snapshot());
            self.publish(&mut summary, phase, acc.snapshot());
        }

        if let Some(stats) = mem_test(&mut acc)? {
            measured(Phase::MemPool, stats);
            self.publish(&mut summary, Phase::MemPool, stats);
        }

        // Printing between phases would delay the next interrupt's victim,
        // so hold the results until all three are done
        let mut deferred = [Stats::empty(self.config.rounds); Primitive::ALL.len()];
        irq.enable();
        for primitive in Primitive::ALL {
            drivers::receive(self, kernel, Phase::Isr(primitive), &mut acc);
            deferred[primitive.index()] = acc.snapshot();
            measured(Phase::Isr(primitive), acc.snapshot());
        }
        for primitive in Primitive::ALL {
            self.publish(
                &mut summary,
                Phase::Isr(primitive),
                deferred[primitive.index()],
            );
        }

        summary.faults = self.state.faults();
        info!("receiver finished with {} faults", summary.faults);
        if !self.config.exit_after_benchmark {
            self.park();
        }
        Ok(summary)
    }

    /// Print a report line and keep a copy
    fn publish(&self, summary: &mut Summary, phase: Phase, stats: Stats) {
        let report = Report {
            label: phase.label(),
            stats,
        };
        debug!(
            "{}: {} / {} / {}",
            phase,
            stats.avg(),
            stats.max,
            stats.min
        );
        print(self.console, format_args!("{report}"));
        // Every phase is published at most once
        let _ = summary.reports.push(report);
    }
}


// End of File

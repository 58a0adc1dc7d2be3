//! # rtbench
//!
//! Measures how long an RTOS takes to hand the processor from one task to
//! another through each of its synchronisation primitives.
//!
//! Two tasks, a sender and a receiver, take turns. The sender samples a
//! free-running counter and issues a stimulus: a yield, a direct-to-task
//! notification, a semaphore give or a message send. The receiver samples
//! the counter again as soon as it wakes up. Then a periodic interrupt
//! takes over the sender's job for the three signalling primitives, and
//! (with the `mem-pool` feature) an allocator stress test runs in between.
//! Every test prints its average, maximum and minimum in counter ticks.
//!
//! The crate only drives the tests. The RTOS port supplies the scheduler
//! services through [`Kernel`] and [`IsrKernel`], plus a [`CycleCounter`],
//! an [`InterruptSource`] and a [`Console`].

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![cfg_attr(not(test), no_std)]

// Must come first, so the log macros are visible to the other modules
mod fmt;

pub mod config;
mod console;
mod drivers;
mod harness;
mod isr;
mod kernel;
mod lfsr;
#[cfg(feature = "mem-pool")]
mod mempool;
mod monitor;
mod rendezvous;
mod stats;
mod timer;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod hw;

#[cfg(test)]
mod sim;

pub use config::Config;
pub use console::Console;
pub use harness::{BenchError, Harness, REPORT_LINES, Summary};
pub use isr::IsrDriver;
pub use kernel::{InterruptSource, IsrKernel, Kernel, MESSAGE, Primitive, Role, SignalError, Wake};
pub use lfsr::{Lfsr, shuffle_each};
#[cfg(feature = "mem-pool")]
pub use mempool::{Pool, large_allocation, size_classes};
pub use monitor::OverflowMonitor;
pub use rendezvous::{Fault, Phase, RendezvousState};
pub use stats::{Accumulator, Report, Stats};
pub use timer::{CycleCounter, Scaled, cyclic_distance};

// End of File

//! The allocator stress test
//!
//! Each round makes eight allocations of eight different sizes, in a random
//! order, then frees them in another random order, and times the whole
//! lot. A single large allocation afterwards checks that everything was
//! given back and that the pool has not fragmented.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::ptr::NonNull;

use crate::console::{Console, print};
use crate::harness::{BenchError, Harness};
use crate::lfsr::{Lfsr, shuffle_each};
use crate::rendezvous::Fault;
use crate::stats::{Accumulator, Stats};
use crate::timer::CycleCounter;

/// Allocations made in each round
pub const SLOTS: usize = 8;

/// How many of the first allocations in a round must never fail
pub const GUARANTEED: usize = 4;

/// A fixed-size memory pool
///
/// Usually a thin wrapper around the RTOS heap. It must be able to satisfy
/// an allocation of seven eighths of its capacity whenever nothing else is
/// allocated.
pub trait Pool {
    /// Allocate `size` bytes, or return `None` if there is no room
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Give an allocation back
    ///
    /// # Safety
    ///
    /// `ptr` must have come from [`Pool::allocate`] on this pool and must not
    /// have been freed since.
    unsafe fn free(&self, ptr: NonNull<u8>);
}

impl<T> Pool for &T
where
    T: Pool + ?Sized,
{
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        (**self).allocate(size)
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        // Safety: passed on unchanged, so the caller's promise still holds
        unsafe { (**self).free(ptr) }
    }
}

/// The eight allocation sizes, in bytes, for a pool of `pool_words` words
///
/// The smallest two are just over 1/128 of the pool and the largest is
/// just under half of it. Together they take about 97% of the pool, so
/// how the allocator packs them matters.
pub const fn size_classes(pool_words: usize) -> [usize; SLOTS] {
    let p = pool_words;
    let words = [
        p / 32,
        p / 64 + 16,
        p / 4,
        p / 128 + 32,
        p / 16,
        p / 8 + 16,
        p / 128 + 64,
        (p / 2).saturating_sub(256),
    ];
    let mut bytes = [0; SLOTS];
    let mut idx = 0;
    while idx < SLOTS {
        bytes[idx] = words[idx] * 4;
        idx += 1;
    }
    bytes
}

/// The size, in bytes, of the allocation made after every round
pub const fn large_allocation(pool_words: usize) -> usize {
    pool_words * 4 * 7 / 8
}

/// The random choices for one round
#[derive(Debug, Clone, PartialEq, Eq)]
struct Plan {
    /// Which slot each allocation goes into
    alloc: [u8; SLOTS],
    /// Which slot each free empties
    free: [u8; SLOTS],
    /// Which size class each allocation uses
    size: [u8; SLOTS],
}

impl Plan {
    fn generate(rng: &mut Lfsr) -> Plan {
        let mut orders = [[0, 1, 2, 3, 4, 5, 6, 7]; 3];
        shuffle_each(rng, &mut orders);
        let [alloc, free, size] = orders;
        Plan { alloc, free, size }
    }
}

/// Run the stress test on the receiver task
///
/// Returns the per-operation timings, or [`BenchError::PoolExhausted`] if
/// the large allocation ever fails. A failed allocation in the round itself
/// is reported and counted but does not stop the test. One of the first
/// [`GUARANTEED`] failing is reported as a broken invariant.
pub(crate) fn stress<C, O, P>(
    harness: &Harness<'_, C, O>,
    pool: &P,
    acc: &mut Accumulator,
) -> Result<Stats, BenchError>
where
    C: CycleCounter + ?Sized,
    O: Console + ?Sized,
    P: Pool + ?Sized,
{
    let classes = size_classes(harness.config.pool_words);
    let large = large_allocation(harness.config.pool_words);
    let mut rng = Lfsr::new(Lfsr::SEED);
    acc.reset();

    for round in 0..harness.config.rounds {
        let plan = Plan::generate(&mut rng);
        let mut slots: [Option<NonNull<u8>>; SLOTS] = [None; SLOTS];
        let mut failed: u8 = 0;

        let start = harness.counter.read();
        for (order, (&slot, &class)) in plan.alloc.iter().zip(plan.size.iter()).enumerate() {
            let ptr = pool.allocate(classes[usize::from(class)]);
            if ptr.is_none() {
                failed |= 1 << order;
            }
            slots[usize::from(slot)] = ptr;
        }
        for &slot in plan.free.iter() {
            if let Some(ptr) = slots[usize::from(slot)].take() {
                // Safety: `ptr` came from this pool this round, and `take`
                // means we can't free it twice
                unsafe { pool.free(ptr) };
            }
        }
        let end = harness.counter.read();
        acc.record(start, end);

        // Reported outside the timed section
        for (order, &class) in plan.size.iter().enumerate() {
            if failed & (1 << order) == 0 {
                continue;
            }
            let size = classes[usize::from(class)] as u32;
            let order = order as u8;
            let fault = if usize::from(order) < GUARANTEED {
                Fault::GuaranteedAllocation { round, order, size }
            } else {
                Fault::Allocation { round, order, size }
            };
            harness.state.fault(harness.console, fault);
        }

        match pool.allocate(large) {
            Some(ptr) => {
                // Safety: only just allocated, and not used again
                unsafe { pool.free(ptr) };
            }
            None => {
                error!("pool exhausted after {} rounds", round);
                print(
                    harness.console,
                    format_args!("Memory test failure: {round} runs.\r\n"),
                );
                return Err(BenchError::PoolExhausted { round });
            }
        }
    }

    Ok(acc.snapshot().per_operation(SLOTS as u16))
}


// End of File

//! Contains the [`OverflowMonitor`], which keeps an eye on the counter once
//! the benchmark is over

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Counts how often a free-running counter wraps
///
/// Feed it every sample with [`OverflowMonitor::poll`]. A sample lower than
/// the one before is taken to be one wrap, so it must be polled at least
/// once per counter period.
#[derive(Debug, Clone)]
pub struct OverflowMonitor {
    last: u16,
    overflows: u32,
    every: u32,
}

impl OverflowMonitor {
    /// Start monitoring from the sample `first`, reporting every `every`
    /// wraps
    pub const fn new(first: u16, every: u32) -> OverflowMonitor {
        assert!(every > 0);
        OverflowMonitor {
            last: first,
            overflows: 0,
            every,
        }
    }

    /// Process one sample
    ///
    /// Returns the running total of wraps if this sample completed another
    /// batch of `every`.
    pub fn poll(&mut self, now: u16) -> Option<u32> {
        let wrapped = now < self.last;
        self.last = now;
        if !wrapped {
            return None;
        }
        self.overflows = self.overflows.wrapping_add(1);
        (self.overflows % self.every == 0).then_some(self.overflows)
    }

    /// Wraps seen so far
    pub fn overflows(&self) -> u32 {
        self.overflows
    }
}


// End of File

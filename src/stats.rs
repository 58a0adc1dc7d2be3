//! Contains the [`Accumulator`] and the [`Stats`] it produces

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::timer::cyclic_distance;

/// Width of the label column in the report
pub const LABEL_WIDTH: usize = 34;

/// The results of one measured primitive
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    /// Sum of every sample
    pub total: u32,
    /// Largest sample
    pub max: u16,
    /// Smallest sample
    pub min: u16,
    /// Number of rounds the total is spread over
    pub rounds: u32,
}

impl Stats {
    /// Statistics with nothing recorded yet
    pub const fn empty(rounds: u32) -> Stats {
        Stats {
            total: 0,
            max: 0,
            min: u16::MAX,
            rounds,
        }
    }

    /// The mean sample
    pub const fn avg(&self) -> u32 {
        if self.rounds == 0 {
            0
        } else {
            self.total / self.rounds
        }
    }

    /// Scale every figure down by `divisor`.
    ///
    /// Used when one sample covers several operations.
    pub const fn per_operation(self, divisor: u16) -> Stats {
        Stats {
            total: self.total / divisor as u32,
            max: self.max / divisor,
            min: self.min / divisor,
            rounds: self.rounds,
        }
    }
}

/// Running total, maximum and minimum over a fixed number of rounds
///
/// Reset it before each primitive, record one `(start, end)` pair per round,
/// and read it out once the rounds are done.
#[derive(Debug, Clone)]
pub struct Accumulator {
    stats: Stats,
}

impl Accumulator {
    /// Make an accumulator whose average is taken over `rounds` rounds
    pub const fn new(rounds: u32) -> Accumulator {
        Accumulator {
            stats: Stats::empty(rounds),
        }
    }

    /// Forget everything recorded so far
    pub fn reset(&mut self) {
        self.stats = Stats::empty(self.stats.rounds);
    }

    /// Fold one sample pair in, returning the distance that was recorded
    pub fn record(&mut self, start: u16, end: u16) -> u16 {
        let diff = cyclic_distance(start, end);
        self.stats.total = self.stats.total.wrapping_add(u32::from(diff));
        self.stats.max = self.stats.max.max(diff);
        self.stats.min = self.stats.min.min(diff);
        diff
    }

    /// Copy out the results so far
    pub fn snapshot(&self) -> Stats {
        self.stats
    }

    /// Make a labelled report line from the results so far
    pub fn report(&self, label: &'static str) -> Report {
        Report {
            label,
            stats: self.stats,
        }
    }
}

/// One line of the benchmark report
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Report {
    /// What was measured
    pub label: &'static str,
    /// The results
    pub stats: Stats,
}

impl core::fmt::Display for Report {
    /// Renders as `<label> : <avg> / <max> / <min>` followed by CR LF
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:<width$} : {} / {} / {}\r\n",
            self.label,
            self.stats.avg(),
            self.stats.max,
            self.stats.min,
            width = LABEL_WIDTH
        )
    }
}


// End of File

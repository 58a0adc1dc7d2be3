//! A 16-bit Galois linear feedback shift register
//!
//! Cheap enough to call inside the allocator stress test without disturbing
//! the timing much, and deterministic, so every run of the benchmark sees
//! the same allocation sequences.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Pseudo-random number source
///
/// Yields every non-zero 16-bit value exactly once per period. Never yields
/// zero.
#[derive(Debug, Clone)]
pub struct Lfsr {
    state: u16,
}

impl Lfsr {
    /// The seed the benchmark uses
    pub const SEED: u16 = 0xACE1;

    /// Feedback taps for x^16 + x^14 + x^13 + x^11 + 1
    pub const TAPS: u16 = 0xB400;

    /// Outputs before the sequence repeats
    pub const PERIOD: u32 = 65_535;

    /// Create a register with the given seed, which must not be zero
    pub const fn new(seed: u16) -> Lfsr {
        assert!(seed != 0, "an LFSR seeded with zero stays at zero");
        Lfsr { state: seed }
    }

    /// Get the current register contents
    pub const fn state(&self) -> u16 {
        self.state
    }

    /// Get a value in `0..=bound`
    ///
    /// Uses a plain modulo, so small bounds are very slightly biased.
    pub fn up_to(&mut self, bound: u16) -> u16 {
        self.step() % (bound + 1)
    }

    fn step(&mut self) -> u16 {
        let lsb = self.state & 1;
        self.state >>= 1;
        if lsb != 0 {
            self.state ^= Self::TAPS;
        }
        self.state
    }
}

impl Default for Lfsr {
    fn default() -> Self {
        Lfsr::new(Self::SEED)
    }
}

impl Iterator for Lfsr {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        Some(self.step())
    }
}

/// Shuffle several arrays in lock-step with a Fisher-Yates pass
///
/// For each position from the top down, every array gets its own swap
/// partner. Starting from identical arrays this gives independent
/// permutations drawn from a single random stream.
pub fn shuffle_each<const N: usize, const M: usize>(rng: &mut Lfsr, arrays: &mut [[u8; N]; M]) {
    for idx in (1..N).rev() {
        for array in arrays.iter_mut() {
            let other = usize::from(rng.up_to(idx as u16));
            array.swap(idx, other);
        }
    }
}


// End of File

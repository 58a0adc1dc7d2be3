//! Contains the [`CycleCounter`] trait and helpers for counter samples

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// A free-running hardware counter
///
/// The counter must tick at (a multiple of) the core clock and wrap on a
/// timescale much longer than any one measured operation. Only the bottom
/// 16 bits are kept; [`cyclic_distance`] copes with the wrap.
///
/// `read` must not block and must be callable from both task and interrupt
/// context.
pub trait CycleCounter {
    /// Take a snapshot of the counter
    fn read(&self) -> u16;
}

impl<T> CycleCounter for &T
where
    T: CycleCounter + ?Sized,
{
    fn read(&self) -> u16 {
        (**self).read()
    }
}

/// The shorter distance between two samples, going either way around the wrap
///
/// A plain `end - start` is wrong whenever the counter was read 'backwards',
/// so we take whichever direction is shorter.
pub const fn cyclic_distance(start: u16, end: u16) -> u16 {
    let forward = end.wrapping_sub(start);
    let backward = start.wrapping_sub(end);
    if forward < backward { forward } else { backward }
}

/// A counter that ticks slower than the core, scaled back up to core cycles
///
/// For example, a timer clocked at half the core frequency needs a shift of
/// one.
pub struct Scaled<C> {
    inner: C,
    shift: u32,
}

impl<C> Scaled<C>
where
    C: CycleCounter,
{
    /// Wrap a counter which ticks once every `2^shift` core cycles
    pub const fn new(inner: C, shift: u32) -> Scaled<C> {
        assert!(shift < 16);
        Scaled { inner, shift }
    }

    /// Get the counter we are scaling
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C> CycleCounter for Scaled<C>
where
    C: CycleCounter,
{
    fn read(&self) -> u16 {
        self.inner.read() << self.shift
    }
}


// End of File

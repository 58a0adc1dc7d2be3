//! Cortex-M implementations of the hardware traits
//!
//! These cover the counter and the interrupt. The console and the kernel
//! bindings come from the board support crate and the RTOS port.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;

use crate::kernel::InterruptSource;

#[cfg(not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base")))]
pub use self::dwt::DwtCounter;

/// The DWT cycle counter, which Armv6-M and Armv8-M Baseline parts lack
#[cfg(not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base")))]
mod dwt {
    use cortex_m::peripheral::{DCB, DWT};

    use crate::timer::CycleCounter;

    /// Reads the core's own cycle counter, so no scaling is needed
    pub struct DwtCounter {
        _inner: (),
    }

    impl DwtCounter {
        /// Switch the cycle counter on
        pub fn new(dcb: &mut DCB, dwt: &mut DWT) -> DwtCounter {
            dcb.enable_trace();
            DWT::unlock();
            dwt.enable_cycle_counter();
            DwtCounter { _inner: () }
        }
    }

    impl CycleCounter for DwtCounter {
        fn read(&self) -> u16 {
            DWT::cycle_count() as u16
        }
    }
}

/// A peripheral interrupt, switched on and off in the NVIC
///
/// The peripheral itself must already be set up to interrupt periodically.
pub struct NvicSource<I> {
    irq: I,
}

impl<I> NvicSource<I>
where
    I: InterruptNumber,
{
    /// Wrap an interrupt, which should be masked for now
    pub const fn new(irq: I) -> NvicSource<I> {
        NvicSource { irq }
    }
}

impl<I> InterruptSource for NvicSource<I>
where
    I: InterruptNumber,
{
    fn enable(&self) {
        // Safety: the handler only touches the harness, which is built for
        // being called from an interrupt
        unsafe { NVIC::unmask(self.irq) };
    }

    fn disable(&self) {
        NVIC::mask(self.irq);
    }
}

// End of File

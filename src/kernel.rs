//! The scheduler services the benchmark measures
//!
//! The harness never implements a primitive itself. The RTOS port
//! implements these traits on top of its own task, notification, semaphore
//! and queue objects, which it creates before starting the benchmark tasks
//! (see [`crate::config`] for their sizes).

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// One of the two benchmark tasks
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// Issues each stimulus
    Sender,
    /// Waits for each stimulus and records how long it took
    Receiver,
}

/// Why the substrate refused a signal
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalError {
    /// The semaphore count or the queue is at capacity
    Full,
    /// Any other refusal
    Rejected,
}

impl core::fmt::Display for SignalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SignalError::Full => write!(f, "object full"),
            SignalError::Rejected => write!(f, "rejected"),
        }
    }
}

/// Did an interrupt-context signal unblock a task above the one interrupted?
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wake {
    /// A higher priority task is now ready; switch on interrupt exit
    HigherPriority,
    /// Return to whatever was running
    None,
}

/// Task-context services, called by the sender and the receiver
///
/// Every wait blocks with an unbounded timeout. The notification always
/// targets the receiver task, with overwrite semantics.
pub trait Kernel {
    /// Give up the processor to any ready task of the same or higher priority
    fn yield_now(&self);
    /// Change the priority of one of the benchmark tasks
    fn set_priority(&self, role: Role, priority: u8);
    /// Set the receiver's notification value, overwriting any pending one
    fn notify(&self, value: u32) -> Result<(), SignalError>;
    /// Block until the receiver's notification arrives, then clear it
    fn wait_notification(&self) -> u32;
    /// Give the counting semaphore
    fn give(&self) -> Result<(), SignalError>;
    /// Block until the counting semaphore can be taken
    fn take(&self);
    /// Put a message on the back of the queue
    fn send(&self, message: u32) -> Result<(), SignalError>;
    /// Block until a message can be taken from the front of the queue
    fn receive(&self) -> u32;
}

/// Interrupt-context services, called by the periodic interrupt handler
///
/// None of these may block.
pub trait IsrKernel {
    /// Set the receiver's notification value from an interrupt
    fn notify_from_isr(&self, value: u32) -> Result<Wake, SignalError>;
    /// Give the counting semaphore from an interrupt
    fn give_from_isr(&self) -> Result<Wake, SignalError>;
    /// Put a message on the queue from an interrupt
    fn send_from_isr(&self, message: u32) -> Result<Wake, SignalError>;
    /// Request a context switch on interrupt exit, if `wake` says so
    fn yield_from_isr(&self, wake: Wake);
}

/// The periodic interrupt which plays the sender in the interrupt tests
///
/// Its period does not matter, only the instant it fires. The handler calls
/// [`crate::IsrDriver::on_interrupt`].
pub trait InterruptSource {
    /// Let the interrupt fire
    fn enable(&self);
    /// Stop the interrupt firing
    fn disable(&self);
}

impl<T> InterruptSource for &T
where
    T: InterruptSource + ?Sized,
{
    fn enable(&self) {
        (**self).enable()
    }

    fn disable(&self) {
        (**self).disable()
    }
}

/// The value carried by every notification and message
pub const MESSAGE: u32 = 1;

/// A signal/wait primitive we can measure
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Primitive {
    /// Direct-to-task notification
    Notification,
    /// Counting semaphore
    Semaphore,
    /// Message queue
    MessageQueue,
}

impl Primitive {
    /// Every primitive, in the order they are measured
    pub const ALL: [Primitive; 3] = [
        Primitive::Notification,
        Primitive::Semaphore,
        Primitive::MessageQueue,
    ];

    /// Position in [`Primitive::ALL`]
    pub const fn index(self) -> usize {
        match self {
            Primitive::Notification => 0,
            Primitive::Semaphore => 1,
            Primitive::MessageQueue => 2,
        }
    }

    /// Report label when a task sends the signal
    pub const fn label(self) -> &'static str {
        match self {
            Primitive::Notification => "Notification",
            Primitive::Semaphore => "Semaphore",
            Primitive::MessageQueue => "Message queue",
        }
    }

    /// Report label when the interrupt sends the signal
    pub const fn isr_label(self) -> &'static str {
        match self {
            Primitive::Notification => "ISR Notification",
            Primitive::Semaphore => "ISR Semaphore",
            Primitive::MessageQueue => "ISR Message queue",
        }
    }

    /// Send the signal from a task
    pub fn signal<K>(self, kernel: &K) -> Result<(), SignalError>
    where
        K: Kernel + ?Sized,
    {
        match self {
            Primitive::Notification => kernel.notify(MESSAGE),
            Primitive::Semaphore => kernel.give(),
            Primitive::MessageQueue => kernel.send(MESSAGE),
        }
    }

    /// Send the signal from an interrupt
    pub fn signal_from_isr<K>(self, kernel: &K) -> Result<Wake, SignalError>
    where
        K: IsrKernel + ?Sized,
    {
        match self {
            Primitive::Notification => kernel.notify_from_isr(MESSAGE),
            Primitive::Semaphore => kernel.give_from_isr(),
            Primitive::MessageQueue => kernel.send_from_isr(MESSAGE),
        }
    }

    /// Block until the signal arrives
    pub fn wait<K>(self, kernel: &K)
    where
        K: Kernel + ?Sized,
    {
        match self {
            Primitive::Notification => {
                kernel.wait_notification();
            }
            Primitive::Semaphore => kernel.take(),
            Primitive::MessageQueue => {
                kernel.receive();
            }
        }
    }
}


// End of File

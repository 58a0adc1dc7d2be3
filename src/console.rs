//! Contains the [`Console`] trait, where the report goes

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// A blocking, line-oriented text output
///
/// The sender, the receiver and the interrupt handler can all print, so
/// this takes `&self`. A UART which spins on its transmit-empty flag is the
/// usual implementation.
pub trait Console {
    /// Write all of the given text, blocking until it is sent
    fn write_str(&self, text: &str);
}

impl<T> Console for &T
where
    T: Console + ?Sized,
{
    fn write_str(&self, text: &str) {
        (**self).write_str(text)
    }
}

/// Adapts a [`Console`] to [`core::fmt::Write`] so we can use `write!`
pub(crate) struct Writer<'a, C: ?Sized>(pub(crate) &'a C);

impl<C> core::fmt::Write for Writer<'_, C>
where
    C: Console + ?Sized,
{
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

/// Print formatted text on a console
///
/// Our [`Writer`] never fails, so the result can be ignored.
pub(crate) fn print<C>(console: &C, args: core::fmt::Arguments<'_>)
where
    C: Console + ?Sized,
{
    let _ = core::fmt::write(&mut Writer(console), args);
}


// End of File

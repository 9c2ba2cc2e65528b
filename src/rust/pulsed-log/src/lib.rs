// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Log macros of the pulse compiler.
//!
//! Records go through the `log` facade under the `pulsed.rust::<module>`
//! target. Generator bookkeeping such as readout counting lengths, phase
//! cycle choices, jump table row layouts and sequence table finalization is
//! emitted with [`diagnostic!`] and stays silent unless enabled through
//! [`init_logging`].

use std::sync::{atomic::AtomicBool, atomic::Ordering};

#[doc(hidden)]
pub use log as _log;

#[macro_export]
macro_rules! info {
    ($msg:literal, $($arg:tt)+) => {
        $crate::_log::info!(target: concat!("pulsed.rust::", module_path!()), $msg, $($arg)+);
    };
    ($msg:literal) => {
        $crate::_log::info!(target: concat!("pulsed.rust::", module_path!()), $msg);
    };
}

#[macro_export]
macro_rules! warn {
    ($msg:literal, $($arg:tt)+) => {
        $crate::_log::warn!(target: concat!("pulsed.rust::", module_path!()), $msg, $($arg)+);
    };
    ($msg:literal) => {
        $crate::_log::warn!(target: concat!("pulsed.rust::", module_path!()), $msg);
    };
}

/// Log a diagnostic message at info level if diagnostics logging is enabled.
///
/// Diagnostics cover the generator bookkeeping (counting lengths, phase
/// cycles, row layouts) that is too chatty for regular info output.
#[macro_export]
macro_rules! diagnostic {
    ($msg:literal, $($arg:tt)+) => {
        if $crate::is_diagnostics_enabled() {
             $crate::_log::info!(target: concat!("pulsed.rust::", module_path!()), $msg, $($arg)+);
        }
    };
    ($msg:literal) => {
        if $crate::is_diagnostics_enabled() {
            $crate::_log::info!(target: concat!("pulsed.rust::", module_path!()), $msg);
        }
    };
}

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn is_diagnostics_enabled() -> bool {
    DIAGNOSTICS_ENABLED.load(Ordering::Acquire)
}

/// Enable or disable the pulse compiler diagnostics.
///
/// Call once before the first build. Installing a logger is left to the host,
/// this only gates the [`diagnostic!`] records.
pub fn init_logging(with_diagnostics: bool) {
    DIAGNOSTICS_ENABLED.store(with_diagnostics, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_flag() {
        init_logging(true);
        assert!(is_diagnostics_enabled());
        diagnostic!("diagnostics {}", "enabled");
        init_logging(false);
        assert!(!is_diagnostics_enabled());
        diagnostic!("not emitted");
        info!("plain info");
        warn!("plain {}", "warning");
    }
}

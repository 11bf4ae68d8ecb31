// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Compile-time configuration options of the boot logic.
//!
//! Board-specific values (flash layout, timings, thresholds) are associated
//! constants of [`BoardConfig`](crate::BoardConfig). The options here are
//! switches that change how the portable logic behaves, and they are the only
//! place in this crate where cargo features are consulted. All code paths stay
//! type-checked whatever the feature set; the disabled ones are folded away.

use log::LevelFilter;

/// Data structure holding compile-time configuration options.
pub(crate) struct Config {
    /// Whether the raw bytes of every fetched firmware header are written to
    /// the debug log. Enabling it also raises [`max_log_level`] to `Debug`
    /// in release builds.
    ///
    /// Useful to diagnose flash controllers that return garbage on the first
    /// read after reset.
    pub(crate) debug_header_dump: bool,

    /// Whether the panic loop keeps feeding the watchdog.
    ///
    /// When enabled, a panicked device waits for the user indefinitely instead
    /// of being reset by the watchdog into the same unresolved condition.
    /// Disable it (feature `no_panic_watchdog_feed`) on platforms where the
    /// watchdog reset is wanted as a second safety net.
    pub(crate) panic_feeds_watchdog: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined.
pub(crate) const CONFIG: Config = Config {
    debug_header_dump: cfg!(feature = "debug_header_dump"),
    panic_feeds_watchdog: !cfg!(feature = "no_panic_watchdog_feed"),
};

/// The most verbose level a board should let through its logger.
///
/// Release builds stop at `Info`, unless an option that only produces
/// `debug` output is enabled.
pub fn max_log_level(debug_build: bool) -> LevelFilter {
    if debug_build || CONFIG.debug_header_dump {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

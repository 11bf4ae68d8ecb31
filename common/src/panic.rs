// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Terminal handling of unrecoverable conditions.
//!
//! A bootloader panic never resets the device by itself. It logs why it
//! stopped, keeps the watchdog quiet, and waits for the user to press a
//! button, which triggers a cold reset. This way a device that cannot boot
//! does not spin through the same failure forever while draining the battery,
//! and the user still gets a power-cycle-like retry.
//!
//! Panics raised before [`init`] is called are "early": the board is expected
//! to use its own fatal path for those, because the hardware the panic loop
//! relies on may not be usable yet.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};

use crate::config::CONFIG;
use crate::error::BootError;
use crate::hil::{Buttons, Delay, Reset, Watchdog};

/// Interval between two button polls in the panic loop.
pub const POLL_INTERVAL_MS: u32 = 10;

static READY: AtomicBool = AtomicBool::new(false);

/// Mark the panic handler as usable. Called by the board once buttons and
/// watchdog are initialized.
pub fn init() {
    READY.store(true, Ordering::SeqCst);
}

/// Whether [`init`] has been called.
pub fn is_ready() -> bool {
    READY.load(Ordering::SeqCst)
}

/// Why the bootloader gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanicReason {
    /// A required device could not be initialized.
    InitFail,
    /// The recovery firmware crashed too many times in a row.
    PrfUnstable,
    /// Too many boots without the firmware ever confirming it is stable.
    ResetLoop,
    /// Battery too low to boot and no external power.
    LowBattery,
    /// The main firmware (or its recovery fallback) could not be loaded.
    FwLoadFail(BootError),
    /// An explicitly requested recovery firmware could not be loaded.
    PrfLoadFail(BootError),
    /// Fatal error raised by the runtime (CPU fault, Rust panic).
    System(u32),
}

impl PanicReason {
    /// Diagnostic code logged and shown to the user.
    pub fn code(&self) -> u32 {
        match self {
            PanicReason::InitFail => 0x0000_0001,
            PanicReason::PrfUnstable => 0x0000_0002,
            PanicReason::ResetLoop => 0x0000_0003,
            PanicReason::LowBattery => 0x0000_0004,
            PanicReason::FwLoadFail(err) => 0x0001_0000 | u32::from(err.code()),
            PanicReason::PrfLoadFail(err) => 0x0002_0000 | u32::from(err.code()),
            PanicReason::System(code) => 0x0800_0000 | (code & 0x07ff_ffff),
        }
    }
}

impl fmt::Display for PanicReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanicReason::InitFail => f.write_str("init failure"),
            PanicReason::PrfUnstable => f.write_str("PRF unstable"),
            PanicReason::ResetLoop => f.write_str("reset loop"),
            PanicReason::LowBattery => f.write_str("battery low"),
            PanicReason::FwLoadFail(err) => write!(f, "firmware load failure: {}", err),
            PanicReason::PrfLoadFail(err) => write!(f, "PRF load failure: {}", err),
            PanicReason::System(code) => write!(f, "system fatal error {}", code),
        }
    }
}

/// Something that can stop the system for a reason.
pub trait PanicSink {
    fn panic(&self, reason: PanicReason) -> !;
}

/// The late panic handler.
pub struct PanicHandler<'a, B: Buttons, W: Watchdog, D: Delay, R: Reset> {
    buttons: &'a B,
    watchdog: &'a W,
    delay: &'a D,
    reset: &'a R,
}

impl<'a, B: Buttons, W: Watchdog, D: Delay, R: Reset> PanicHandler<'a, B, W, D, R> {
    pub fn new(buttons: &'a B, watchdog: &'a W, delay: &'a D, reset: &'a R) -> Self {
        Self {
            buttons,
            watchdog,
            delay,
            reset,
        }
    }

    /// One iteration of the panic loop. Returns whether the user asked for a
    /// reset.
    fn poll(&self) -> bool {
        if CONFIG.panic_feeds_watchdog {
            if let Err(err) = self.watchdog.feed() {
                warn!("Failed to feed watchdog ({})", err);
            }
        }
        self.buttons.any_pressed()
    }
}

impl<B: Buttons, W: Watchdog, D: Delay, R: Reset> PanicSink for PanicHandler<'_, B, W, D, R> {
    fn panic(&self, reason: PanicReason) -> ! {
        error!(
            "System panic (reason 0x{:08x}: {}), press any button to reset",
            reason.code(),
            reason
        );

        loop {
            if self.poll() {
                info!("Resetting system due to button press");
                self.reset.cold_reset();
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
        }
    }
}

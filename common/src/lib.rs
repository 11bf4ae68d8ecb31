// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Portable core of the pblboot second-stage bootloader.
//!
//! Everything that decides what to boot lives here and is tested on the host
//! against in-memory fakes. Boards supply the hardware through the traits in
//! [`hil`] and the constants in [`BoardConfig`], then call, in order:
//!
//! 1. [`BootBits::init`]
//! 2. [`startup::check_devices`] and [`startup::start_watchdog`]
//! 3. [`panic::init`]
//! 4. [`battery::allow_boot`]
//! 5. [`Bootloader::boot`]

#![cfg_attr(not(test), no_std)]

pub mod battery;
pub mod bootbit;
pub mod buttons;
pub mod error;
pub mod firmware;
pub mod hil;
pub mod panic;
pub mod pulse;
pub mod recovery;
pub mod selector;
pub mod startup;

mod config;

#[cfg(test)]
mod test_utils;

pub use crate::bootbit::{BootBits, Counter, Flag};
pub use crate::config::max_log_level;
pub use crate::error::{BootError, ErrorCode};
pub use crate::firmware::{FirmwareHeader, FirmwareValidator, HeaderFetchPolicy};
pub use crate::panic::{PanicHandler, PanicReason, PanicSink};
pub use crate::recovery::{BootAction, Bootloader};
pub use crate::selector::{Image, Slot, SlotLayout, SlotSelector};

/// Board-specific configuration
pub trait BoardConfig {
    /// Flash offset of the first update slot.
    const SLOT0_ADDR: usize;

    /// Flash offset of the second update slot.
    const SLOT1_ADDR: usize;

    /// Flash offset of the recovery firmware.
    const PRF_ADDR: usize;

    /// Address at which flash offset 0 is mapped for execution.
    const FLASH_BASE_ADDRESS: usize;

    /// How long the recovery button combo must be held at boot.
    const PRF_BUTTON_COMBO_TIME_MS: u32;

    /// Watchdog timeout handed to the firmware.
    const WATCHDOG_TIMEOUT_MS: u32;

    /// Battery voltage under which booting needs external power.
    const VBAT_MIN_BOOT_MV: u32;

    /// Number of header reads before a slot is declared empty.
    const HEADER_FETCH_ATTEMPTS: usize = firmware::DEFAULT_HEADER_FETCH_ATTEMPTS;
}

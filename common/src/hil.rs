// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Interfaces to the hardware the bootloader depends on.
//!
//! Each board implements these once. None of them carries decision logic: the
//! policies built on top (retrying header reads, confirming a button combo,
//! failing open on battery reads) live in the rest of this crate so they can
//! be tested against in-memory fakes.

use crate::error::ErrorCode;

/// A device that must be present before the bootloader can do anything
/// useful. Consulted once at startup.
pub trait Device {
    /// Short name used in log messages and init-failure reports.
    fn name(&self) -> &'static str;

    /// Whether the device is ready for use.
    fn is_ready(&self) -> bool;
}

/// Synchronous read access to the flash holding the firmware slots.
pub trait Flash: Device {
    /// Fill `buf` with the bytes starting at flash offset `address`.
    ///
    /// Either the whole buffer is filled or an error is returned.
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), ErrorCode>;
}

/// The user buttons.
pub trait Buttons: Device {
    /// Whether any button is currently held.
    fn any_pressed(&self) -> bool;

    /// Whether the recovery button combination is currently held. This is a
    /// raw level read; [`buttons::prf_combo_held_for`](crate::buttons::prf_combo_held_for)
    /// confirms it over time.
    fn prf_combo_pressed(&self) -> bool;
}

/// Busy-wait delays.
pub trait Delay {
    fn delay_ms(&self, ms: u32);
}

/// Battery and charger state.
pub trait BatteryGauge: Device {
    /// Battery voltage in millivolts.
    fn voltage_mv(&self) -> Result<u32, ErrorCode>;

    /// Whether external power is present. Boards that cannot tell return
    /// `Err(ErrorCode::NOSUPPORT)`.
    fn vbus_present(&self) -> Result<bool, ErrorCode>;
}

/// The hardware watchdog.
pub trait Watchdog: Device {
    /// Start the watchdog with a timeout of `timeout_ms` milliseconds. Once
    /// started, the watchdog resets the SoC unless fed within the timeout.
    fn start(&self, timeout_ms: u32) -> Result<(), ErrorCode>;

    /// Service the watchdog.
    fn feed(&self) -> Result<(), ErrorCode>;
}

/// Handing execution over to a firmware image.
pub trait Jumper {
    /// Jump to the image whose vector table starts at `address`, as though the
    /// chip had started executing there. The initial stack pointer is the
    /// word at `address` and the reset vector the word at `address + 4`.
    ///
    /// Implementations tear down every piece of bootloader CPU state
    /// (interrupts, caches, memory protection, stack limits) before the
    /// transfer. There is no way back.
    fn jump(&self, address: usize) -> !;
}

/// System reset.
pub trait Reset {
    /// Reset the whole SoC, as close to a power-on reset as the chip allows.
    fn cold_reset(&self) -> !;
}

/// The word backing the boot bits.
///
/// It must keep its value across a warm reset and read as zero after a power
/// loss. `write` must have reached the backing store when it returns.
pub trait BootBitStore {
    fn read(&self) -> u32;
    fn write(&self, value: u32);
}

impl<T: BootBitStore + ?Sized> BootBitStore for &T {
    fn read(&self) -> u32 {
        (**self).read()
    }

    fn write(&self, value: u32) {
        (**self).write(value)
    }
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! pblboot for the nRF52840-DK.
//!
//! The DK stands in for a watch: its four buttons are BACK, UP, CENTER and
//! DOWN, and the SAADC reading of VDD stands in for the battery voltage.

#![no_std]
#![no_main]

mod bootbit;
mod buttons;
mod delay;
mod flash;
mod gauge;
mod gpio;
mod io;
mod jump;
mod panic;
mod watchdog;

use cortex_m_rt::entry;
use log::{error, info};
use pblboot_common::battery::allow_boot;
use pblboot_common::startup::{check_devices, start_watchdog};
use pblboot_common::{BoardConfig, BootBits, Bootloader, PanicHandler, PanicReason, PanicSink};

use crate::bootbit::RetentionWord;
use crate::buttons::Buttons;
use crate::delay::BusyDelay;
use crate::flash::Nvmc;
use crate::gauge::Gauge;
use crate::jump::{CortexM, SysReset};
use crate::watchdog::Wdt;

struct Nrf52840dk;

impl BoardConfig for Nrf52840dk {
    const SLOT0_ADDR: usize = 0x0001_0000;
    const SLOT1_ADDR: usize = 0x0007_8000;
    const PRF_ADDR: usize = 0x000E_0000;
    const FLASH_BASE_ADDRESS: usize = 0x0000_0000;
    const PRF_BUTTON_COMBO_TIME_MS: u32 = 5000;
    const WATCHDOG_TIMEOUT_MS: u32 = 15_000;
    /// Below this the board runs from a coin cell or a failing supply.
    const VBAT_MIN_BOOT_MV: u32 = 2800;
}

/// Chunk size used when computing image CRCs.
const READ_BUFFER_SIZE: usize = 256;

#[entry]
fn main() -> ! {
    io::init();
    info!("pblboot {}", env!("CARGO_PKG_VERSION"));

    let bits = BootBits::new(RetentionWord::new());
    bits.init();

    let flash = Nvmc::new();
    let buttons = Buttons::new();
    buttons.init();
    let watchdog = Wdt::new();
    let gauge = Gauge::new();
    let delay = BusyDelay;
    let panic = PanicHandler::new(&buttons, &watchdog, &delay, &SysReset);

    if let Err(err) = check_devices(&[&flash, &buttons, &gauge, &watchdog])
        .and_then(|()| start_watchdog(&watchdog, Nrf52840dk::WATCHDOG_TIMEOUT_MS))
    {
        error!("Initialization failed: {}", err);
        panic.panic(PanicReason::InitFail);
    }
    pblboot_common::panic::init();

    if !allow_boot(&gauge, Nrf52840dk::VBAT_MIN_BOOT_MV) {
        panic.panic(PanicReason::LowBattery);
    }

    let jumper = CortexM::new(&flash);
    Bootloader::<Nrf52840dk, _, _, _, _, READ_BUFFER_SIZE>::new(&bits, &flash, &buttons, &delay)
        .boot(&jumper, &panic)
}

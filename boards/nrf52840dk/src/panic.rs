// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Rust panics and CPU faults.
//!
//! Once the bootloader is initialized, both end in the common panic loop.
//! Before that, LED2 blinks until the watchdog (if started) resets the chip.

use core::panic::PanicInfo;

use cortex_m_rt::{exception, ExceptionFrame};
use log::error;
use pblboot_common::{PanicHandler, PanicReason, PanicSink};

use crate::buttons::Buttons;
use crate::delay::BusyDelay;
use crate::gpio::Port;
use crate::jump::SysReset;
use crate::watchdog::Wdt;

/// `System` codes reported by this board.
const CPU_EXCEPTION: u32 = 0;
const RUST_PANIC: u32 = 4;

const LED2_PIN: usize = 14; // P0.14, active low

fn fatal(code: u32) -> ! {
    let buttons = Buttons::new();
    let watchdog = Wdt::new();
    PanicHandler::new(&buttons, &watchdog, &BusyDelay, &SysReset).panic(PanicReason::System(code))
}

fn early_fatal() -> ! {
    let port = Port::new();
    port.make_output(LED2_PIN);
    loop {
        port.clear(LED2_PIN);
        cortex_m::asm::delay(8_000_000);
        port.set(LED2_PIN);
        cortex_m::asm::delay(8_000_000);
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    if !pblboot_common::panic::is_ready() {
        early_fatal();
    }
    error!("{}", info);
    fatal(RUST_PANIC)
}

#[exception]
unsafe fn HardFault(frame: &ExceptionFrame) -> ! {
    if !pblboot_common::panic::is_ready() {
        early_fatal();
    }
    error!("Hard fault (pc 0x{:08x}, lr 0x{:08x})", frame.pc(), frame.lr());
    fatal(CPU_EXCEPTION)
}

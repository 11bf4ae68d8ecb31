// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Log output over UARTE0, framed for the host-side pulse tools.

use core::fmt::Write;

use log::{Log, Metadata, Record};
use pblboot_common::pulse::{LogFrame, MAX_WIRE_LEN};

use crate::gpio::Port;

const UARTE0_BASE: usize = 0x4000_2000;
const TASKS_STARTTX: *mut u32 = (UARTE0_BASE + 0x008) as *mut u32;
const TASKS_STOPTX: *mut u32 = (UARTE0_BASE + 0x00C) as *mut u32;
const EVENTS_ENDTX: *mut u32 = (UARTE0_BASE + 0x120) as *mut u32;
const EVENTS_TXSTOPPED: *mut u32 = (UARTE0_BASE + 0x158) as *mut u32;
const ENABLE: *mut u32 = (UARTE0_BASE + 0x500) as *mut u32;
const PSEL_TXD: *mut u32 = (UARTE0_BASE + 0x50C) as *mut u32;
const PSEL_RXD: *mut u32 = (UARTE0_BASE + 0x514) as *mut u32;
const BAUDRATE: *mut u32 = (UARTE0_BASE + 0x524) as *mut u32;
const CONFIG: *mut u32 = (UARTE0_BASE + 0x56C) as *mut u32;
const TXD_PTR: *mut u32 = (UARTE0_BASE + 0x544) as *mut u32;
const TXD_MAXCNT: *mut u32 = (UARTE0_BASE + 0x548) as *mut u32;

const ENABLE_UARTE: u32 = 8;
const BAUD_115200: u32 = 0x01D7_E000;
/// Routed to the interface MCU's virtual COM port.
const TX_PIN: usize = 6;
const RX_PIN: usize = 8;

/// Busy-wait iterations before a transfer is abandoned.
const TX_TIMEOUT: u32 = 100_000;

struct Uarte;

impl Uarte {
    fn init(&self) {
        let port = Port::new();
        port.set(TX_PIN);
        port.make_output(TX_PIN);
        port.make_input_pullup(RX_PIN);

        // SAFETY: the pointers are UARTE0 registers, and nothing else in the
        // bootloader uses UARTE0.
        unsafe {
            core::ptr::write_volatile(ENABLE, 0);
            core::ptr::write_volatile(PSEL_TXD, TX_PIN as u32);
            core::ptr::write_volatile(PSEL_RXD, RX_PIN as u32);
            core::ptr::write_volatile(BAUDRATE, BAUD_115200);
            // 8N1, no flow control
            core::ptr::write_volatile(CONFIG, 0);
            core::ptr::write_volatile(ENABLE, ENABLE_UARTE);
        }
    }

    fn wait_for(event: *mut u32) -> bool {
        for _ in 0..TX_TIMEOUT {
            // SAFETY: `event` is one of the UARTE0 event registers.
            if unsafe { core::ptr::read_volatile(event) } != 0 {
                return true;
            }
        }
        false
    }

    /// Send `bytes`, which must live in RAM for EasyDMA to reach them.
    fn write(&self, bytes: &[u8]) {
        // SAFETY: as in `init`. `bytes` outlives the transfer, which is
        // stopped before returning.
        unsafe {
            core::ptr::write_volatile(EVENTS_ENDTX, 0);
            core::ptr::write_volatile(EVENTS_TXSTOPPED, 0);
            core::ptr::write_volatile(TXD_PTR, bytes.as_ptr() as u32);
            core::ptr::write_volatile(TXD_MAXCNT, bytes.len() as u32);
            core::ptr::write_volatile(TASKS_STARTTX, 1);

            Self::wait_for(EVENTS_ENDTX);

            core::ptr::write_volatile(TASKS_STOPTX, 1);
            Self::wait_for(EVENTS_TXSTOPPED);
        }
    }
}

/// `log` backend sending every record as one pulse log frame.
struct PulseLogger {
    uart: Uarte,
}

impl Log for PulseLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let line = record.line().map_or(0, |line| line.min(u32::from(u16::MAX)) as u16);
        let mut frame = LogFrame::new(line);
        // The frame truncates instead of failing.
        let _ = write!(frame, "{:<5} {}", record.level(), record.args());

        let mut wire = [0u8; MAX_WIRE_LEN];
        let mut len = 0;
        let encoded = frame.encode(|byte| {
            wire[len] = byte;
            len += 1;
        });
        if encoded.is_ok() {
            self.uart.write(&wire[..len]);
        }
    }

    fn flush(&self) {}
}

static LOGGER: PulseLogger = PulseLogger { uart: Uarte };

/// Bring up the UART and install the logger.
pub fn init() {
    LOGGER.uart.init();
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(pblboot_common::max_log_level(cfg!(debug_assertions)));
    }
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! nRF52 watchdog timer.
//!
//! Once started, the WDT cannot be stopped or reconfigured until the next
//! reset. The firmware keeps feeding it through reload register 0.

use log::warn;
use pblboot_common::{hil, ErrorCode};
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

const WDT_BASE: usize = 0x4001_0000;

/// Watchdog clock (LFCLK) frequency.
const WDT_CLOCK_HZ: u64 = 32_768;
/// Smallest allowed counter reload value.
const CRV_MIN: u64 = 0xf;
/// Value that reloads the counter when written to a reload register.
const RELOAD_MAGIC: u32 = 0x6e52_4635;

register_structs! {
    WdtRegisters {
        /// Start the watchdog
        (0x000 => tasks_start: WriteOnly<u32>),
        (0x004 => _reserved0),
        /// Run status
        (0x400 => runstatus: ReadOnly<u32, RunStatus::Register>),
        (0x404 => _reserved1),
        /// Counter reload value
        (0x504 => crv: ReadWrite<u32>),
        /// Enable register for reload request registers
        (0x508 => rren: ReadWrite<u32, ReloadEnable::Register>),
        /// Configuration register
        (0x50C => config: ReadWrite<u32, Config::Register>),
        (0x510 => _reserved2),
        /// Reload request registers
        (0x600 => rr: [WriteOnly<u32>; 8]),
        (0x620 => @END),
    }
}

register_bitfields! [u32,
    RunStatus [
        RUNNING OFFSET(0) NUMBITS(1) []
    ],
    ReloadEnable [
        RR0 OFFSET(0) NUMBITS(1) []
    ],
    Config [
        /// Keep running while the CPU sleeps
        SLEEP OFFSET(0) NUMBITS(1) [
            Pause = 0,
            Run = 1
        ],
        /// Keep running while the CPU is halted by the debugger
        HALT OFFSET(3) NUMBITS(1) [
            Pause = 0,
            Run = 1
        ]
    ]
];

pub struct Wdt {
    registers: &'static WdtRegisters,
}

impl Wdt {
    pub fn new() -> Self {
        // SAFETY: WDT_BASE is the address of the WDT register block, which
        // is valid for the whole program.
        let registers = unsafe { &*(WDT_BASE as *const WdtRegisters) };
        Self { registers }
    }

    fn is_running(&self) -> bool {
        self.registers.runstatus.is_set(RunStatus::RUNNING)
    }
}

impl hil::Device for Wdt {
    fn name(&self) -> &'static str {
        "watchdog"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

impl hil::Watchdog for Wdt {
    fn start(&self, timeout_ms: u32) -> Result<(), ErrorCode> {
        if self.is_running() {
            // Left running by a previous image, with its own timeout.
            warn!("Watchdog already running, keeping its configuration");
            return Ok(());
        }

        let crv = u64::from(timeout_ms) * WDT_CLOCK_HZ / 1000;
        if crv < CRV_MIN || crv > u64::from(u32::MAX) {
            return Err(ErrorCode::INVAL);
        }

        self.registers.crv.set(crv as u32);
        self.registers.rren.write(ReloadEnable::RR0::SET);
        self.registers
            .config
            .write(Config::SLEEP::Run + Config::HALT::Pause);
        self.registers.tasks_start.set(1);
        Ok(())
    }

    fn feed(&self) -> Result<(), ErrorCode> {
        if !self.is_running() {
            return Err(ErrorCode::OFF);
        }
        self.registers.rr[0].set(RELOAD_MAGIC);
        Ok(())
    }
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Minimal GPIO port 0 access.

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

const GPIO_P0_BASE: usize = 0x5000_0000;

register_structs! {
    GpioRegisters {
        (0x000 => _reserved0),
        /// Set individual bits in GPIO port
        (0x508 => outset: WriteOnly<u32>),
        /// Clear individual bits in GPIO port
        (0x50C => outclr: WriteOnly<u32>),
        /// Read GPIO port
        (0x510 => in_: ReadOnly<u32>),
        (0x514 => _reserved1),
        /// Configuration of GPIO pins
        (0x700 => pin_cnf: [ReadWrite<u32, PinConfig::Register>; 32]),
        (0x780 => @END),
    }
}

register_bitfields! [u32,
    PinConfig [
        DIR OFFSET(0) NUMBITS(1) [
            Input = 0,
            Output = 1
        ],
        INPUT OFFSET(1) NUMBITS(1) [
            Connect = 0,
            Disconnect = 1
        ],
        PULL OFFSET(2) NUMBITS(2) [
            Disabled = 0,
            Pulldown = 1,
            Pullup = 3
        ]
    ]
];

pub struct Port {
    registers: &'static GpioRegisters,
}

impl Port {
    pub fn new() -> Self {
        // SAFETY: GPIO_P0_BASE is the address of the P0 register block, which
        // is valid for the whole program.
        let registers = unsafe { &*(GPIO_P0_BASE as *const GpioRegisters) };
        Self { registers }
    }

    pub fn make_input_pullup(&self, pin: usize) {
        self.registers.pin_cnf[pin]
            .write(PinConfig::DIR::Input + PinConfig::INPUT::Connect + PinConfig::PULL::Pullup);
    }

    /// Whether `pin` is configured as a connected input with pull-up.
    pub fn is_input_pullup(&self, pin: usize) -> bool {
        let cnf = &self.registers.pin_cnf[pin];
        cnf.matches_all(PinConfig::DIR::Input + PinConfig::INPUT::Connect + PinConfig::PULL::Pullup)
    }

    pub fn make_output(&self, pin: usize) {
        self.registers.pin_cnf[pin].write(PinConfig::DIR::Output + PinConfig::INPUT::Disconnect);
    }

    pub fn read(&self, pin: usize) -> bool {
        self.registers.in_.get() & (1 << pin) != 0
    }

    pub fn set(&self, pin: usize) {
        self.registers.outset.set(1 << pin);
    }

    pub fn clear(&self, pin: usize) {
        self.registers.outclr.set(1 << pin);
    }
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! The retained boot bit word.
//!
//! Two words at the top of RAM, excluded from the linker's RAM region in
//! `memory.x` so that neither the runtime nor the stack touch them. RAM keeps
//! its content across a warm reset but not across a power loss. The shadow
//! word holds the complement of the value: after a power loss the pair is
//! random and almost never consistent, which reads as zero.

use pblboot_common::hil::BootBitStore;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::register_structs;
use tock_registers::registers::ReadWrite;

/// Shared with the firmware, which maps the same address.
const RETENTION_BASE: usize = 0x2003_FFF0;

register_structs! {
    RetentionRegisters {
        (0x0 => value: ReadWrite<u32>),
        (0x4 => shadow: ReadWrite<u32>),
        (0x8 => @END),
    }
}

pub struct RetentionWord {
    registers: &'static RetentionRegisters,
}

impl RetentionWord {
    pub fn new() -> Self {
        // SAFETY: RETENTION_BASE points at RAM reserved for this purpose and
        // valid for the whole program. Nothing else in the bootloader aliases
        // it.
        let registers = unsafe { &*(RETENTION_BASE as *const RetentionRegisters) };
        Self { registers }
    }
}

impl BootBitStore for RetentionWord {
    fn read(&self) -> u32 {
        let value = self.registers.value.get();
        if value == !self.registers.shadow.get() {
            value
        } else {
            0
        }
    }

    fn write(&self, value: u32) {
        self.registers.value.set(value);
        self.registers.shadow.set(!value);
    }
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Internal flash, read through the memory map.
//!
//! Only the firmware area can be read. The bootloader's own pages are never
//! needed, and flash offset 0 would otherwise be dereferenced as a null
//! pointer.

use core::ptr;

use pblboot_common::{hil, ErrorCode};
use tock_registers::interfaces::{ReadWriteable, Readable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

const NVMC_BASE: usize = 0x4001_E000;

/// Flash offset where the firmware area starts.
const FIRMWARE_AREA_START: usize = 0x0001_0000;
/// Size of the nRF52840 flash.
const FLASH_SIZE: usize = 0x0010_0000;

register_structs! {
    NvmcRegisters {
        (0x000 => _reserved0),
        /// Ready flag
        (0x400 => ready: ReadOnly<u32, Ready::Register>),
        (0x404 => _reserved1),
        /// I-code cache configuration register
        (0x540 => icachecnf: ReadWrite<u32, CacheConfiguration::Register>),
        (0x544 => @END),
    }
}

register_bitfields! [u32,
    Ready [
        READY OFFSET(0) NUMBITS(1) [
            Busy = 0,
            Ready = 1
        ]
    ],
    CacheConfiguration [
        CACHEEN OFFSET(0) NUMBITS(1) [
            Disabled = 0,
            Enabled = 1
        ]
    ]
];

pub struct Nvmc {
    registers: &'static NvmcRegisters,
}

impl Nvmc {
    pub fn new() -> Self {
        // SAFETY: NVMC_BASE is the address of the NVMC register block, which
        // is valid for the whole program.
        let registers = unsafe { &*(NVMC_BASE as *const NvmcRegisters) };
        Self { registers }
    }

    /// Disable the instruction cache, which also invalidates it.
    pub fn disable_icache(&self) {
        self.registers
            .icachecnf
            .modify(CacheConfiguration::CACHEEN::Disabled);
    }
}

impl hil::Device for Nvmc {
    fn name(&self) -> &'static str {
        "flash"
    }

    fn is_ready(&self) -> bool {
        self.registers.ready.is_set(Ready::READY)
    }
}

impl hil::Flash for Nvmc {
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), ErrorCode> {
        let end = address.checked_add(buf.len()).ok_or(ErrorCode::INVAL)?;
        if address < FIRMWARE_AREA_START || end > FLASH_SIZE {
            return Err(ErrorCode::INVAL);
        }
        if !self.registers.ready.is_set(Ready::READY) {
            return Err(ErrorCode::BUSY);
        }

        for (offset, byte) in buf.iter_mut().enumerate() {
            // SAFETY: the range was checked to lie inside the memory mapped
            // flash, which is always readable.
            *byte = unsafe { ptr::read_volatile((address + offset) as *const u8) };
        }
        Ok(())
    }
}

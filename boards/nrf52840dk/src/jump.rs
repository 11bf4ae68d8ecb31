// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Leaving the bootloader: handing over to a firmware image, or resetting.

use cortex_m::peripheral::{MPU, NVIC, SCB, SYST};
use cortex_m::register::control::{self, Control};
use pblboot_common::hil::{Jumper, Reset};

use crate::flash::Nvmc;

/// Starts a firmware image in the state a reset would leave the core in.
pub struct CortexM<'a> {
    nvmc: &'a Nvmc,
}

impl<'a> CortexM<'a> {
    pub fn new(nvmc: &'a Nvmc) -> Self {
        Self { nvmc }
    }
}

impl Jumper for CortexM<'_> {
    fn jump(&self, address: usize) -> ! {
        cortex_m::interrupt::disable();

        // SAFETY: interrupts are disabled and nothing in the bootloader runs
        // after this point. All pointers are the architectural core
        // peripheral blocks.
        unsafe {
            let syst = &*SYST::PTR;
            syst.csr.write(0);

            let nvic = &*NVIC::PTR;
            for clear_enable in &nvic.icer {
                clear_enable.write(u32::MAX);
            }
            for clear_pending in &nvic.icpr {
                clear_pending.write(u32::MAX);
            }
            for priority in &nvic.ipr {
                priority.write(0);
            }

            let mpu = &*MPU::PTR;
            mpu.ctrl.write(0);
            let regions = (mpu._type.read() >> 8) & 0xff;
            for region in 0..regions {
                mpu.rnr.write(region);
                mpu.rasr.write(0);
                mpu.rbar.write(0);
            }

            self.nvmc.disable_icache();

            control::write(Control::from_bits(0));
            cortex_m::asm::isb();

            let scb = &*SCB::PTR;
            scb.vtor.write(address as u32);

            cortex_m::interrupt::enable();
            core::arch::asm!("cpsie f");
            cortex_m::asm::dsb();
            cortex_m::asm::isb();

            cortex_m::asm::bootload(address as *const u32)
        }
    }
}

/// Full chip reset through the SCB.
pub struct SysReset;

impl Reset for SysReset {
    fn cold_reset(&self) -> ! {
        SCB::sys_reset()
    }
}

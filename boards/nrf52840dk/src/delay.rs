// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

use pblboot_common::hil::Delay;

/// Core clock after reset.
const CPU_HZ: u32 = 64_000_000;
const CYCLES_PER_MS: u32 = CPU_HZ / 1000;

/// Busy-wait delay counting CPU cycles.
pub struct BusyDelay;

impl Delay for BusyDelay {
    fn delay_ms(&self, ms: u32) {
        for _ in 0..ms {
            cortex_m::asm::delay(CYCLES_PER_MS);
        }
    }
}

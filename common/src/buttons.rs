// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Confirming the recovery button combination.

use log::info;

use crate::hil::{Buttons, Delay};

/// Whether the recovery combo is held for `duration_ms` milliseconds.
///
/// Returns `false` straight away if the combo is not pressed, and as soon as
/// it is released during the wait. The combo is sampled once per millisecond.
pub fn prf_combo_held_for<B: Buttons, D: Delay>(buttons: &B, delay: &D, duration_ms: u32) -> bool {
    if !buttons.prf_combo_pressed() {
        return false;
    }

    info!(
        "PRF button combo detected, waiting {} ms to confirm",
        duration_ms
    );

    for _ in 0..duration_ms {
        delay.delay_ms(1);
        if !buttons.prf_combo_pressed() {
            info!("Button combo released");
            return false;
        }
    }

    true
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Battery gate.
//!
//! The device only refuses to boot on a confirmed low battery with no charger
//! attached. Failing to *measure* never blocks a boot.

use log::{error, warn};

use crate::error::ErrorCode;
use crate::hil::BatteryGauge;

/// Whether the battery state allows booting.
pub fn allow_boot<G: BatteryGauge>(gauge: &G, min_mv: u32) -> bool {
    let vbat_mv = match gauge.voltage_mv() {
        Ok(mv) => mv,
        Err(err) => {
            error!("Failed to get battery voltage ({})", err);
            return true;
        }
    };

    if vbat_mv >= min_mv {
        return true;
    }

    warn!("Battery voltage low: {} mV", vbat_mv);

    match gauge.vbus_present() {
        Ok(present) => present,
        Err(ErrorCode::NOSUPPORT) => {
            warn!("VBUS/charge status unavailable");
            true
        }
        Err(err) => {
            error!("Failed to get VBUS status ({})", err);
            true
        }
    }
}

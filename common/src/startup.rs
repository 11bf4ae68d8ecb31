// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Bring-up checks run once before any boot decision.

use log::{error, info};

use crate::error::BootError;
use crate::hil::{Device, Watchdog};

/// Check that every device in `devices` is ready. The first one that is not
/// is reported; there is no retry, as a missing device leaves no recovery
/// path either.
pub fn check_devices(devices: &[&dyn Device]) -> Result<(), BootError> {
    for device in devices {
        if !device.is_ready() {
            error!("{} device not ready", device.name());
            return Err(BootError::DeviceNotReady(device.name()));
        }
    }
    Ok(())
}

/// Start the watchdog so that a bootloader or firmware hang ends in a reset.
pub fn start_watchdog<W: Watchdog>(watchdog: &W, timeout_ms: u32) -> Result<(), BootError> {
    watchdog.start(timeout_ms).map_err(|err| {
        error!("Failed to setup watchdog ({})", err);
        BootError::Io(err)
    })?;
    info!("Watchdog started ({} ms)", timeout_ms);
    Ok(())
}

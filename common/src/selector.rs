// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Picking the image to boot.
//!
//! The main application lives in two interchangeable update slots. Which one
//! holds the newer image is decided by the header timestamps, never by the
//! slot number, so an update can be written to whichever slot is not running
//! and a failed update leaves the other one bootable.

use core::fmt;

use log::{error, info};

use crate::error::BootError;
use crate::firmware::{FirmwareHeader, FirmwareValidator};
use crate::hil::Flash;

/// A flash region that can hold a firmware image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Slot0,
    Slot1,
    /// The recovery (factory) image.
    Prf,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Slot::Slot0 => "slot0",
            Slot::Slot1 => "slot1",
            Slot::Prf => "PRF",
        })
    }
}

/// Flash offsets of the three slots, and where flash is mapped in the CPU
/// address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotLayout {
    pub slot0: usize,
    pub slot1: usize,
    pub prf: usize,
    pub flash_base: usize,
}

impl SlotLayout {
    pub fn base(&self, slot: Slot) -> usize {
        match slot {
            Slot::Slot0 => self.slot0,
            Slot::Slot1 => self.slot1,
            Slot::Prf => self.prf,
        }
    }
}

/// A validated image, ready to be jumped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Image {
    pub slot: Slot,
    pub header: FirmwareHeader,
    /// CPU address of the image's vector table.
    pub load_address: usize,
}

/// Choose between the two update slots given the timestamp of each valid one.
///
/// The newer image wins; slot0 wins ties.
pub fn newest(slot0: Option<u64>, slot1: Option<u64>) -> Option<Slot> {
    match (slot0, slot1) {
        (Some(ts0), Some(ts1)) if ts1 > ts0 => Some(Slot::Slot1),
        (Some(_), _) => Some(Slot::Slot0),
        (None, Some(_)) => Some(Slot::Slot1),
        (None, None) => None,
    }
}

/// Applies the firmware validator to the slots.
pub struct SlotSelector<'a, F: Flash, const N: usize> {
    validator: FirmwareValidator<'a, F, N>,
    layout: SlotLayout,
}

impl<'a, F: Flash, const N: usize> SlotSelector<'a, F, N> {
    pub fn new(validator: FirmwareValidator<'a, F, N>, layout: SlotLayout) -> Self {
        Self { validator, layout }
    }

    /// Validate the image in `slot` and compute where it will be loaded from.
    pub fn load(&mut self, slot: Slot) -> Result<Image, BootError> {
        let base = self.layout.base(slot);
        let header = self.validator.check(base)?;
        let load_address = self
            .layout
            .flash_base
            .checked_add(header.payload_start(base)?)
            .ok_or(BootError::InvalidRegion)?;

        Ok(Image {
            slot,
            header,
            load_address,
        })
    }

    fn probe(&mut self, slot: Slot) -> Option<Image> {
        match self.load(slot) {
            Ok(image) => {
                info!(
                    "{} firmware valid (0x{:08x}, {})",
                    slot, image.load_address, image.header.timestamp
                );
                Some(image)
            }
            Err(err) => {
                error!("{} firmware not usable: {}", slot, err);
                None
            }
        }
    }

    /// Validate both update slots and return the newest valid image, if any.
    pub fn select_best(&mut self) -> Option<Image> {
        let slot0 = self.probe(Slot::Slot0);
        let slot1 = self.probe(Slot::Slot1);

        let chosen = newest(
            slot0.map(|image| image.header.timestamp),
            slot1.map(|image| image.header.timestamp),
        )?;
        match chosen {
            Slot::Slot1 => slot1,
            _ => slot0,
        }
    }

    /// Validate the recovery slot.
    pub fn select_recovery(&mut self) -> Result<Image, BootError> {
        self.load(Slot::Prf).map_err(|err| {
            error!("PRF not found or invalid: {}", err);
            err
        })
    }
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! The per-boot decision: which image to start, or why to give up.
//!
//! There is no stored state machine. Every boot derives what happened last
//! time from the boot bits, runs the steps below exactly once, and either
//! hands over to an image or panics:
//!
//! 1. `RECOVERY_STARTING` still set: the recovery firmware crashed before it
//!    confirmed itself. Count a recovery strike; the third one in a row is
//!    fatal (`PrfUnstable`). Otherwise continue with a normal boot.
//! 2. Otherwise, `FW_STABLE` set: the firmware confirmed it runs. Forget every
//!    strike and the reset loop counter.
//! 3. Otherwise, `SOFTWARE_FAILURE_OCCURRED` set: the firmware crashed. Count
//!    a firmware strike, or request recovery once three are already counted.
//! 4. Recovery is also requested by a pending `FORCE_PRF` or by holding the
//!    button combo.
//! 5. Recovery requested: validate and start the recovery firmware.
//! 6. Otherwise count one more boot in the reset loop counter; reaching its
//!    limit is fatal (`ResetLoop`).
//! 7. Start the newest valid update slot, falling back to the recovery
//!    firmware when neither slot is valid.
//!
//! `RECOVERY_STARTING` is set as the very last step before the recovery
//! firmware is started, and only ever cleared in step 1 of the next boot.

use core::marker::PhantomData;

use log::{error, info, warn};

use crate::bootbit::{BootBits, Counter, Flag};
use crate::buttons::prf_combo_held_for;
use crate::error::BootError;
use crate::firmware::{FirmwareValidator, HeaderFetchPolicy};
use crate::hil::{BootBitStore, Buttons, Delay, Flash, Jumper};
use crate::panic::{PanicReason, PanicSink};
use crate::selector::{Image, SlotLayout, SlotSelector};
use crate::BoardConfig;

/// Outcome of [`Bootloader::decide`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootAction {
    /// Jump to this image.
    Load(Image),
    /// Stop with this reason.
    Panic(PanicReason),
}

/// The recovery orchestrator.
///
/// `N` is the size of the buffer payloads are streamed through during
/// validation.
pub struct Bootloader<'a, C, S, F, B, D, const N: usize>
where
    C: BoardConfig,
    S: BootBitStore,
    F: Flash,
    B: Buttons,
    D: Delay,
{
    bits: &'a BootBits<S>,
    selector: SlotSelector<'a, F, N>,
    buttons: &'a B,
    delay: &'a D,
    _config: PhantomData<C>,
}

impl<'a, C, S, F, B, D, const N: usize> Bootloader<'a, C, S, F, B, D, N>
where
    C: BoardConfig,
    S: BootBitStore,
    F: Flash,
    B: Buttons,
    D: Delay,
{
    pub fn new(bits: &'a BootBits<S>, flash: &'a F, buttons: &'a B, delay: &'a D) -> Self {
        let layout = SlotLayout {
            slot0: C::SLOT0_ADDR,
            slot1: C::SLOT1_ADDR,
            prf: C::PRF_ADDR,
            flash_base: C::FLASH_BASE_ADDRESS,
        };
        let policy = HeaderFetchPolicy {
            attempts: C::HEADER_FETCH_ATTEMPTS,
        };

        Self {
            bits,
            selector: SlotSelector::new(FirmwareValidator::new(flash, policy), layout),
            buttons,
            delay,
            _config: PhantomData,
        }
    }

    /// Account for a recovery firmware that did not confirm itself. Returns
    /// whether the recovery firmware is now considered unusable.
    fn record_prf_strike(&self) -> bool {
        // The crash that aborted the recovery firmware is accounted here, not
        // as a firmware strike.
        self.bits.clear(Flag::SoftwareFailureOccurred);

        let strikes = self.bits.counter(Counter::PrfFailStrike) + 1;
        warn!("Recovery firmware did not start (strike {})", strikes);
        if strikes >= Counter::PrfFailStrike.max() {
            self.bits.set_counter(Counter::PrfFailStrike, 0);
            return true;
        }
        self.bits.set_counter(Counter::PrfFailStrike, strikes);
        false
    }

    /// Account for a firmware crash. Returns whether recovery should start.
    fn record_fw_strike(&self) -> bool {
        let strikes = self.bits.counter(Counter::FwFailStrike);
        if strikes >= Counter::FwFailStrike.max() {
            warn!("Firmware failed {} times, starting recovery", strikes);
            self.bits.set_counter(Counter::FwFailStrike, 0);
            return true;
        }
        warn!("Firmware failure (strike {})", strikes + 1);
        self.bits.set_counter(Counter::FwFailStrike, strikes + 1);
        false
    }

    /// Count one boot without a stable firmware. Returns whether the limit
    /// was reached.
    fn record_boot(&self) -> bool {
        let count = self.bits.counter(Counter::ResetLoop) + 1;
        if count >= Counter::ResetLoop.max() {
            error!("Reset loop detected ({} boots)", count);
            self.bits.set_counter(Counter::ResetLoop, 0);
            return true;
        }
        self.bits.set_counter(Counter::ResetLoop, count);
        false
    }

    /// Validate the recovery firmware and mark it as starting.
    fn load_recovery(&mut self) -> Result<Image, BootError> {
        let image = self.selector.select_recovery()?;
        self.bits.set(Flag::RecoveryStarting);
        Ok(image)
    }

    /// Run the boot decision and apply its effects on the boot bits.
    pub fn decide(&mut self) -> BootAction {
        info!("Boot bits: 0x{:08x}", self.bits.raw());

        let mut recovery = false;
        if self.bits.test_and_clear(Flag::RecoveryStarting) {
            if self.record_prf_strike() {
                error!("Recovery firmware unstable");
                return BootAction::Panic(PanicReason::PrfUnstable);
            }
        } else if self.bits.test_and_clear(Flag::FwStable) {
            info!("Firmware reported stable");
            self.bits.set_counter(Counter::FwFailStrike, 0);
            self.bits.set_counter(Counter::PrfFailStrike, 0);
            self.bits.set_counter(Counter::ResetLoop, 0);
        } else if self.bits.test_and_clear(Flag::SoftwareFailureOccurred) {
            recovery = self.record_fw_strike();
        }

        if self.bits.test_and_clear(Flag::ForcePrf) {
            info!("Recovery firmware requested");
            recovery = true;
        }

        if !recovery && prf_combo_held_for(self.buttons, self.delay, C::PRF_BUTTON_COMBO_TIME_MS)
        {
            info!("Recovery firmware requested by button combo");
            recovery = true;
        }

        if recovery {
            return match self.load_recovery() {
                Ok(image) => BootAction::Load(image),
                Err(err) => BootAction::Panic(PanicReason::PrfLoadFail(err)),
            };
        }

        if self.record_boot() {
            return BootAction::Panic(PanicReason::ResetLoop);
        }

        if let Some(image) = self.selector.select_best() {
            return BootAction::Load(image);
        }

        warn!("No valid firmware found, falling back to recovery firmware");
        match self.load_recovery() {
            Ok(image) => BootAction::Load(image),
            Err(err) => BootAction::Panic(PanicReason::FwLoadFail(err)),
        }
    }

    /// Decide and act on the decision. Never returns.
    pub fn boot<J: Jumper, P: PanicSink>(&mut self, jumper: &J, panic: &P) -> ! {
        match self.decide() {
            BootAction::Load(image) => {
                info!(
                    "Booting {} firmware @ 0x{:08x} (boot bits 0x{:08x})",
                    image.slot,
                    image.load_address,
                    self.bits.raw()
                );
                jumper.jump(image.load_address)
            }
            BootAction::Panic(reason) => panic.panic(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::selector::Slot;
    use crate::test_utils::{
        catch, FakeButtons, FakeDelay, FakeFlash, FakeJumper, FakePanic, RetainedWord, Stopped,
        TestBoard, FLASH_SIZE, LAYOUT, START_OFFSET,
    };

    struct Rig {
        store: RetainedWord,
        flash: FakeFlash,
        buttons: FakeButtons,
        delay: FakeDelay,
    }

    impl Rig {
        fn new() -> Self {
            let rig = Self {
                store: RetainedWord::new(0),
                flash: FakeFlash::new(FLASH_SIZE),
                buttons: FakeButtons::new(),
                delay: FakeDelay::new(),
            };
            rig.bits().init();
            rig
        }

        fn bits(&self) -> BootBits<&RetainedWord> {
            BootBits::new(&self.store)
        }

        fn decide(&self) -> BootAction {
            let bits = self.bits();
            Bootloader::<TestBoard, _, _, _, _, 64>::new(
                &bits,
                &self.flash,
                &self.buttons,
                &self.delay,
            )
            .decide()
        }
    }

    fn loaded(action: BootAction) -> Slot {
        match action {
            BootAction::Load(image) => image.slot,
            BootAction::Panic(reason) => panic!("unexpected panic: {}", reason),
        }
    }

    #[test]
    fn normal_boot_loads_newest_slot() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.slot0, 100, b"old");
        rig.flash.write_image(LAYOUT.slot1, 200, b"new");

        assert_eq!(loaded(rig.decide()), Slot::Slot1);
        assert_eq!(rig.bits().counter(Counter::ResetLoop), 1);
        assert!(!rig.bits().test(Flag::RecoveryStarting));
    }

    #[test]
    fn stable_firmware_forgives_everything() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.slot0, 1, b"fw");
        let bits = rig.bits();
        bits.set(Flag::FwStable);
        bits.set_counter(Counter::FwFailStrike, 2);
        bits.set_counter(Counter::PrfFailStrike, 1);
        bits.set_counter(Counter::ResetLoop, 6);

        assert_eq!(loaded(rig.decide()), Slot::Slot0);
        assert!(!bits.test(Flag::FwStable));
        assert_eq!(bits.counter(Counter::FwFailStrike), 0);
        assert_eq!(bits.counter(Counter::PrfFailStrike), 0);
        // Cleared, then counted for this boot.
        assert_eq!(bits.counter(Counter::ResetLoop), 1);
    }

    #[test]
    fn firmware_crash_counts_a_strike() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.slot0, 1, b"fw");
        let bits = rig.bits();
        bits.set(Flag::SoftwareFailureOccurred);
        bits.set_counter(Counter::FwFailStrike, 1);

        assert_eq!(loaded(rig.decide()), Slot::Slot0);
        assert_eq!(bits.counter(Counter::FwFailStrike), 2);
        assert!(!bits.test(Flag::SoftwareFailureOccurred));
    }

    #[test]
    fn fourth_firmware_crash_starts_recovery() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.slot0, 1, b"fw");
        rig.flash.write_image(LAYOUT.prf, 1, b"prf");
        let bits = rig.bits();
        bits.set(Flag::SoftwareFailureOccurred);
        bits.set_counter(Counter::FwFailStrike, 3);
        bits.set_counter(Counter::ResetLoop, 2);

        assert_eq!(loaded(rig.decide()), Slot::Prf);
        assert_eq!(bits.counter(Counter::FwFailStrike), 0);
        assert!(bits.test(Flag::RecoveryStarting));
        // Recovery boots are not counted as reset loop iterations.
        assert_eq!(bits.counter(Counter::ResetLoop), 2);
    }

    #[test]
    fn recovery_crash_counts_a_recovery_strike() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.slot0, 1, b"fw");
        let bits = rig.bits();
        bits.set(Flag::RecoveryStarting);
        bits.set(Flag::SoftwareFailureOccurred);
        bits.set_counter(Counter::FwFailStrike, 1);

        assert_eq!(loaded(rig.decide()), Slot::Slot0);
        assert_eq!(bits.counter(Counter::PrfFailStrike), 1);
        assert!(!bits.test(Flag::RecoveryStarting));
        assert!(!bits.test(Flag::SoftwareFailureOccurred));
        assert_eq!(bits.counter(Counter::FwFailStrike), 1);
    }

    #[test]
    fn third_recovery_crash_is_fatal() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.slot0, 1, b"fw");
        let bits = rig.bits();
        bits.set(Flag::RecoveryStarting);
        bits.set_counter(Counter::PrfFailStrike, 2);

        assert_eq!(rig.decide(), BootAction::Panic(PanicReason::PrfUnstable));
        assert_eq!(bits.counter(Counter::PrfFailStrike), 0);
        assert!(!bits.test(Flag::RecoveryStarting));
    }

    #[test]
    fn force_prf_is_consumed() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.slot0, 1, b"fw");
        rig.flash.write_image(LAYOUT.prf, 1, b"prf");
        rig.bits().set(Flag::ForcePrf);

        assert_eq!(loaded(rig.decide()), Slot::Prf);
        assert!(!rig.bits().test(Flag::ForcePrf));

        // The recovery firmware confirms itself, next boot is a normal one.
        rig.bits().clear(Flag::RecoveryStarting);
        rig.bits().set(Flag::FwStable);
        assert_eq!(loaded(rig.decide()), Slot::Slot0);
    }

    #[test]
    fn held_button_combo_starts_recovery() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.slot0, 1, b"fw");
        rig.flash.write_image(LAYOUT.prf, 1, b"prf");
        rig.buttons.hold_combo_for(u32::MAX);

        assert_eq!(loaded(rig.decide()), Slot::Prf);
        assert_eq!(rig.delay.total_ms(), 20);
    }

    #[test]
    fn released_button_combo_boots_normally() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.slot0, 1, b"fw");
        rig.flash.write_image(LAYOUT.prf, 1, b"prf");
        rig.buttons.hold_combo_for(5);

        assert_eq!(loaded(rig.decide()), Slot::Slot0);
    }

    #[test]
    fn button_combo_is_not_sampled_when_recovery_is_already_requested() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.prf, 1, b"prf");
        rig.bits().set(Flag::ForcePrf);
        rig.buttons.hold_combo_for(u32::MAX);

        assert_eq!(loaded(rig.decide()), Slot::Prf);
        assert_eq!(rig.delay.total_ms(), 0);
    }

    #[test]
    fn seventh_unstable_boot_is_a_reset_loop() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.slot0, 1, b"fw");
        rig.bits().set_counter(Counter::ResetLoop, 6);

        assert_eq!(rig.decide(), BootAction::Panic(PanicReason::ResetLoop));
        assert_eq!(rig.bits().counter(Counter::ResetLoop), 0);
    }

    #[test]
    fn no_valid_slot_falls_back_to_recovery() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.prf, 1, b"prf");

        assert_eq!(loaded(rig.decide()), Slot::Prf);
        assert!(rig.bits().test(Flag::RecoveryStarting));
    }

    #[test]
    fn nothing_bootable_is_a_firmware_load_failure() {
        let rig = Rig::new();
        assert_eq!(
            rig.decide(),
            BootAction::Panic(PanicReason::FwLoadFail(BootError::NoValidImage))
        );
        assert!(!rig.bits().test(Flag::RecoveryStarting));
    }

    #[test]
    fn requested_recovery_that_cannot_load_is_a_recovery_load_failure() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.slot0, 1, b"fw");
        rig.flash.write_image(LAYOUT.prf, 1, b"prf");
        rig.flash.fail_reads_at(LAYOUT.prf, ErrorCode::FAIL);
        rig.bits().set(Flag::ForcePrf);

        assert_eq!(
            rig.decide(),
            BootAction::Panic(PanicReason::PrfLoadFail(BootError::Io(ErrorCode::FAIL)))
        );
        assert!(!rig.bits().test(Flag::RecoveryStarting));
    }

    #[test]
    fn boot_jumps_to_the_payload() {
        let rig = Rig::new();
        rig.flash.write_image(LAYOUT.slot1, 7, b"fw");
        let bits = rig.bits();
        let mut bootloader = Bootloader::<TestBoard, _, _, _, _, 64>::new(
            &bits,
            &rig.flash,
            &rig.buttons,
            &rig.delay,
        );

        assert_eq!(
            catch(|| bootloader.boot(&FakeJumper, &FakePanic)),
            Stopped::Jumped(LAYOUT.flash_base + LAYOUT.slot1 + START_OFFSET as usize)
        );
    }

    #[test]
    fn boot_panics_with_the_decided_reason() {
        let rig = Rig::new();
        let bits = rig.bits();
        let mut bootloader = Bootloader::<TestBoard, _, _, _, _, 64>::new(
            &bits,
            &rig.flash,
            &rig.buttons,
            &rig.delay,
        );

        assert_eq!(
            catch(|| bootloader.boot(&FakeJumper, &FakePanic)),
            Stopped::Panicked(PanicReason::FwLoadFail(BootError::NoValidImage))
        );
    }
}

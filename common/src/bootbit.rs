// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Boot bits: the state the bootloader carries from one boot to the next.
//!
//! All state lives in a single 32-bit word provided by a [`BootBitStore`]. The
//! word survives a warm reset and reads as zero after a power loss, so the
//! bootloader can tell "the last boot crashed" apart from "the battery was
//! pulled".
//!
//! Bit positions are shared with the application firmware (which sets
//! `FW_STABLE`, `SOFTWARE_FAILURE_OCCURRED` and `FORCE_PRF`). Do not renumber
//! them.
//!
//! ```text
//!  31        19 18 17 16 15 14 13   11 10  9  8  7  6  5  4  3  2  1  0
//! +------------+--+--+--+--+--+-------+--+--+--+--+-----+-----+--+--+--+
//! |  reserved  |NP|FP|  |NI|ST|  RLC  |  |SF|  |RS| PFS | FFS |UP|NA|IN|
//! +------------+--+--+--+--+--+-------+--+--+--+--+-----+-----+--+--+--+
//! ```
//!
//! Every mutation is written back to the store before the call returns.

use tock_registers::fields::Field;
use tock_registers::{register_bitfields, LocalRegisterCopy};

use crate::hil::BootBitStore;

register_bitfields![u32,
    /// Layout of the boot bit word.
    pub BootBit [
        /// Boot bits have been initialized.
        INITIALIZED OFFSET(0) NUMBITS(1) [],
        /// New firmware is available for installation.
        NEW_FW_AVAILABLE OFFSET(1) NUMBITS(1) [],
        /// Firmware update is currently in progress.
        NEW_FW_UPDATE_IN_PROGRESS OFFSET(2) NUMBITS(1) [],
        /// Consecutive main firmware start failures (0-3).
        FW_FAIL_STRIKE OFFSET(3) NUMBITS(2) [],
        /// Consecutive recovery firmware start failures (0-3).
        PRF_FAIL_STRIKE OFFSET(5) NUMBITS(2) [],
        /// Set right before jumping to the recovery firmware.
        RECOVERY_STARTING OFFSET(7) NUMBITS(1) [],
        /// The fatal error handler of the last running image fired.
        SOFTWARE_FAILURE_OCCURRED OFFSET(9) NUMBITS(1) [],
        /// Boots without a stable firmware in between (0-7).
        RESET_LOOP_CNT OFFSET(11) NUMBITS(3) [],
        /// The running firmware confirmed it is healthy.
        FW_STABLE OFFSET(14) NUMBITS(1) [],
        /// New firmware has been successfully installed.
        NEW_FW_INSTALLED OFFSET(15) NUMBITS(1) [],
        /// One-shot request to boot the recovery firmware.
        FORCE_PRF OFFSET(17) NUMBITS(1) [],
        /// New recovery firmware is available for installation.
        NEW_PRF_AVAILABLE OFFSET(18) NUMBITS(1) [],
    ]
];

type BootBitWord = LocalRegisterCopy<u32, BootBit::Register>;

/// Maximum value of the firmware failure counter.
pub const FW_FAIL_STRIKE_MAX: u8 = 3;
/// Maximum value of the recovery failure counter.
pub const PRF_FAIL_STRIKE_MAX: u8 = 3;
/// Maximum value of the reset loop counter.
pub const RESET_LOOP_CNT_MAX: u8 = 7;

/// Single-bit boot flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    Initialized,
    NewFwAvailable,
    NewFwUpdateInProgress,
    RecoveryStarting,
    SoftwareFailureOccurred,
    FwStable,
    NewFwInstalled,
    ForcePrf,
    NewPrfAvailable,
}

impl Flag {
    fn field(self) -> Field<u32, BootBit::Register> {
        match self {
            Flag::Initialized => BootBit::INITIALIZED,
            Flag::NewFwAvailable => BootBit::NEW_FW_AVAILABLE,
            Flag::NewFwUpdateInProgress => BootBit::NEW_FW_UPDATE_IN_PROGRESS,
            Flag::RecoveryStarting => BootBit::RECOVERY_STARTING,
            Flag::SoftwareFailureOccurred => BootBit::SOFTWARE_FAILURE_OCCURRED,
            Flag::FwStable => BootBit::FW_STABLE,
            Flag::NewFwInstalled => BootBit::NEW_FW_INSTALLED,
            Flag::ForcePrf => BootBit::FORCE_PRF,
            Flag::NewPrfAvailable => BootBit::NEW_PRF_AVAILABLE,
        }
    }
}

/// Multi-bit boot counters. The value is the little-endian number formed by
/// the counter's bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Counter {
    FwFailStrike,
    PrfFailStrike,
    ResetLoop,
}

impl Counter {
    fn field(self) -> Field<u32, BootBit::Register> {
        match self {
            Counter::FwFailStrike => BootBit::FW_FAIL_STRIKE,
            Counter::PrfFailStrike => BootBit::PRF_FAIL_STRIKE,
            Counter::ResetLoop => BootBit::RESET_LOOP_CNT,
        }
    }

    /// Largest value the counter can hold.
    pub fn max(self) -> u8 {
        match self {
            Counter::FwFailStrike => FW_FAIL_STRIKE_MAX,
            Counter::PrfFailStrike => PRF_FAIL_STRIKE_MAX,
            Counter::ResetLoop => RESET_LOOP_CNT_MAX,
        }
    }
}

/// Typed access to the boot bit word.
pub struct BootBits<S: BootBitStore> {
    store: S,
}

impl<S: BootBitStore> BootBits<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn load(&self) -> BootBitWord {
        LocalRegisterCopy::new(self.store.read())
    }

    fn update<F: FnOnce(&mut BootBitWord)>(&self, f: F) {
        let mut word = self.load();
        f(&mut word);
        self.store.write(word.get());
    }

    /// Mark the boot bits as initialized.
    ///
    /// If they already are, nothing changes: this is what lets the state
    /// survive a warm reset. Otherwise the word is reformatted so that only
    /// `INITIALIZED` is set.
    pub fn init(&self) {
        if !self.test(Flag::Initialized) {
            let mut word = BootBitWord::new(0);
            word.modify(BootBit::INITIALIZED::SET);
            self.store.write(word.get());
        }
    }

    pub fn test(&self, flag: Flag) -> bool {
        self.load().is_set(flag.field())
    }

    pub fn set(&self, flag: Flag) {
        self.update(|word| word.modify(flag.field().val(1)));
    }

    pub fn clear(&self, flag: Flag) {
        self.update(|word| word.modify(flag.field().val(0)));
    }

    /// Test a one-shot flag and clear it if it was set.
    ///
    /// Every flag that signals an event (rather than a level) is consumed
    /// through this, so the same event is never acted upon on two boots.
    pub fn test_and_clear(&self, flag: Flag) -> bool {
        let set = self.test(flag);
        if set {
            self.clear(flag);
        }
        set
    }

    pub fn counter(&self, counter: Counter) -> u8 {
        self.load().read(counter.field()) as u8
    }

    /// Store `value` in `counter`. Bits above the counter's width are dropped.
    pub fn set_counter(&self, counter: Counter, value: u8) {
        let value = u32::from(value & counter.max());
        self.update(|word| word.modify(counter.field().val(value)));
    }

    /// The raw word, for diagnostics.
    pub fn raw(&self) -> u32 {
        self.store.read()
    }
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! In-memory fakes of the board collaborators.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};

use crate::error::ErrorCode;
use crate::firmware::{FirmwareHeader, HEADER_MAGIC};
use crate::hil::{
    BatteryGauge, BootBitStore, Buttons, Delay, Device, Flash, Jumper, Reset, Watchdog,
};
use crate::panic::{PanicReason, PanicSink};
use crate::selector::SlotLayout;
use crate::BoardConfig;

/// Payload offset used by [`FakeFlash::write_image`].
pub const START_OFFSET: u32 = 0x20;

pub const LAYOUT: SlotLayout = SlotLayout {
    slot0: 0x1000,
    slot1: 0x3000,
    prf: 0x5000,
    flash_base: 0x0800_0000,
};

/// Size of a [`FakeFlash`] holding all of [`LAYOUT`].
pub const FLASH_SIZE: usize = 0x6000;

/// Build a valid header for `payload`.
pub fn image_header(timestamp: u64, start_offset: u32, payload: &[u8]) -> FirmwareHeader {
    FirmwareHeader {
        magic: HEADER_MAGIC,
        header_length: FirmwareHeader::SIZE as u32,
        timestamp,
        start_offset,
        length: payload.len() as u32,
        crc: crc32fast::hash(payload),
    }
}

/// How a call that never returns ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stopped {
    ColdReset,
    Jumped(usize),
    Panicked(PanicReason),
}

/// Run `f`, which must end in one of the fakes below, and report how it
/// ended.
pub fn catch<F: FnOnce()>(f: F) -> Stopped {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => panic!("diverging call returned"),
        Err(payload) => match payload.downcast::<Stopped>() {
            Ok(stopped) => *stopped,
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}

/// A retention word that counts writes.
pub struct RetainedWord {
    value: Cell<u32>,
    writes: Cell<usize>,
}

impl RetainedWord {
    pub fn new(value: u32) -> Self {
        Self {
            value: Cell::new(value),
            writes: Cell::new(0),
        }
    }

    pub fn get(&self) -> u32 {
        self.value.get()
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl BootBitStore for RetainedWord {
    fn read(&self) -> u32 {
        self.value.get()
    }

    fn write(&self, value: u32) {
        self.value.set(value);
        self.writes.set(self.writes.get() + 1);
    }
}

/// Erased flash with fault injection.
pub struct FakeFlash {
    data: RefCell<Vec<u8>>,
    reads: Cell<usize>,
    corrupt: Cell<usize>,
    fail_at: Cell<Option<(usize, ErrorCode)>>,
}

impl FakeFlash {
    pub fn new(size: usize) -> Self {
        Self {
            data: RefCell::new(vec![0xff; size]),
            reads: Cell::new(0),
            corrupt: Cell::new(0),
            fail_at: Cell::new(None),
        }
    }

    /// Write a valid image with its header at `base`.
    pub fn write_image(&self, base: usize, timestamp: u64, payload: &[u8]) {
        let header = image_header(timestamp, START_OFFSET, payload);
        self.write(base, &header.to_bytes());
        self.write(base + START_OFFSET as usize, payload);
    }

    pub fn write(&self, address: usize, bytes: &[u8]) {
        self.data.borrow_mut()[address..address + bytes.len()].copy_from_slice(bytes);
    }

    pub fn flip_byte(&self, address: usize) {
        self.data.borrow_mut()[address] ^= 0xff;
    }

    /// Number of `read` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    /// The next `count` reads succeed but return garbage.
    pub fn corrupt_next_reads(&self, count: usize) {
        self.corrupt.set(count);
    }

    /// Every read covering `address` fails with `err`.
    pub fn fail_reads_at(&self, address: usize, err: ErrorCode) {
        self.fail_at.set(Some((address, err)));
    }
}

impl Device for FakeFlash {
    fn name(&self) -> &'static str {
        "flash"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

impl Flash for FakeFlash {
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), ErrorCode> {
        self.reads.set(self.reads.get() + 1);

        let end = address.checked_add(buf.len()).ok_or(ErrorCode::INVAL)?;
        if let Some((bad, err)) = self.fail_at.get() {
            if (address..end).contains(&bad) {
                return Err(err);
            }
        }

        let data = self.data.borrow();
        let src = data.get(address..end).ok_or(ErrorCode::INVAL)?;
        buf.copy_from_slice(src);

        if self.corrupt.get() > 0 {
            self.corrupt.set(self.corrupt.get() - 1);
            buf.iter_mut().for_each(|b| *b = 0xa5);
        }
        Ok(())
    }
}

/// Buttons driven by poll counts.
pub struct FakeButtons {
    ready: Cell<bool>,
    any_after: Cell<Option<u32>>,
    combo_samples: Cell<u32>,
}

impl FakeButtons {
    pub fn new() -> Self {
        Self {
            ready: Cell::new(true),
            any_after: Cell::new(None),
            combo_samples: Cell::new(0),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.set(ready);
    }

    /// `any_pressed` reports a press from its `polls + 1`-th call on.
    pub fn press_any_after(&self, polls: u32) {
        self.any_after.set(Some(polls));
    }

    /// The combo reads as pressed for the next `samples` samples.
    pub fn hold_combo_for(&self, samples: u32) {
        self.combo_samples.set(samples);
    }
}

impl Device for FakeButtons {
    fn name(&self) -> &'static str {
        "buttons"
    }

    fn is_ready(&self) -> bool {
        self.ready.get()
    }
}

impl Buttons for FakeButtons {
    fn any_pressed(&self) -> bool {
        match self.any_after.get() {
            Some(0) => true,
            Some(n) => {
                self.any_after.set(Some(n - 1));
                false
            }
            None => false,
        }
    }

    fn prf_combo_pressed(&self) -> bool {
        let remaining = self.combo_samples.get();
        if remaining == 0 {
            return false;
        }
        self.combo_samples.set(remaining - 1);
        true
    }
}

/// Records the total time waited.
pub struct FakeDelay {
    total_ms: Cell<u32>,
}

impl FakeDelay {
    pub fn new() -> Self {
        Self {
            total_ms: Cell::new(0),
        }
    }

    pub fn total_ms(&self) -> u32 {
        self.total_ms.get()
    }
}

impl Delay for FakeDelay {
    fn delay_ms(&self, ms: u32) {
        self.total_ms.set(self.total_ms.get() + ms);
    }
}

pub struct FakeWatchdog {
    ready: Cell<bool>,
    timeout_ms: Cell<Option<u32>>,
    feeds: Cell<usize>,
    fail_start: Cell<bool>,
    fail_feeds: Cell<bool>,
}

impl FakeWatchdog {
    pub fn new() -> Self {
        Self {
            ready: Cell::new(true),
            timeout_ms: Cell::new(None),
            feeds: Cell::new(0),
            fail_start: Cell::new(false),
            fail_feeds: Cell::new(false),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.set(ready);
    }

    pub fn fail_start(&self) {
        self.fail_start.set(true);
    }

    pub fn fail_feeds(&self) {
        self.fail_feeds.set(true);
    }

    /// Timeout the watchdog was started with.
    pub fn timeout_ms(&self) -> Option<u32> {
        self.timeout_ms.get()
    }

    /// Number of successful feeds.
    pub fn feeds(&self) -> usize {
        self.feeds.get()
    }
}

impl Device for FakeWatchdog {
    fn name(&self) -> &'static str {
        "watchdog"
    }

    fn is_ready(&self) -> bool {
        self.ready.get()
    }
}

impl Watchdog for FakeWatchdog {
    fn start(&self, timeout_ms: u32) -> Result<(), ErrorCode> {
        if self.fail_start.get() {
            return Err(ErrorCode::FAIL);
        }
        self.timeout_ms.set(Some(timeout_ms));
        Ok(())
    }

    fn feed(&self) -> Result<(), ErrorCode> {
        if self.fail_feeds.get() {
            return Err(ErrorCode::FAIL);
        }
        self.feeds.set(self.feeds.get() + 1);
        Ok(())
    }
}

/// Fixed gauge readings.
pub struct FakeGauge {
    voltage_mv: Result<u32, ErrorCode>,
    vbus: Result<bool, ErrorCode>,
}

impl FakeGauge {
    pub fn new(voltage_mv: Result<u32, ErrorCode>, vbus: Result<bool, ErrorCode>) -> Self {
        Self { voltage_mv, vbus }
    }
}

impl Device for FakeGauge {
    fn name(&self) -> &'static str {
        "gauge"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

impl BatteryGauge for FakeGauge {
    fn voltage_mv(&self) -> Result<u32, ErrorCode> {
        self.voltage_mv
    }

    fn vbus_present(&self) -> Result<bool, ErrorCode> {
        self.vbus
    }
}

pub struct FakeReset;

impl Reset for FakeReset {
    fn cold_reset(&self) -> ! {
        panic::panic_any(Stopped::ColdReset)
    }
}

pub struct FakeJumper;

impl Jumper for FakeJumper {
    fn jump(&self, address: usize) -> ! {
        panic::panic_any(Stopped::Jumped(address))
    }
}

/// Stops on the first panic instead of waiting for a button.
pub struct FakePanic;

impl PanicSink for FakePanic {
    fn panic(&self, reason: PanicReason) -> ! {
        panic::panic_any(Stopped::Panicked(reason))
    }
}

/// Board constants matching [`LAYOUT`].
pub struct TestBoard;

impl BoardConfig for TestBoard {
    const SLOT0_ADDR: usize = LAYOUT.slot0;
    const SLOT1_ADDR: usize = LAYOUT.slot1;
    const PRF_ADDR: usize = LAYOUT.prf;
    const FLASH_BASE_ADDRESS: usize = LAYOUT.flash_base;
    const PRF_BUTTON_COMBO_TIME_MS: u32 = 20;
    const WATCHDOG_TIMEOUT_MS: u32 = 2000;
    const VBAT_MIN_BOOT_MV: u32 = 3500;
}

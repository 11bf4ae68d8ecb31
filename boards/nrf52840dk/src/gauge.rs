// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Battery gauge built from the SAADC and the USB regulator status.
//!
//! The DK has no fuel gauge, so the supply voltage (VDD) stands in for the
//! battery voltage.

use core::ptr;
use core::sync::atomic::{compiler_fence, Ordering};

use pblboot_common::{hil, ErrorCode};
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

const SAADC_BASE: usize = 0x4000_7000;
const POWER_BASE: usize = 0x4000_0000;

/// Busy-wait iterations before an ADC event is considered lost.
const EVENT_TIMEOUT: u32 = 100_000;

/// Full scale of a 12-bit conversion with gain 1/6 and the 0.6 V reference.
const FULL_SCALE_MV: i32 = 3600;
const FULL_SCALE_COUNTS: i32 = 4096;

register_structs! {
    SaadcRegisters {
        (0x000 => tasks_start: WriteOnly<u32>),
        (0x004 => tasks_sample: WriteOnly<u32>),
        (0x008 => tasks_stop: WriteOnly<u32>),
        (0x00C => _reserved0),
        (0x100 => events_started: ReadWrite<u32>),
        (0x104 => events_end: ReadWrite<u32>),
        (0x108 => _reserved1),
        (0x114 => events_stopped: ReadWrite<u32>),
        (0x118 => _reserved2),
        (0x500 => enable: ReadWrite<u32, Enable::Register>),
        (0x504 => _reserved3),
        /// Channel 0 positive input
        (0x510 => ch0_pselp: ReadWrite<u32, PositiveInput::Register>),
        (0x514 => ch0_pseln: ReadWrite<u32>),
        (0x518 => ch0_config: ReadWrite<u32, ChannelConfig::Register>),
        (0x51C => _reserved4),
        (0x5F0 => resolution: ReadWrite<u32, Resolution::Register>),
        (0x5F4 => oversample: ReadWrite<u32>),
        (0x5F8 => samplerate: ReadWrite<u32>),
        (0x5FC => _reserved5),
        /// EasyDMA result buffer
        (0x62C => result_ptr: ReadWrite<u32>),
        (0x630 => result_maxcnt: ReadWrite<u32>),
        (0x634 => result_amount: ReadOnly<u32>),
        (0x638 => @END),
    }
}

register_structs! {
    PowerRegisters {
        (0x000 => _reserved0),
        /// USB supply status
        (0x438 => usbregstatus: ReadOnly<u32, UsbRegStatus::Register>),
        (0x43C => @END),
    }
}

register_bitfields! [u32,
    Enable [
        ENABLE OFFSET(0) NUMBITS(1) [
            Disabled = 0,
            Enabled = 1
        ]
    ],
    PositiveInput [
        PSELP OFFSET(0) NUMBITS(5) [
            NotConnected = 0,
            VDD = 9
        ]
    ],
    ChannelConfig [
        RESP OFFSET(0) NUMBITS(2) [
            Bypass = 0
        ],
        RESN OFFSET(4) NUMBITS(2) [
            Bypass = 0
        ],
        GAIN OFFSET(8) NUMBITS(3) [
            Gain1_6 = 0
        ],
        REFSEL OFFSET(12) NUMBITS(1) [
            Internal = 0,
            VDD1_4 = 1
        ],
        TACQ OFFSET(16) NUMBITS(3) [
            us10 = 2
        ],
        MODE OFFSET(20) NUMBITS(1) [
            SE = 0,
            Diff = 1
        ],
        BURST OFFSET(24) NUMBITS(1) [
            Disabled = 0
        ]
    ],
    Resolution [
        VAL OFFSET(0) NUMBITS(3) [
            bit12 = 2
        ]
    ],
    UsbRegStatus [
        VBUSDETECT OFFSET(0) NUMBITS(1) [],
        OUTPUTRDY OFFSET(1) NUMBITS(1) []
    ]
];

pub struct Gauge {
    saadc: &'static SaadcRegisters,
    power: &'static PowerRegisters,
}

impl Gauge {
    pub fn new() -> Self {
        // SAFETY: both addresses are peripheral register blocks valid for the
        // whole program.
        let (saadc, power) = unsafe {
            (
                &*(SAADC_BASE as *const SaadcRegisters),
                &*(POWER_BASE as *const PowerRegisters),
            )
        };
        Self { saadc, power }
    }

    fn wait_for(event: &ReadWrite<u32>) -> Result<(), ErrorCode> {
        for _ in 0..EVENT_TIMEOUT {
            if event.get() != 0 {
                event.set(0);
                return Ok(());
            }
        }
        Err(ErrorCode::FAIL)
    }

    /// One conversion of VDD, in raw counts.
    fn sample_vdd(&self) -> Result<i16, ErrorCode> {
        let regs = self.saadc;
        let mut sample: i16 = 0;

        regs.enable.write(Enable::ENABLE::Enabled);
        regs.ch0_config.write(
            ChannelConfig::RESP::Bypass
                + ChannelConfig::RESN::Bypass
                + ChannelConfig::GAIN::Gain1_6
                + ChannelConfig::REFSEL::Internal
                + ChannelConfig::TACQ::us10
                + ChannelConfig::MODE::SE
                + ChannelConfig::BURST::Disabled,
        );
        regs.ch0_pselp.write(PositiveInput::PSELP::VDD);
        regs.ch0_pseln.set(0);
        regs.resolution.write(Resolution::VAL::bit12);
        regs.oversample.set(0);
        regs.samplerate.set(0);
        regs.result_ptr.set(ptr::addr_of_mut!(sample) as u32);
        regs.result_maxcnt.set(1);

        regs.events_started.set(0);
        regs.events_end.set(0);
        regs.events_stopped.set(0);

        compiler_fence(Ordering::SeqCst);
        regs.tasks_start.set(1);
        let result = Self::wait_for(&regs.events_started).and_then(|()| {
            regs.tasks_sample.set(1);
            Self::wait_for(&regs.events_end)
        });

        regs.tasks_stop.set(1);
        // Stopping can only fail if the ADC never started, keep the first error.
        let stopped = Self::wait_for(&regs.events_stopped);
        regs.ch0_pselp.write(PositiveInput::PSELP::NotConnected);
        regs.enable.write(Enable::ENABLE::Disabled);
        compiler_fence(Ordering::SeqCst);

        result.and(stopped)?;
        if regs.result_amount.get() != 1 {
            return Err(ErrorCode::FAIL);
        }
        // SAFETY: `sample` is a live local written by EasyDMA, which has
        // stopped.
        Ok(unsafe { ptr::read_volatile(ptr::addr_of!(sample)) })
    }
}

impl hil::Device for Gauge {
    fn name(&self) -> &'static str {
        "gauge"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

impl hil::BatteryGauge for Gauge {
    fn voltage_mv(&self) -> Result<u32, ErrorCode> {
        // Single-ended results can dip slightly below zero.
        let counts = i32::from(self.sample_vdd()?).max(0);
        Ok((counts * FULL_SCALE_MV / FULL_SCALE_COUNTS) as u32)
    }

    fn vbus_present(&self) -> Result<bool, ErrorCode> {
        Ok(self.power.usbregstatus.is_set(UsbRegStatus::VBUSDETECT))
    }
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Error types for the bootloader
//!
//! Two layers: [`ErrorCode`] is what a device driver reports, [`BootError`] is
//! what the boot logic reports. Only the recovery orchestrator and the board
//! startup path turn a `BootError` into a panic reason.

use core::fmt;

/// Device-level failure codes reported by the collaborator traits in
/// [`hil`](crate::hil).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    /// Generic failure condition
    FAIL = 1,
    /// Underlying system is busy; retry
    BUSY = 2,
    /// The component is powered down
    OFF = 4,
    /// An invalid parameter was passed
    INVAL = 6,
    /// Parameter passed was too large
    SIZE = 7,
    /// Operation or command is unsupported
    NOSUPPORT = 10,
    /// Device does not exist
    NODEVICE = 11,
}

impl From<ErrorCode> for u16 {
    fn from(err: ErrorCode) -> u16 {
        err as u16
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::FAIL => "generic failure",
            ErrorCode::BUSY => "busy",
            ErrorCode::OFF => "powered down",
            ErrorCode::INVAL => "invalid parameter",
            ErrorCode::SIZE => "size too large",
            ErrorCode::NOSUPPORT => "not supported",
            ErrorCode::NODEVICE => "no such device",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by the boot logic.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BootError {
    /// The underlying flash (or other device) read failed.
    Io(ErrorCode),

    /// No header with a valid magic and length was found after every
    /// configured fetch attempt.
    NoValidImage,

    /// The payload CRC does not match the header.
    CrcMismatch { computed: u32, expected: u32 },

    /// The header describes a payload outside the addressable range.
    InvalidRegion,

    /// A required device reported itself as not ready.
    DeviceNotReady(&'static str),
}

impl BootError {
    /// The 16-bit sub-code embedded in load-failure panic reasons.
    ///
    /// Format and integrity errors keep the errno values the diagnostic
    /// tooling already decodes (`EINVAL`, `EIO`, `ENODEV`, `ERANGE`); device
    /// errors are offset by `0x100` so they never collide with those.
    pub fn code(&self) -> u16 {
        match self {
            BootError::Io(err) => 0x100 + u16::from(*err),
            BootError::NoValidImage => 22,
            BootError::CrcMismatch { .. } => 5,
            BootError::InvalidRegion => 34,
            BootError::DeviceNotReady(_) => 19,
        }
    }
}

impl From<ErrorCode> for BootError {
    fn from(err: ErrorCode) -> Self {
        BootError::Io(err)
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::Io(err) => write!(f, "flash read failed ({})", err),
            BootError::NoValidImage => f.write_str("no valid firmware header"),
            BootError::CrcMismatch { computed, expected } => write!(
                f,
                "firmware CRC mismatch (calculated 0x{:08x}, expected 0x{:08x})",
                computed, expected
            ),
            BootError::InvalidRegion => f.write_str("firmware payload outside flash"),
            BootError::DeviceNotReady(name) => write!(f, "{} device not ready", name),
        }
    }
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Firmware header parsing and image validation.
//!
//! Every slot starts with a packed, little-endian header:
//!
//! ```text
//! offset  size  field
//!      0     4  magic          0x96f3b83d
//!      4     4  header_length  28
//!      8     8  timestamp      build time, larger is newer
//!     16     4  start_offset   payload offset from the slot base
//!     20     4  length         payload length in bytes
//!     24     4  crc            CRC-32 (zlib) of the payload
//! ```
//!
//! Reading the header and checking the payload follow two different retry
//! policies. A header whose magic or length is wrong is fetched again, since a
//! freshly reset flash controller can return garbage on the first reads. A
//! CRC mismatch is final: reading the same corrupted bytes again cannot help.
//! Device errors are never retried.

use log::{debug, error, info};

use crate::config::CONFIG;
use crate::error::BootError;
use crate::hil::Flash;

/// Magic value at the start of every firmware header.
pub const HEADER_MAGIC: u32 = 0x96f3_b83d;

/// Default number of header fetch attempts.
pub const DEFAULT_HEADER_FETCH_ATTEMPTS: usize = 5;

/// Parsed firmware header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FirmwareHeader {
    pub magic: u32,
    pub header_length: u32,
    pub timestamp: u64,
    pub start_offset: u32,
    pub length: u32,
    pub crc: u32,
}

impl FirmwareHeader {
    /// Size of the header in flash.
    pub const SIZE: usize = 28;

    /// Decode a header from its flash representation. No validation.
    pub fn parse(bytes: &[u8; Self::SIZE]) -> Self {
        let u32_at = |pos: usize| {
            u32::from_le_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
        };
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&bytes[8..16]);

        Self {
            magic: u32_at(0),
            header_length: u32_at(4),
            timestamp: u64::from_le_bytes(timestamp),
            start_offset: u32_at(16),
            length: u32_at(20),
            crc: u32_at(24),
        }
    }

    /// Encode the header in its flash representation.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.header_length.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.start_offset.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.length.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.crc.to_le_bytes());
        bytes
    }

    /// Whether the magic and header length match. Anything else that is
    /// wrong with the image is caught by the payload CRC.
    pub fn is_valid(&self) -> bool {
        self.magic == HEADER_MAGIC && self.header_length as usize == Self::SIZE
    }

    /// Flash offset of the first payload byte for a slot at `base`.
    pub fn payload_start(&self, base: usize) -> Result<usize, BootError> {
        base.checked_add(self.start_offset as usize)
            .ok_or(BootError::InvalidRegion)
    }
}

/// Retry policy for fetching headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderFetchPolicy {
    /// Number of reads before giving up on a header with a bad magic or
    /// length. Always at least one read is made.
    pub attempts: usize,
}

impl Default for HeaderFetchPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_HEADER_FETCH_ATTEMPTS,
        }
    }
}

/// Reads headers and checks payloads of firmware images.
///
/// `N` is the size of the buffer the payload is streamed through; payloads of
/// any length are handled in `N`-byte chunks.
pub struct FirmwareValidator<'a, F: Flash, const N: usize> {
    flash: &'a F,
    policy: HeaderFetchPolicy,
    buf: [u8; N],
}

impl<'a, F: Flash, const N: usize> FirmwareValidator<'a, F, N> {
    /// Evaluated in `new`, so a zero-sized buffer fails to compile.
    const NON_EMPTY_BUFFER: () = assert!(N > 0, "payload buffer must not be empty");

    pub fn new(flash: &'a F, policy: HeaderFetchPolicy) -> Self {
        let () = Self::NON_EMPTY_BUFFER;
        Self {
            flash,
            policy,
            buf: [0; N],
        }
    }

    /// Fetch the header of the image at `base`.
    ///
    /// A header with a bad magic or length is read again, up to the policy's
    /// number of attempts, after which `BootError::NoValidImage` is returned.
    /// A flash error aborts immediately.
    pub fn get_header(&self, base: usize) -> Result<FirmwareHeader, BootError> {
        let mut raw = [0u8; FirmwareHeader::SIZE];

        for attempt in 0..self.policy.attempts.max(1) {
            info!("Fetch header @ 0x{:08x} (retry={})", base, attempt);

            self.flash.read(base, &mut raw).map_err(|err| {
                error!("Failed to read from flash ({})", err);
                BootError::Io(err)
            })?;

            if CONFIG.debug_header_dump {
                debug!("Header bytes: {:02x?}", raw);
            }

            let header = FirmwareHeader::parse(&raw);
            if !header.is_valid() {
                if header.magic != HEADER_MAGIC {
                    error!("Invalid firmware header magic (0x{:08x})", header.magic);
                } else {
                    error!("Invalid firmware header length ({})", header.header_length);
                }
                continue;
            }

            info!(
                "Firmware header: timestamp={}, start_offset=0x{:x}, length=0x{:x}, crc=0x{:08x}",
                header.timestamp, header.start_offset, header.length, header.crc
            );
            return Ok(header);
        }

        Err(BootError::NoValidImage)
    }

    /// Check the payload of the image at `base` against `header.crc`.
    pub fn validate(&mut self, base: usize, header: &FirmwareHeader) -> Result<(), BootError> {
        let mut address = header.payload_start(base)?;
        let mut pending = header.length as usize;
        if address.checked_add(pending).is_none() {
            return Err(BootError::InvalidRegion);
        }

        let mut hasher = crc32fast::Hasher::new();
        while pending > 0 {
            let len = pending.min(N);
            let chunk = &mut self.buf[..len];
            self.flash.read(address, chunk).map_err(|err| {
                error!("Failed to read from flash ({})", err);
                BootError::Io(err)
            })?;
            hasher.update(chunk);

            pending -= len;
            address += len;
        }

        let computed = hasher.finalize();
        if computed != header.crc {
            let err = BootError::CrcMismatch {
                computed,
                expected: header.crc,
            };
            error!("{}", err);
            return Err(err);
        }

        Ok(())
    }

    /// Fetch the header at `base` and validate the payload it describes.
    pub fn check(&mut self, base: usize) -> Result<FirmwareHeader, BootError> {
        let header = self.get_header(base)?;
        self.validate(base, &header)?;
        Ok(header)
    }
}

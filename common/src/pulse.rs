// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Pulse log frames.
//!
//! Log records leave the bootloader over the UART as pulse frames, the same
//! wire format the application firmware uses, so one host tool decodes both.
//! A frame is a fixed header, the message text and a CRC-32:
//!
//! ```text
//! offset  size  field
//!      0     2  0x50 0x21   transport: push
//!      2     2  0x00 0x03   protocol: logging
//!      4     2  length      big endian, frame length minus 2, CRC excluded
//!      6     1  0x01        message type: text
//!      7    16  "PBLBOOT"   source name, NUL padded
//!     23     2  '*' '*'     log level and task
//!     25     8  timestamp   always zero
//!     33     2  line        big endian
//!     35     n  text
//!   35+n     4  crc         CRC-32 (zlib) of everything above, little endian
//! ```
//!
//! On the wire the frame is COBS encoded, encoded bytes equal to
//! [`FRAME_DELIMITER`] are replaced by `0x00`, and the result is enclosed in
//! `FRAME_DELIMITER` bytes.

use core::fmt;

use crate::error::ErrorCode;

/// Byte enclosing every frame on the wire.
pub const FRAME_DELIMITER: u8 = 0x55;

/// Length of the frame header.
pub const HEADER_LEN: usize = 35;

/// Maximum length of header plus text. Longer text is truncated.
pub const MAX_MESSAGE_LEN: usize = 256;

const CRC_LEN: usize = 4;
const MAX_FRAME_LEN: usize = MAX_MESSAGE_LEN + CRC_LEN;
const MAX_ENCODED_LEN: usize = cobs_max_encoded_len(MAX_FRAME_LEN);

/// Maximum number of bytes [`LogFrame::encode`] emits.
pub const MAX_WIRE_LEN: usize = MAX_ENCODED_LEN + 2;

const HEADER_TEMPLATE: [u8; HEADER_LEN] = [
    0x50, 0x21, // push
    0x00, 0x03, // logging
    0x00, 0x00, // length
    0x01, // text
    b'P', b'B', b'L', b'B', b'O', b'O', b'T', 0, 0, 0, 0, 0, 0, 0, 0, 0, // source
    b'*', b'*', // level, task
    0, 0, 0, 0, 0, 0, 0, 0, // timestamp
    0, 0, // line
];

/// Worst-case COBS encoded length of `len` bytes.
pub const fn cobs_max_encoded_len(len: usize) -> usize {
    len + len / 254 + 1
}

/// COBS encode `src` into `dst` and return the encoded length.
///
/// `dst` must hold at least [`cobs_max_encoded_len`]`(src.len())` bytes.
pub fn cobs_encode(dst: &mut [u8], src: &[u8]) -> Result<usize, ErrorCode> {
    if dst.len() < cobs_max_encoded_len(src.len()) {
        return Err(ErrorCode::SIZE);
    }

    let mut code: u8 = 1;
    let mut code_idx = 0;
    let mut dst_idx = 1;

    for (i, &byte) in src.iter().enumerate() {
        if byte == 0 {
            dst[code_idx] = code;
            code_idx = dst_idx;
            dst_idx += 1;
            code = 1;
        } else {
            dst[dst_idx] = byte;
            dst_idx += 1;
            code += 1;
            // A full block only opens a new one if more input follows.
            if code == 0xff && i + 1 < src.len() {
                dst[code_idx] = code;
                code_idx = dst_idx;
                dst_idx += 1;
                code = 1;
            }
        }
    }

    dst[code_idx] = code;
    Ok(dst_idx)
}

/// A log frame being built.
pub struct LogFrame {
    buf: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl LogFrame {
    pub fn new(line: u16) -> Self {
        let mut buf = [0; MAX_FRAME_LEN];
        buf[..HEADER_LEN].copy_from_slice(&HEADER_TEMPLATE);
        buf[33..35].copy_from_slice(&line.to_be_bytes());
        Self {
            buf,
            len: HEADER_LEN,
        }
    }

    /// Append message text. Carriage returns are dropped, and text beyond the
    /// frame capacity is silently discarded.
    pub fn push(&mut self, text: &[u8]) {
        for &byte in text.iter().filter(|&&b| b != b'\r') {
            if self.len == MAX_MESSAGE_LEN {
                return;
            }
            self.buf[self.len] = byte;
            self.len += 1;
        }
    }

    /// The message text pushed so far.
    pub fn text(&self) -> &[u8] {
        &self.buf[HEADER_LEN..self.len]
    }

    /// Complete the header and the CRC and return the raw frame.
    pub fn finish(&mut self) -> &[u8] {
        let length = (self.len - 2) as u16;
        self.buf[4..6].copy_from_slice(&length.to_be_bytes());

        let crc = crc32fast::hash(&self.buf[..self.len]);
        self.buf[self.len..self.len + CRC_LEN].copy_from_slice(&crc.to_le_bytes());

        &self.buf[..self.len + CRC_LEN]
    }

    /// Finish the frame and hand every byte of its wire representation to
    /// `out`.
    pub fn encode<W: FnMut(u8)>(&mut self, mut out: W) -> Result<(), ErrorCode> {
        let mut encoded = [0; MAX_ENCODED_LEN];
        let len = cobs_encode(&mut encoded, self.finish())?;

        out(FRAME_DELIMITER);
        for &byte in &encoded[..len] {
            out(if byte == FRAME_DELIMITER { 0 } else { byte });
        }
        out(FRAME_DELIMITER);
        Ok(())
    }
}

impl fmt::Write for LogFrame {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    fn encode(src: &[u8]) -> Vec<u8> {
        let mut dst = vec![0; cobs_max_encoded_len(src.len())];
        let len = cobs_encode(&mut dst, src).unwrap();
        dst.truncate(len);
        dst
    }

    fn cobs_decode(src: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < src.len() {
            let code = src[i] as usize;
            out.extend_from_slice(&src[i + 1..i + code]);
            i += code;
            if code < 0xff && i < src.len() {
                out.push(0);
            }
        }
        out
    }

    #[test]
    fn cobs_vectors() {
        assert_eq!(encode(&[]), [0x01]);
        assert_eq!(encode(&[0x00]), [0x01, 0x01]);
        assert_eq!(encode(&[0x00, 0x00]), [0x01, 0x01, 0x01]);
        assert_eq!(
            encode(&[0x11, 0x22, 0x00, 0x33]),
            [0x03, 0x11, 0x22, 0x02, 0x33]
        );
        assert_eq!(encode(&[0x11, 0x00]), [0x02, 0x11, 0x01]);
    }

    #[test]
    fn cobs_long_runs() {
        let run = [0x01u8; 254];
        let encoded = encode(&run);
        assert_eq!(encoded.len(), 255);
        assert_eq!(encoded[0], 0xff);

        let run = [0x01u8; 255];
        let encoded = encode(&run);
        assert_eq!(encoded.len(), 257);
        assert_eq!(encoded[0], 0xff);
        assert_eq!(&encoded[255..], &[0x02, 0x01]);
        assert_eq!(cobs_decode(&encoded), run);
    }

    #[test]
    fn cobs_rejects_short_destination() {
        let mut dst = [0u8; 4];
        assert_eq!(cobs_encode(&mut dst, &[1, 2, 3, 4]), Err(ErrorCode::SIZE));
    }

    #[test]
    fn frame_header() {
        let mut frame = LogFrame::new(0x0102);
        write!(frame, "boot {}", 42).unwrap();
        let raw = frame.finish().to_vec();

        assert_eq!(raw.len(), HEADER_LEN + 7 + 4);
        assert_eq!(&raw[0..4], &[0x50, 0x21, 0x00, 0x03]);
        assert_eq!(&raw[4..6], &[0x00, (HEADER_LEN + 7 - 2) as u8]);
        assert_eq!(raw[6], 1);
        assert_eq!(&raw[7..23], b"PBLBOOT\0\0\0\0\0\0\0\0\0");
        assert_eq!(&raw[23..25], b"**");
        assert_eq!(&raw[33..35], &[0x01, 0x02]);
        assert_eq!(&raw[35..42], b"boot 42");

        let crc = crc32fast::hash(&raw[..42]);
        assert_eq!(&raw[42..], &crc.to_le_bytes());
    }

    #[test]
    fn text_is_truncated_and_carriage_returns_dropped() {
        let mut frame = LogFrame::new(0);
        frame.push(b"a\r\nb");
        assert_eq!(frame.text(), b"a\nb");

        frame.push(&[b'x'; 400]);
        assert_eq!(frame.text().len(), MAX_MESSAGE_LEN - HEADER_LEN);
        assert_eq!(frame.finish().len(), MAX_MESSAGE_LEN + 4);
    }

    #[test]
    fn wire_format_has_delimiters_only_at_the_ends() {
        let mut frame = LogFrame::new(7);
        frame.push(b"UUUU wrapped in 0x55");
        let raw = frame.finish().to_vec();

        let mut wire = Vec::new();
        frame.encode(|b| wire.push(b)).unwrap();

        assert_eq!(wire.first(), Some(&FRAME_DELIMITER));
        assert_eq!(wire.last(), Some(&FRAME_DELIMITER));
        let body = &wire[1..wire.len() - 1];
        assert!(!body.contains(&FRAME_DELIMITER));
        assert!(wire.len() <= MAX_WIRE_LEN);

        let unescaped: Vec<u8> = body
            .iter()
            .map(|&b| if b == 0 { FRAME_DELIMITER } else { b })
            .collect();
        assert_eq!(cobs_decode(&unescaped), raw);
    }
}

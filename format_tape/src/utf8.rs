// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Code point codec for `U`.
//!
//! This is the original, pre-RFC 3629 form of UTF-8: sequences of up to six bytes covering
//! `0..=0x7fff_ffff`, with surrogates accepted.

use alloc::format;

use crate::error::FormatError;

/// Largest encodable code point.
pub(crate) const MAX_CODE_POINT: u32 = 0x7fff_ffff;

/// Smallest value that needs a sequence of `n + 1` bytes.
const LIMITS: [u32; 6] = [0x0, 0x80, 0x800, 0x1_0000, 0x20_0000, 0x400_0000];

/// Encodes `code_point` into `buf`, returning the sequence length.
pub(crate) fn encode(code_point: u32, buf: &mut [u8; 6]) -> Result<usize, FormatError> {
    if code_point < 0x80 {
        buf[0] = code_point as u8;
        return Ok(1);
    }
    let len = match code_point {
        0x80..=0x7ff => 2,
        0x800..=0xffff => 3,
        0x1_0000..=0x1f_ffff => 4,
        0x20_0000..=0x3ff_ffff => 5,
        0x400_0000..=MAX_CODE_POINT => 6,
        _ => return Err(out_of_range()),
    };
    let mut rest = code_point;
    for b in buf[1..len].iter_mut().rev() {
        *b = 0x80 | (rest & 0x3f) as u8;
        rest >>= 6;
    }
    let lead_mark = !(0xff_u8 >> len);
    buf[0] = lead_mark | rest as u8;
    Ok(len)
}

pub(crate) fn out_of_range() -> FormatError {
    FormatError::Range("pack(U): value out of range".into())
}

fn malformed() -> FormatError {
    FormatError::cant_convert("malformed UTF-8 character")
}

/// Decodes one code point from the front of a non-empty `input`.
///
/// Returns the code point and the sequence length.
pub(crate) fn decode(input: &[u8]) -> Result<(u32, usize), FormatError> {
    let lead = input[0];
    if lead & 0x80 == 0 {
        return Ok((u32::from(lead), 1));
    }
    let len = (lead.leading_ones()) as usize;
    if !(2..=6).contains(&len) {
        return Err(malformed());
    }
    if len > input.len() {
        return Err(FormatError::CantConvert(format!(
            "malformed UTF-8 character (expected {len} bytes, given {} bytes)",
            input.len()
        )));
    }

    let mut code_point = u32::from(lead & (0x7f >> len));
    for &b in &input[1..len] {
        if b & 0xc0 != 0x80 {
            return Err(malformed());
        }
        code_point = (code_point << 6) | u32::from(b & 0x3f);
    }
    if code_point < LIMITS[len - 1] {
        return Err(FormatError::cant_convert("redundant UTF-8 sequence"));
    }
    Ok((code_point, len))
}

// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-width integer and BER codecs.
//!
//! Floats go through the integer codec as their IEEE-754 bit patterns.

use alloc::vec::Vec;

use num_bigint::{BigInt, BigUint};
use num_traits::Zero;

use crate::directive::{ByteOrder, IntWidth};
use crate::error::FormatError;
use crate::value::Integer;

/// An encoded fixed-width integer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IntBytes {
    bytes: [u8; 8],
    len: usize,
}

impl IntBytes {
    /// The encoded bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Encodes the low `width` bits of `value` in `order`.
#[must_use]
pub fn encode_u64(value: u64, width: IntWidth, order: ByteOrder) -> IntBytes {
    let len = width.bytes();
    let mut bytes = [0_u8; 8];
    match order {
        ByteOrder::Little => bytes[..len].copy_from_slice(&value.to_le_bytes()[..len]),
        ByteOrder::Big => bytes[..len].copy_from_slice(&value.to_be_bytes()[8 - len..]),
    }
    IntBytes { bytes, len }
}

/// Decodes up to eight bytes in `order` as an unsigned value.
#[must_use]
pub fn decode_u64(bytes: &[u8], order: ByteOrder) -> u64 {
    debug_assert!(bytes.len() <= 8, "integer wider than 64 bits");
    let mut value = 0_u64;
    match order {
        ByteOrder::Big => {
            for &b in bytes {
                value = (value << 8) | u64::from(b);
            }
        }
        ByteOrder::Little => {
            for &b in bytes.iter().rev() {
                value = (value << 8) | u64::from(b);
            }
        }
    }
    value
}

/// Sign-extends the low `width` bits of `value`.
#[must_use]
pub fn sign_extend(value: u64, width: IntWidth) -> i64 {
    let shift = 64 - width.bits();
    ((value << shift) as i64) >> shift
}

/// Decodes a fixed-width integer, sign-extending when `signed`.
#[must_use]
pub fn decode_integer(bytes: &[u8], width: IntWidth, signed: bool, order: ByteOrder) -> Integer {
    let raw = decode_u64(bytes, order);
    if signed {
        Integer::Small(sign_extend(raw, width))
    } else {
        Integer::from_u64(raw)
    }
}

/// Appends the BER (base-128, high bit = continuation) encoding of `value` to `out`.
pub fn encode_ber(value: &Integer, out: &mut Vec<u8>) -> Result<(), FormatError> {
    if value.is_negative() {
        return Err(FormatError::CantCompressNegative);
    }
    let first = out.len();
    match value {
        Integer::Small(v) => {
            let mut v = v.unsigned_abs();
            loop {
                out.push((v & 0x7f) as u8);
                v >>= 7;
                if v == 0 {
                    break;
                }
            }
        }
        Integer::Big(v) => {
            let (_, digits) = v.to_radix_le(128);
            out.extend_from_slice(&digits);
        }
    }
    out[first..].reverse();
    let last = out.len() - 1;
    for b in &mut out[first..last] {
        *b |= 0x80;
    }
    Ok(())
}

/// Decodes one BER integer from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` if `bytes` ends inside the
/// encoding.
#[must_use]
pub fn decode_ber(bytes: &[u8]) -> Option<(Integer, usize)> {
    let len = bytes.iter().position(|b| b & 0x80 == 0)? + 1;
    let digits = &bytes[..len];

    let mut small = 0_u64;
    let mut fits = true;
    for &d in digits {
        if small >> 57 != 0 {
            fits = false;
            break;
        }
        small = (small << 7) | u64::from(d & 0x7f);
    }
    if fits {
        return Some((Integer::from_u64(small), len));
    }

    let stripped: Vec<u8> = digits.iter().map(|d| d & 0x7f).collect();
    let big = BigUint::from_radix_be(&stripped, 128).unwrap_or_else(BigUint::zero);
    Some((Integer::normalize(BigInt::from(big)), len))
}

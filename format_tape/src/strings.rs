// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary, bit, and hex string codecs.

use alloc::vec::Vec;

use crate::directive::{BitOrder, NibbleOrder};

/// Strips trailing spaces and/or NULs.
pub(crate) fn trim_trailing(bytes: &[u8], spaces: bool, nulls: bool) -> &[u8] {
    let keep = bytes
        .iter()
        .rposition(|&b| !((spaces && b == b' ') || (nulls && b == 0)))
        .map_or(0, |i| i + 1);
    &bytes[..keep]
}

/// Truncates at the first NUL, if any.
pub(crate) fn to_first_null(bytes: &[u8]) -> &[u8] {
    memchr::memchr(0, bytes).map_or(bytes, |i| &bytes[..i])
}

/// Packs `len` bits taken from the low bit of each byte of `input` (`B` / `b`).
///
/// When `len` exceeds the input, the missing bits are not synthesized; instead
/// `(len - input.len() + 1) / 2` NUL bytes are appended.
pub(crate) fn pack_bits(input: &[u8], len: usize, order: BitOrder, out: &mut Vec<u8>) {
    let mut padding = 0;
    let len = if len > input.len() {
        padding = (len - input.len() + 1) / 2;
        input.len()
    } else {
        len
    };

    let mut byte = 0_u8;
    for (i, &c) in input[..len].iter().enumerate() {
        let bit = c & 1;
        let filled = (i + 1) % 8 == 0;
        match order {
            BitOrder::MsbFirst => {
                byte |= bit;
                if filled {
                    out.push(byte);
                    byte = 0;
                } else {
                    byte <<= 1;
                }
            }
            BitOrder::LsbFirst => {
                byte |= bit << 7;
                if filled {
                    out.push(byte);
                    byte = 0;
                } else {
                    byte >>= 1;
                }
            }
        }
    }
    let rest = len % 8;
    if rest != 0 {
        let shift = 7 - rest;
        out.push(match order {
            BitOrder::MsbFirst => byte << shift,
            BitOrder::LsbFirst => byte >> shift,
        });
    }
    out.resize(out.len() + padding, 0);
}

fn nibble(c: u8) -> u8 {
    if c.is_ascii_alphabetic() {
        ((c & 15) + 9) & 15
    } else {
        c & 15
    }
}

/// Packs `len` hex digits from `input` (`H` / `h`).
///
/// Letters map through `(c & 15) + 9`, so non-hex letters are accepted without error. When `len`
/// exceeds the input, `(len + 1) / 2 - (input.len() + 1) / 2` NUL bytes are appended.
pub(crate) fn pack_hex(input: &[u8], len: usize, order: NibbleOrder, out: &mut Vec<u8>) {
    let mut padding = 0;
    let len = if len > input.len() {
        padding = (len + 1) / 2 - (input.len() + 1) / 2;
        input.len()
    } else {
        len
    };

    let mut byte = 0_u8;
    for (i, &c) in input[..len].iter().enumerate() {
        let n = nibble(c);
        let second = i % 2 == 1;
        match order {
            NibbleOrder::HighFirst => {
                byte |= n;
                if second {
                    out.push(byte);
                    byte = 0;
                } else {
                    byte <<= 4;
                }
            }
            NibbleOrder::LowFirst => {
                byte |= n << 4;
                if second {
                    out.push(byte);
                    byte = 0;
                } else {
                    byte >>= 4;
                }
            }
        }
    }
    if len % 2 == 1 {
        out.push(byte);
    }
    out.resize(out.len() + padding, 0);
}

/// Unpacks `len` bits from `input` as ASCII `0`/`1`.
pub(crate) fn unpack_bits(input: &[u8], len: usize, order: BitOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let byte = input[i / 8];
        let bit = match order {
            BitOrder::MsbFirst => (byte >> (7 - i % 8)) & 1,
            BitOrder::LsbFirst => (byte >> (i % 8)) & 1,
        };
        out.push(b'0' + bit);
    }
    out
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Unpacks `len` nibbles from `input` as lowercase hex digits.
pub(crate) fn unpack_hex(input: &[u8], len: usize, order: NibbleOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let byte = input[i / 2];
        let high = i % 2 == 0;
        let n = match (order, high) {
            (NibbleOrder::HighFirst, true) | (NibbleOrder::LowFirst, false) => byte >> 4,
            (NibbleOrder::HighFirst, false) | (NibbleOrder::LowFirst, true) => byte & 15,
        };
        out.push(HEX_DIGITS[usize::from(n)]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trimming() {
        assert_eq!(trim_trailing(b"AB \0 ", true, true), b"AB");
        assert_eq!(trim_trailing(b"AB \0", false, true), b"AB ");
        assert_eq!(trim_trailing(b"  ", true, false), b"");
        assert_eq!(to_first_null(b"ab\0cd"), b"ab");
        assert_eq!(to_first_null(b"ab"), b"ab");
    }

    #[test]
    fn bits_in_both_orders() {
        let mut out = Vec::new();
        pack_bits(b"10000000", 8, BitOrder::MsbFirst, &mut out);
        pack_bits(b"10000000", 8, BitOrder::LsbFirst, &mut out);
        pack_bits(b"101", 3, BitOrder::MsbFirst, &mut out);
        assert_eq!(out, [0x80, 0x01, 0xa0]);
        assert_eq!(unpack_bits(&[0xa0], 3, BitOrder::MsbFirst), b"101");
        assert_eq!(unpack_bits(&[0x01], 2, BitOrder::LsbFirst), b"10");
    }

    #[test]
    fn bits_pad_when_short() {
        let mut out = Vec::new();
        pack_bits(b"1", 5, BitOrder::MsbFirst, &mut out);
        assert_eq!(out, [0x80, 0x00, 0x00]);
    }

    #[test]
    fn hex_in_both_orders() {
        let mut out = Vec::new();
        pack_hex(b"a1", 2, NibbleOrder::HighFirst, &mut out);
        pack_hex(b"a1", 2, NibbleOrder::LowFirst, &mut out);
        pack_hex(b"f", 1, NibbleOrder::HighFirst, &mut out);
        assert_eq!(out, [0xa1, 0x1a, 0xf0]);
        assert_eq!(unpack_hex(&[0xa1, 0xf0], 3, NibbleOrder::HighFirst), b"a1f");
        assert_eq!(unpack_hex(&[0x1a], 2, NibbleOrder::LowFirst), b"a1");
    }

    #[test]
    fn hex_pads_when_short() {
        let mut out = Vec::new();
        pack_hex(b"1", 6, NibbleOrder::HighFirst, &mut out);
        assert_eq!(out, [0x10, 0x00, 0x00]);
    }
}

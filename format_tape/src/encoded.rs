// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Text encodings for byte strings: uuencode (`u`), base64 (`m`), and quoted-printable (`M`).

use alloc::vec::Vec;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::FormatError;

const UU_PAD: u8 = b'`';

fn uu_char(sextet: u8) -> u8 {
    if sextet == 0 { UU_PAD } else { sextet + b' ' }
}

/// Uuencodes `input` in lines of at most `line` input bytes, each ending in `\n`.
pub(crate) fn uu_encode(input: &[u8], line: usize, out: &mut Vec<u8>) {
    debug_assert!(line > 0 && line <= 63, "uuencode line length out of range");
    for chunk in input.chunks(line) {
        out.push(chunk.len() as u8 + b' ');
        for group in chunk.chunks(3) {
            let b0 = group[0];
            let b1 = group.get(1).copied().unwrap_or(0);
            let b2 = group.get(2).copied().unwrap_or(0);
            out.push(uu_char(b0 >> 2));
            out.push(uu_char(((b0 << 4) & 0x30) | (b1 >> 4)));
            if group.len() > 1 {
                out.push(uu_char(((b1 << 2) & 0x3c) | (b2 >> 6)));
            } else {
                out.push(UU_PAD);
            }
            if group.len() > 2 {
                out.push(uu_char(b2 & 0x3f));
            } else {
                out.push(UU_PAD);
            }
        }
        out.push(b'\n');
    }
}

fn uu_sextet(input: &[u8], pos: &mut usize) -> u8 {
    match input.get(*pos) {
        Some(&c) if (b' '..b'a').contains(&c) => {
            *pos += 1;
            (c - b' ') & 0x3f
        }
        _ => 0,
    }
}

/// Decodes uuencoded lines from the front of `input`.
///
/// Returns the decoded bytes and how much of `input` was consumed. Decoding stops at the first
/// line whose length byte is not a uuencode character.
pub(crate) fn uu_decode(input: &[u8]) -> (Vec<u8>, usize) {
    let capacity = input.len() * 3 / 4;
    let mut out = Vec::with_capacity(capacity);
    let mut pos = 0;

    while let Some(&c) = input.get(pos) {
        if !(c > b' ' && c < b'a') {
            break;
        }
        pos += 1;
        let mut len = usize::from((c - b' ') & 0x3f);
        len = len.min(capacity - out.len());

        while len > 0 {
            let a = uu_sextet(input, &mut pos);
            let b = uu_sextet(input, &mut pos);
            let c = uu_sextet(input, &mut pos);
            let d = uu_sextet(input, &mut pos);
            let hunk = [(a << 2) | (b >> 4), (b << 4) | (c >> 2), (c << 6) | d];
            let take = len.min(3);
            out.extend_from_slice(&hunk[..take]);
            len -= take;
        }

        if input.get(pos).is_some_and(|&c| c != b'\r' && c != b'\n') {
            pos += 1;
        }
        if input.get(pos) == Some(&b'\r') {
            pos += 1;
        }
        if input.get(pos) == Some(&b'\n') {
            pos += 1;
        }
    }
    (out, pos)
}

/// Base64-encodes `input`.
///
/// With `line`, the input is split into lines of `line` bytes, each followed by `\n`. Without,
/// the output is a single unterminated line.
pub(crate) fn base64_encode(input: &[u8], line: Option<usize>, out: &mut Vec<u8>) {
    let Some(line) = line else {
        out.extend_from_slice(STANDARD.encode(input).as_bytes());
        return;
    };
    for chunk in input.chunks(line) {
        out.extend_from_slice(STANDARD.encode(chunk).as_bytes());
        out.push(b'\n');
    }
}

/// Decodes canonical, unwrapped base64 (`m0`).
pub(crate) fn base64_decode_strict(input: &[u8]) -> Result<Vec<u8>, FormatError> {
    STANDARD
        .decode(input)
        .map_err(|_| FormatError::cant_convert("invalid base64"))
}

fn base64_sextet(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a' + 26),
        b'0'..=b'9' => Some(c - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decodes base64 leniently: bytes outside the alphabet are skipped, and decoding stops at the
/// first `=` seen after two or more digits of a quantum.
///
/// Returns the decoded bytes and how much of `input` was consumed.
pub(crate) fn base64_decode_lenient(input: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(input.len() * 3 / 4);
    let mut quantum = [0_u8; 4];
    let mut have = 0;
    let mut pos = 0;

    while let Some(&c) = input.get(pos) {
        if c == b'=' && have >= 2 {
            break;
        }
        pos += 1;
        let Some(sextet) = base64_sextet(c) else {
            continue;
        };
        quantum[have] = sextet;
        have += 1;
        if have == 4 {
            let [a, b, c, d] = quantum;
            out.extend_from_slice(&[(a << 2) | (b >> 4), (b << 4) | (c >> 2), (c << 6) | d]);
            have = 0;
        }
    }

    let [a, b, c, _] = quantum;
    match have {
        2 => out.push((a << 2) | (b >> 4)),
        3 => out.extend_from_slice(&[(a << 2) | (b >> 4), (b << 4) | (c >> 2)]),
        _ => {}
    }
    (out, pos)
}

const QP_HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Quoted-printable encodes `input`, inserting a soft line break once a line exceeds `line`
/// characters.
pub(crate) fn qp_encode(input: &[u8], line: usize, out: &mut Vec<u8>) {
    let mut column = 0;
    let mut prev = None;

    for &c in input {
        if c > 126 || (c < 32 && c != b'\n' && c != b'\t') || c == b'=' {
            out.extend_from_slice(&[
                b'=',
                QP_HEX[usize::from(c >> 4)],
                QP_HEX[usize::from(c & 15)],
            ]);
            column += 3;
            prev = None;
        } else if c == b'\n' {
            if matches!(prev, Some(b' ' | b'\t')) {
                out.extend_from_slice(b"=\n");
            }
            out.push(c);
            column = 0;
            prev = Some(c);
        } else {
            out.push(c);
            column += 1;
            prev = Some(c);
        }
        if column > line {
            out.extend_from_slice(b"=\n");
            column = 0;
            prev = Some(b'\n');
        }
    }
    if column > 0 {
        out.extend_from_slice(b"=\n");
    }
}

fn hex_value(c: u8) -> Option<u8> {
    char::from(c).to_digit(16).map(|d| d as u8)
}

/// Decodes quoted-printable text. Malformed escapes stop decoding; the rest of the input is
/// then copied through verbatim.
pub(crate) fn qp_decode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut pos = 0;
    let mut copied_to = 0;

    while pos < input.len() {
        if input[pos] == b'=' {
            pos += 1;
            if pos == input.len() {
                break;
            }
            if input[pos] == b'\r' && input.get(pos + 1) == Some(&b'\n') {
                pos += 1;
            }
            if input[pos] != b'\n' {
                let Some(high) = hex_value(input[pos]) else {
                    break;
                };
                pos += 1;
                let Some(low) = input.get(pos).copied().and_then(hex_value) else {
                    break;
                };
                out.push((high << 4) | low);
            }
        } else {
            out.push(input[pos]);
        }
        pos += 1;
        copied_to = pos;
    }
    out.extend_from_slice(&input[copied_to..]);
    out
}

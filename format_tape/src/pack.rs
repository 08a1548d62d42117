// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pack direction: operations, tree builder, and evaluation state.

use alloc::borrow::Cow;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::builder::{BuildConfig, SequenceStack, apply_count};
use crate::codec;
use crate::directive::{
    BitOrder, ByteOrder, Count, Directive, DirectiveKind, FloatWidth, IntWidth, NibbleOrder,
};
use crate::encoded;
use crate::encoding::Encoding;
use crate::error::FormatError;
use crate::host::{PackHost, StrConversion};
use crate::node::{Machine, Node};
use crate::parser::{DirectiveSink, Mode};
use crate::state::{ByteOutput, Cursor, Ticker};
use crate::strings;
use crate::trace::{LoopKind, TraceMask, TraceSink};
use crate::utf8;

/// A leaf operation of a pack tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PackOp {
    /// Converts the next value to an integer and writes its low `width` bits.
    WriteInteger {
        /// Width.
        width: IntWidth,
        /// Byte order.
        order: ByteOrder,
    },
    /// Converts the next value to a float and writes its bit pattern.
    WriteFloat {
        /// Width.
        width: FloatWidth,
        /// Byte order.
        order: ByteOrder,
    },
    /// Writes the next value as a UTF-8 code point.
    WriteUtf8Char,
    /// Writes the next value as a BER-compressed integer.
    WriteBer,
    /// Writes the next string value, padded or truncated to `width`.
    WriteBinaryString {
        /// Field width when not `take_all`.
        width: usize,
        /// Padding byte.
        pad: u8,
        /// Write the whole string regardless of `width`.
        take_all: bool,
        /// Append a NUL after the string.
        append_null: bool,
    },
    /// Packs a string of `0`/`1` characters into bits.
    WriteBitString {
        /// Bit order.
        order: BitOrder,
        /// Bit count; `None` takes the whole string.
        len: Option<usize>,
    },
    /// Packs a string of hex digits into nibbles.
    WriteHexString {
        /// Nibble order.
        order: NibbleOrder,
        /// Digit count; `None` takes the whole string.
        len: Option<usize>,
    },
    /// Uuencodes the next string value.
    WriteUuString {
        /// Input bytes per line.
        line: usize,
    },
    /// Base64-encodes the next string value.
    WriteBase64String {
        /// Input bytes per line; `None` writes a single unterminated line.
        line: Option<usize>,
    },
    /// Quoted-printable encodes the next value's text.
    WriteMimeString {
        /// Maximum line length.
        line: usize,
    },
    /// Pins the next string value and writes its address.
    WritePointer {
        /// Minimum string length (`P`).
        min_length: Option<usize>,
    },
    /// `@`: moves the output cursor to an absolute position.
    SetOutputPosition(usize),
    /// `X`: moves the output cursor back one byte.
    ReverseOutputPosition,
    /// `x`: writes NUL bytes.
    WriteNullBytes(usize),
}

impl PackOp {
    /// Short mnemonic used in traces and disassembly.
    #[must_use]
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::WriteInteger { .. } => "write_int",
            Self::WriteFloat { .. } => "write_float",
            Self::WriteUtf8Char => "write_utf8",
            Self::WriteBer => "write_ber",
            Self::WriteBinaryString { .. } => "write_str",
            Self::WriteBitString { .. } => "write_bits",
            Self::WriteHexString { .. } => "write_hex",
            Self::WriteUuString { .. } => "write_uu",
            Self::WriteBase64String { .. } => "write_base64",
            Self::WriteMimeString { .. } => "write_qp",
            Self::WritePointer { .. } => "write_ptr",
            Self::SetOutputPosition(_) => "set_pos",
            Self::ReverseOutputPosition => "back",
            Self::WriteNullBytes(_) => "write_nul",
        }
    }
}

impl fmt::Display for PackOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())?;
        match self {
            Self::WriteInteger { width, order } => {
                write!(f, " {} {}", width.bits(), order.mnemonic())
            }
            Self::WriteFloat { width, order } => {
                write!(f, " {} {}", width.int_width().bits(), order.mnemonic())
            }
            Self::WriteBinaryString {
                width,
                pad,
                take_all,
                append_null,
            } => {
                if *take_all {
                    f.write_str(" all")?;
                } else {
                    write!(f, " width={width} pad=0x{pad:02x}")?;
                }
                if *append_null {
                    f.write_str(" +nul")?;
                }
                Ok(())
            }
            Self::WriteBitString { order, len } => {
                write!(f, " {order:?}")?;
                write_len(f, *len)
            }
            Self::WriteHexString { order, len } => {
                write!(f, " {order:?}")?;
                write_len(f, *len)
            }
            Self::WriteUuString { line } | Self::WriteMimeString { line } => {
                write!(f, " line={line}")
            }
            Self::WriteBase64String { line } => match line {
                Some(line) => write!(f, " line={line}"),
                None => f.write_str(" strict"),
            },
            Self::WritePointer { min_length } => match min_length {
                Some(min) => write!(f, " min={min}"),
                None => Ok(()),
            },
            Self::SetOutputPosition(n) | Self::WriteNullBytes(n) => write!(f, " {n}"),
            Self::WriteUtf8Char | Self::WriteBer | Self::ReverseOutputPosition => Ok(()),
        }
    }
}

pub(crate) fn write_len(f: &mut fmt::Formatter<'_>, len: Option<usize>) -> fmt::Result {
    match len {
        Some(len) => write!(f, " len={len}"),
        None => f.write_str(" len=*"),
    }
}

/// Builds a pack tree from parser events.
#[derive(Debug)]
pub struct PackBuilder {
    config: BuildConfig,
    sequences: SequenceStack<PackOp>,
    encoding: Encoding,
}

impl PackBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            sequences: SequenceStack::new(),
            encoding: Encoding::Default,
        }
    }

    /// Returns the root node and the result encoding.
    pub fn finish(self) -> Result<(Node<PackOp>, Encoding), FormatError> {
        Ok((self.sequences.finish()?, self.encoding))
    }

    fn unify(&mut self, encoding: Encoding) {
        self.encoding = self.encoding.unify(encoding);
    }

    fn push_counted(&mut self, count: Count, op: PackOp) {
        let node = apply_count(count, Node::Op(op), &self.config);
        self.sequences.push(node);
    }

    fn push(&mut self, op: PackOp) {
        self.sequences.push(Node::Op(op));
    }
}

/// `u` line length in input bytes.
fn uu_line(count: Count) -> usize {
    match count.or_none(1).unwrap_or(0) {
        n if n <= 2 => 45,
        n if n > 63 => 63,
        n => n / 3 * 3,
    }
}

/// `m` line length in input bytes; `None` for the strict single-line form `m0`.
fn base64_line(count: Count) -> Option<usize> {
    match count {
        Count::Explicit(0) => None,
        Count::Explicit(n) if n > 2 => Some(n / 3 * 3),
        _ => Some(45),
    }
}

fn mime_line(count: Count) -> usize {
    match count {
        Count::Explicit(n) if n > 1 => n,
        _ => 72,
    }
}

impl DirectiveSink for PackBuilder {
    type Error = FormatError;

    fn mode(&self) -> Mode {
        Mode::Pack
    }

    fn directive(&mut self, directive: Directive) -> Result<(), FormatError> {
        let Directive { kind, count } = directive;
        match kind {
            DirectiveKind::Integer { width, order, .. } => {
                self.push_counted(count, PackOp::WriteInteger { width, order });
            }
            DirectiveKind::Float { width, order } => {
                self.push_counted(count, PackOp::WriteFloat { width, order });
            }
            DirectiveKind::Utf8Char => {
                self.unify(Encoding::Utf8);
                self.push_counted(count, PackOp::WriteUtf8Char);
            }
            DirectiveKind::BerInteger => self.push_counted(count, PackOp::WriteBer),
            DirectiveKind::StringSpacePadded
            | DirectiveKind::StringNullPadded
            | DirectiveKind::StringNullStar => {
                self.unify(Encoding::Binary);
                let pad = if kind == DirectiveKind::StringSpacePadded {
                    b' '
                } else {
                    0
                };
                self.push(PackOp::WriteBinaryString {
                    width: count.or_none(1).unwrap_or(1),
                    pad,
                    take_all: count.is_star(),
                    append_null: count.is_star() && kind == DirectiveKind::StringNullStar,
                });
            }
            DirectiveKind::BitString(order) => self.push(PackOp::WriteBitString {
                order,
                len: count.or_none(1),
            }),
            DirectiveKind::HexString(order) => self.push(PackOp::WriteHexString {
                order,
                len: count.or_none(1),
            }),
            DirectiveKind::UuString => {
                self.unify(Encoding::UsAscii);
                self.push(PackOp::WriteUuString {
                    line: uu_line(count),
                });
            }
            DirectiveKind::Base64String => {
                self.unify(Encoding::UsAscii);
                self.push(PackOp::WriteBase64String {
                    line: base64_line(count),
                });
            }
            DirectiveKind::MimeString => {
                self.unify(Encoding::UsAscii);
                self.push(PackOp::WriteMimeString {
                    line: mime_line(count),
                });
            }
            DirectiveKind::StringPointer => {
                self.push_counted(count, PackOp::WritePointer { min_length: None });
            }
            // `P` takes a minimum pointee length, not a repeat count.
            DirectiveKind::StructPointer => self.push(PackOp::WritePointer {
                min_length: match count {
                    Count::Explicit(n) => Some(n),
                    Count::None | Count::Star => None,
                },
            }),
            DirectiveKind::At => {
                if let Some(position) = count.or_none(1) {
                    self.push(PackOp::SetOutputPosition(position));
                }
            }
            DirectiveKind::Back => {
                if !count.is_star() {
                    self.push_counted(count, PackOp::ReverseOutputPosition);
                }
            }
            DirectiveKind::NullByte => {
                if let Some(n) = count.or_none(1) {
                    self.push(PackOp::WriteNullBytes(n));
                }
            }
        }
        Ok(())
    }

    fn start_group(&mut self) -> Result<(), FormatError> {
        self.sequences.start_group();
        Ok(())
    }

    fn finish_group(&mut self, count: Count) -> Result<(), FormatError> {
        self.sequences.finish_group(count, &self.config)
    }

    fn error(&mut self, message: String) -> FormatError {
        FormatError::InvalidFormat(message)
    }
}

/// Mutable state of one pack run.
pub(crate) struct PackState<'r, 't, H: PackHost> {
    host: &'r mut H,
    values: &'r [H::Value],
    source: Cursor,
    output: ByteOutput,
    associated: Option<Vec<H::Retained>>,
    scratch: Vec<u8>,
    ticker: Ticker,
    trace_mask: TraceMask,
    trace: &'r mut Option<&'t mut dyn TraceSink>,
}

impl<'r, 't, H: PackHost> PackState<'r, 't, H> {
    pub(crate) fn new(
        host: &'r mut H,
        values: &'r [H::Value],
        output: ByteOutput,
        poll_interval: u32,
        trace_mask: TraceMask,
        trace: &'r mut Option<&'t mut dyn TraceSink>,
    ) -> Self {
        Self {
            host,
            values,
            source: Cursor::new(0, values.len()),
            output,
            associated: None,
            scratch: Vec::new(),
            ticker: Ticker::new(poll_interval),
            trace_mask,
            trace,
        }
    }

    /// Returns the output bytes and the pinned handles.
    pub(crate) fn finish(self) -> (Vec<u8>, Option<Vec<H::Retained>>) {
        (self.output.finish(), self.associated)
    }

    fn next_value(&mut self) -> Result<&'r H::Value, FormatError> {
        let index = self.source.advance(1)?;
        let values = self.values;
        values.get(index).ok_or(FormatError::TooFewArguments)
    }

    fn next_bytes(&mut self, conversion: StrConversion) -> Result<Option<Cow<'r, [u8]>>, FormatError> {
        let value = self.next_value()?;
        self.host.to_bytes(value, conversion)
    }

    /// Next value as a string where nil reads as empty.
    fn next_bytes_or_empty(&mut self) -> Result<Cow<'r, [u8]>, FormatError> {
        Ok(self
            .next_bytes(StrConversion::Implicit)?
            .unwrap_or(Cow::Borrowed(&[])))
    }

    /// Next value as a string where nil is a conversion error.
    fn next_bytes_required(&mut self) -> Result<Cow<'r, [u8]>, FormatError> {
        self.next_bytes(StrConversion::Implicit)?
            .ok_or_else(|| FormatError::no_implicit_conversion("nil", "String"))
    }

    /// Runs `encode` into the scratch buffer and copies the result to the output.
    fn write_encoded(&mut self, encode: impl FnOnce(&mut Vec<u8>)) {
        let mut scratch = core::mem::take(&mut self.scratch);
        scratch.clear();
        encode(&mut scratch);
        self.output.write_bytes(&scratch);
        self.scratch = scratch;
    }

    fn write_integer(&mut self, width: IntWidth, order: ByteOrder) -> Result<(), FormatError> {
        let value = self.next_value()?;
        let bits = self.host.to_integer(value)?.to_u64_bits()?;
        self.output
            .write_bytes(codec::encode_u64(bits, width, order).as_slice());
        Ok(())
    }

    fn write_float(&mut self, width: FloatWidth, order: ByteOrder) -> Result<(), FormatError> {
        let value = self.next_value()?;
        let f = self.host.to_float(value)?;
        let bits = match width {
            #[allow(clippy::cast_possible_truncation, reason = "single precision is requested")]
            FloatWidth::F32 => u64::from((f as f32).to_bits()),
            FloatWidth::F64 => f.to_bits(),
        };
        self.output
            .write_bytes(codec::encode_u64(bits, width.int_width(), order).as_slice());
        Ok(())
    }

    fn write_utf8_char(&mut self) -> Result<(), FormatError> {
        let value = self.next_value()?;
        let code_point = self
            .host
            .to_integer(value)?
            .to_u64_bits()
            .ok()
            .and_then(|v| i64::try_from(v).ok())
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(utf8::out_of_range)?;
        let mut buf = [0_u8; 6];
        let len = utf8::encode(code_point, &mut buf)?;
        self.output.write_bytes(&buf[..len]);
        Ok(())
    }

    fn write_ber(&mut self) -> Result<(), FormatError> {
        let value = self.next_value()?;
        let integer = self.host.to_integer(value)?;
        let mut scratch = core::mem::take(&mut self.scratch);
        scratch.clear();
        let result = codec::encode_ber(&integer, &mut scratch);
        if result.is_ok() {
            self.output.write_bytes(&scratch);
        }
        self.scratch = scratch;
        result
    }

    fn write_binary_string(
        &mut self,
        width: usize,
        pad: u8,
        take_all: bool,
        append_null: bool,
    ) -> Result<(), FormatError> {
        let bytes = self.next_bytes_or_empty()?;
        if take_all {
            self.output.write_bytes(&bytes);
        } else {
            let n = bytes.len().min(width);
            self.output.write_bytes(&bytes[..n]);
            self.output.write_repeated(pad, width - n);
        }
        if append_null {
            self.output.write_byte(0);
        }
        Ok(())
    }

    fn write_pointer(&mut self, min_length: Option<usize>) -> Result<(), FormatError> {
        let value = self.next_value()?;
        let address = match self.host.pin_bytes(value)? {
            None => 0,
            Some(pinned) => {
                if let Some(min) = min_length
                    && pinned.len < min
                {
                    return Err(FormatError::CantConvert(format!(
                        "too short buffer for P({} for {min})",
                        pinned.len
                    )));
                }
                self.associated
                    .get_or_insert_with(Vec::new)
                    .push(pinned.retained);
                pinned.address
            }
        };
        self.output
            .write_bytes(codec::encode_u64(address, IntWidth::W64, ByteOrder::NATIVE).as_slice());
        Ok(())
    }

    fn trace_op(&mut self, op: &PackOp) {
        if self.trace_mask.contains(TraceMask::OP)
            && let Some(t) = self.trace.as_mut()
        {
            let t: &mut dyn TraceSink = &mut **t;
            t.op(Mode::Pack, op.mnemonic(), self.source.position());
        }
    }
}

impl<H: PackHost> Machine<PackOp> for PackState<'_, '_, H> {
    fn op(&mut self, op: &PackOp) -> Result<(), FormatError> {
        self.trace_op(op);
        match *op {
            PackOp::WriteInteger { width, order } => self.write_integer(width, order),
            PackOp::WriteFloat { width, order } => self.write_float(width, order),
            PackOp::WriteUtf8Char => self.write_utf8_char(),
            PackOp::WriteBer => self.write_ber(),
            PackOp::WriteBinaryString {
                width,
                pad,
                take_all,
                append_null,
            } => self.write_binary_string(width, pad, take_all, append_null),
            PackOp::WriteBitString { order, len } => {
                let bytes = self.next_bytes_or_empty()?;
                let len = len.unwrap_or(bytes.len());
                self.write_encoded(|out| strings::pack_bits(&bytes, len, order, out));
                Ok(())
            }
            PackOp::WriteHexString { order, len } => {
                let bytes = self.next_bytes_or_empty()?;
                let len = len.unwrap_or(bytes.len());
                self.write_encoded(|out| strings::pack_hex(&bytes, len, order, out));
                Ok(())
            }
            PackOp::WriteUuString { line } => {
                let bytes = self.next_bytes_required()?;
                self.write_encoded(|out| encoded::uu_encode(&bytes, line, out));
                Ok(())
            }
            PackOp::WriteBase64String { line } => {
                let bytes = self.next_bytes_required()?;
                self.write_encoded(|out| encoded::base64_encode(&bytes, line, out));
                Ok(())
            }
            PackOp::WriteMimeString { line } => {
                if let Some(bytes) = self.next_bytes(StrConversion::Display)? {
                    self.write_encoded(|out| encoded::qp_encode(&bytes, line, out));
                }
                Ok(())
            }
            PackOp::WritePointer { min_length } => self.write_pointer(min_length),
            PackOp::SetOutputPosition(position) => {
                self.output.set_position(position);
                Ok(())
            }
            PackOp::ReverseOutputPosition => self.output.reverse(1),
            PackOp::WriteNullBytes(n) => {
                self.output.write_null_bytes(n);
                Ok(())
            }
        }
    }

    fn source_position(&self) -> usize {
        self.source.position()
    }

    fn source_exhausted(&self) -> bool {
        self.source.is_exhausted()
    }

    fn tick(&mut self) -> Result<(), FormatError> {
        self.ticker.tick(&mut *self.host)
    }

    fn loop_enter(&mut self, kind: LoopKind) {
        if self.trace_mask.contains(TraceMask::LOOP)
            && let Some(t) = self.trace.as_mut()
        {
            let t: &mut dyn TraceSink = &mut **t;
            t.loop_enter(Mode::Pack, kind);
        }
    }

    fn loop_exit(&mut self, kind: LoopKind, iterations: usize) {
        if self.trace_mask.contains(TraceMask::LOOP)
            && let Some(t) = self.trace.as_mut()
        {
            let t: &mut dyn TraceSink = &mut **t;
            t.loop_exit(Mode::Pack, kind, iterations);
        }
    }
}

// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Unpack direction: operations, tree builder, and evaluation state.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::builder::{BuildConfig, SequenceStack, apply_count};
use crate::codec;
use crate::directive::{
    BitOrder, ByteOrder, Count, Directive, DirectiveKind, FloatWidth, IntWidth, NibbleOrder,
};
use crate::encoded;
use crate::error::FormatError;
use crate::host::UnpackHost;
use crate::node::{Machine, Node};
use crate::pack::write_len;
use crate::parser::{DirectiveSink, Mode};
use crate::state::{Cursor, Ticker};
use crate::strings;
use crate::trace::{LoopKind, TraceMask, TraceSink};
use crate::utf8;
use crate::value::{ByteString, Value};
use crate::vm::ShortRead;

/// A leaf operation of an unpack tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnpackOp {
    /// Reads a fixed-width integer.
    ReadInteger {
        /// Width.
        width: IntWidth,
        /// Sign-extend the result.
        signed: bool,
        /// Byte order.
        order: ByteOrder,
        /// A short read ends the run's `*` loop instead of failing.
        consume_partial: bool,
    },
    /// Reads a float.
    ReadFloat {
        /// Width.
        width: FloatWidth,
        /// Byte order.
        order: ByteOrder,
        /// A short read ends the run's `*` loop instead of failing.
        consume_partial: bool,
    },
    /// Reads one UTF-8 code point.
    ReadUtf8Char {
        /// Running out of input ends the run's `*` loop instead of failing.
        consume_partial: bool,
    },
    /// Reads one BER-compressed integer.
    ReadBer {
        /// Running out of input ends the run's `*` loop instead of failing.
        consume_partial: bool,
    },
    /// Reads a binary string.
    ReadBinaryString {
        /// Byte count; `None` reads the rest of the input.
        len: Option<usize>,
        /// Trim trailing spaces (`A`).
        trim_spaces: bool,
        /// Trim trailing NULs (`A`).
        trim_nulls: bool,
        /// Cut at the first NUL (`Z`).
        to_first_null: bool,
    },
    /// Reads bits as a string of `0`/`1` characters.
    ReadBitString {
        /// Bit order.
        order: BitOrder,
        /// Bit count; `None` reads the rest of the input.
        len: Option<usize>,
    },
    /// Reads nibbles as a string of hex digits.
    ReadHexString {
        /// Nibble order.
        order: NibbleOrder,
        /// Digit count; `None` reads the rest of the input.
        len: Option<usize>,
    },
    /// Uudecodes the rest of the input.
    ReadUuString,
    /// Base64-decodes the rest of the input.
    ReadBase64String {
        /// Reject anything but canonical, unwrapped base64 (`m0`).
        strict: bool,
    },
    /// Quoted-printable decodes the rest of the input.
    ReadMimeString,
    /// Reads an address and resolves it through the host.
    ReadPointer {
        /// Byte count to read behind the pointer (`P`); `None` reads to NUL (`p`).
        limit: Option<usize>,
        /// A short read ends the run's `*` loop instead of failing.
        consume_partial: bool,
    },
    /// `@`: moves to an offset from the start of the input.
    SetSourcePosition(usize),
    /// `X`: moves back one byte, or back by the remaining length for `X*`.
    ReverseSourcePosition {
        /// `X*`.
        star: bool,
    },
    /// `x`: skips one byte, or to the end for `x*`.
    AdvanceSourcePosition {
        /// `x*`.
        star: bool,
    },
}

impl UnpackOp {
    /// Short mnemonic used in traces and disassembly.
    #[must_use]
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::ReadInteger { .. } => "read_int",
            Self::ReadFloat { .. } => "read_float",
            Self::ReadUtf8Char { .. } => "read_utf8",
            Self::ReadBer { .. } => "read_ber",
            Self::ReadBinaryString { .. } => "read_str",
            Self::ReadBitString { .. } => "read_bits",
            Self::ReadHexString { .. } => "read_hex",
            Self::ReadUuString => "read_uu",
            Self::ReadBase64String { .. } => "read_base64",
            Self::ReadMimeString => "read_qp",
            Self::ReadPointer { .. } => "read_ptr",
            Self::SetSourcePosition(_) => "set_pos",
            Self::ReverseSourcePosition { .. } => "back",
            Self::AdvanceSourcePosition { .. } => "skip",
        }
    }
}

impl fmt::Display for UnpackOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())?;
        match self {
            Self::ReadInteger {
                width,
                signed,
                order,
                consume_partial,
            } => {
                let sign = if *signed { 'i' } else { 'u' };
                write!(f, " {sign}{} {}", width.bits(), order.mnemonic())?;
                write_partial(f, *consume_partial)
            }
            Self::ReadFloat {
                width,
                order,
                consume_partial,
            } => {
                write!(f, " {} {}", width.int_width().bits(), order.mnemonic())?;
                write_partial(f, *consume_partial)
            }
            Self::ReadUtf8Char { consume_partial } | Self::ReadBer { consume_partial } => {
                write_partial(f, *consume_partial)
            }
            Self::ReadBinaryString {
                len,
                trim_spaces,
                trim_nulls,
                to_first_null,
            } => {
                write_len(f, *len)?;
                if *trim_spaces || *trim_nulls {
                    f.write_str(" trim")?;
                }
                if *to_first_null {
                    f.write_str(" to_nul")?;
                }
                Ok(())
            }
            Self::ReadBitString { order, len } => {
                write!(f, " {order:?}")?;
                write_len(f, *len)
            }
            Self::ReadHexString { order, len } => {
                write!(f, " {order:?}")?;
                write_len(f, *len)
            }
            Self::ReadBase64String { strict } => {
                if *strict {
                    f.write_str(" strict")?;
                }
                Ok(())
            }
            Self::ReadPointer {
                limit,
                consume_partial,
            } => {
                if let Some(limit) = limit {
                    write!(f, " limit={limit}")?;
                }
                write_partial(f, *consume_partial)
            }
            Self::SetSourcePosition(n) => write!(f, " {n}"),
            Self::ReverseSourcePosition { star } | Self::AdvanceSourcePosition { star } => {
                if *star {
                    f.write_str(" *")?;
                }
                Ok(())
            }
            Self::ReadUuString | Self::ReadMimeString => Ok(()),
        }
    }
}

fn write_partial(f: &mut fmt::Formatter<'_>, consume_partial: bool) -> fmt::Result {
    if consume_partial {
        f.write_str(" partial")?;
    }
    Ok(())
}

/// Builds an unpack tree from parser events.
#[derive(Debug)]
pub struct UnpackBuilder {
    config: BuildConfig,
    sequences: SequenceStack<UnpackOp>,
}

impl UnpackBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            sequences: SequenceStack::new(),
        }
    }

    /// Returns the root node.
    pub fn finish(self) -> Result<Node<UnpackOp>, FormatError> {
        self.sequences.finish()
    }

    fn push_counted(&mut self, count: Count, op: UnpackOp) {
        let node = apply_count(count, Node::Op(op), &self.config);
        self.sequences.push(node);
    }

    fn push(&mut self, op: UnpackOp) {
        self.sequences.push(Node::Op(op));
    }
}

impl DirectiveSink for UnpackBuilder {
    type Error = FormatError;

    fn mode(&self) -> Mode {
        Mode::Unpack
    }

    fn directive(&mut self, directive: Directive) -> Result<(), FormatError> {
        let Directive { kind, count } = directive;
        let consume_partial = count.is_star();
        match kind {
            DirectiveKind::Integer {
                width,
                signed,
                order,
            } => self.push_counted(
                count,
                UnpackOp::ReadInteger {
                    width,
                    signed,
                    order,
                    consume_partial,
                },
            ),
            DirectiveKind::Float { width, order } => self.push_counted(
                count,
                UnpackOp::ReadFloat {
                    width,
                    order,
                    consume_partial,
                },
            ),
            DirectiveKind::Utf8Char => {
                self.push_counted(count, UnpackOp::ReadUtf8Char { consume_partial });
            }
            DirectiveKind::BerInteger => {
                self.push_counted(count, UnpackOp::ReadBer { consume_partial });
            }
            DirectiveKind::StringSpacePadded => self.push(UnpackOp::ReadBinaryString {
                len: count.or_none(1),
                trim_spaces: true,
                trim_nulls: true,
                to_first_null: false,
            }),
            DirectiveKind::StringNullPadded => self.push(UnpackOp::ReadBinaryString {
                len: count.or_none(1),
                trim_spaces: false,
                trim_nulls: false,
                to_first_null: false,
            }),
            DirectiveKind::StringNullStar => self.push(UnpackOp::ReadBinaryString {
                len: count.or_none(1),
                trim_spaces: false,
                trim_nulls: false,
                to_first_null: true,
            }),
            DirectiveKind::BitString(order) => self.push(UnpackOp::ReadBitString {
                order,
                len: count.or_none(1),
            }),
            DirectiveKind::HexString(order) => self.push(UnpackOp::ReadHexString {
                order,
                len: count.or_none(1),
            }),
            DirectiveKind::UuString => self.push(UnpackOp::ReadUuString),
            DirectiveKind::Base64String => self.push(UnpackOp::ReadBase64String {
                strict: count == Count::Explicit(0),
            }),
            DirectiveKind::MimeString => self.push(UnpackOp::ReadMimeString),
            DirectiveKind::StringPointer => self.push_counted(
                count,
                UnpackOp::ReadPointer {
                    limit: None,
                    consume_partial,
                },
            ),
            DirectiveKind::StructPointer => self.push(UnpackOp::ReadPointer {
                limit: Some(count.or_none(1).unwrap_or(1)),
                consume_partial: false,
            }),
            DirectiveKind::At => {
                if let Some(position) = count.or_none(0) {
                    self.push(UnpackOp::SetSourcePosition(position));
                }
            }
            DirectiveKind::Back => {
                if consume_partial {
                    self.push(UnpackOp::ReverseSourcePosition { star: true });
                } else {
                    self.push_counted(count, UnpackOp::ReverseSourcePosition { star: false });
                }
            }
            DirectiveKind::NullByte => {
                if consume_partial {
                    self.push(UnpackOp::AdvanceSourcePosition { star: true });
                } else {
                    self.push_counted(count, UnpackOp::AdvanceSourcePosition { star: false });
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

/// Mutable state of one unpack run.
pub(crate) struct UnpackState<'r, 't, H: UnpackHost> {
    host: &'r mut H,
    bytes: &'r [u8],
    source: Cursor,
    values: Vec<Value>,
    short_read: ShortRead,
    star_depth: usize,
    ticker: Ticker,
    trace_mask: TraceMask,
    trace: &'r mut Option<&'t mut dyn TraceSink>,
}

impl<'r, 't, H: UnpackHost> UnpackState<'r, 't, H> {
    #[allow(clippy::too_many_arguments, reason = "internal constructor")]
    pub(crate) fn new(
        host: &'r mut H,
        bytes: &'r [u8],
        offset: usize,
        values: Vec<Value>,
        short_read: ShortRead,
        poll_interval: u32,
        trace_mask: TraceMask,
        trace: &'r mut Option<&'t mut dyn TraceSink>,
    ) -> Self {
        Self {
            host,
            bytes,
            source: Cursor::new(offset, bytes.len()),
            values,
            short_read,
            star_depth: 0,
            ticker: Ticker::new(poll_interval),
            trace_mask,
            trace,
        }
    }

    pub(crate) fn finish(self) -> Vec<Value> {
        self.values
    }

    /// Short reads yield nil instead of failing: under [`ShortRead::Nil`], and for every read
    /// inside a `*` loop body.
    fn lenient(&self) -> bool {
        self.short_read == ShortRead::Nil || self.star_depth > 0
    }

    /// Reads exactly `n` bytes.
    ///
    /// Returns `None` when the input is short and the read is allowed to come up empty; the
    /// caller then pushes nothing (`consume_partial`) or nil (lenient policy).
    fn read_item(&mut self, n: usize, consume_partial: bool) -> Result<Option<&'r [u8]>, FormatError> {
        let start = if consume_partial || self.lenient() {
            match self.source.advance_no_throw(n, consume_partial) {
                Some(start) => start,
                None => return Ok(None),
            }
        } else {
            self.source.advance(n)?
        };
        let bytes = self.bytes;
        Ok(Some(&bytes[start..start + n]))
    }

    fn push_short(&mut self, consume_partial: bool) {
        if !consume_partial {
            self.values.push(Value::Nil);
        }
    }

    /// Consumes the rest of the input.
    fn rest(&mut self) -> &'r [u8] {
        let bytes = self.bytes;
        let start = self.source.position();
        self.source.set(self.source.end());
        &bytes[start..]
    }

    /// The next `n` bytes, without consuming them, clamped under the lenient policy.
    fn peek_span(&self, n: usize) -> Result<&'r [u8], FormatError> {
        let remaining = self.source.remaining();
        if n > remaining && !self.lenient() {
            return Err(FormatError::TooFewArguments);
        }
        let bytes = self.bytes;
        let start = self.source.position();
        Ok(&bytes[start..start + n.min(remaining)])
    }

    fn consume(&mut self, n: usize) {
        self.source.set(self.source.position() + n);
    }

    fn read_integer(
        &mut self,
        width: IntWidth,
        signed: bool,
        order: ByteOrder,
        consume_partial: bool,
    ) -> Result<(), FormatError> {
        match self.read_item(width.bytes(), consume_partial)? {
            Some(bytes) => {
                let value = codec::decode_integer(bytes, width, signed, order);
                self.values.push(value.into());
            }
            None => self.push_short(consume_partial),
        }
        Ok(())
    }

    fn read_float(
        &mut self,
        width: FloatWidth,
        order: ByteOrder,
        consume_partial: bool,
    ) -> Result<(), FormatError> {
        match self.read_item(width.int_width().bytes(), consume_partial)? {
            Some(bytes) => {
                let bits = codec::decode_u64(bytes, order);
                let value = match width {
                    #[allow(clippy::cast_possible_truncation, reason = "four bytes were read")]
                    FloatWidth::F32 => f64::from(f32::from_bits(bits as u32)),
                    FloatWidth::F64 => f64::from_bits(bits),
                };
                self.values.push(Value::Float(value));
            }
            None => self.push_short(consume_partial),
        }
        Ok(())
    }

    /// Whether an exhausted variable-length read should stop quietly.
    fn stop_when_exhausted(&self, consume_partial: bool) -> Result<bool, FormatError> {
        if !self.source.is_exhausted() {
            return Ok(false);
        }
        if consume_partial || self.lenient() {
            Ok(true)
        } else {
            Err(FormatError::TooFewArguments)
        }
    }

    fn read_utf8_char(&mut self, consume_partial: bool) -> Result<(), FormatError> {
        if self.stop_when_exhausted(consume_partial)? {
            return Ok(());
        }
        let input = self.peek_span(self.source.remaining())?;
        let (code_point, len) = utf8::decode(input)?;
        self.consume(len);
        self.values.push(Value::Int(i64::from(code_point)));
        Ok(())
    }

    fn read_ber(&mut self, consume_partial: bool) -> Result<(), FormatError> {
        if self.stop_when_exhausted(consume_partial)? {
            return Ok(());
        }
        let input = self.peek_span(self.source.remaining())?;
        match codec::decode_ber(input) {
            Some((value, len)) => {
                self.consume(len);
                self.values.push(value.into());
            }
            None if consume_partial || self.lenient() => {
                self.source.set(self.source.end());
            }
            None => return Err(FormatError::TooFewArguments),
        }
        Ok(())
    }

    fn read_binary_string(
        &mut self,
        len: Option<usize>,
        trim_spaces: bool,
        trim_nulls: bool,
        to_first_null: bool,
    ) -> Result<(), FormatError> {
        let bytes = match len {
            None if to_first_null => {
                let rest = self.peek_span(self.source.remaining())?;
                match memchr::memchr(0, rest) {
                    Some(nul) => {
                        self.consume(nul + 1);
                        &rest[..nul]
                    }
                    None => {
                        self.consume(rest.len());
                        rest
                    }
                }
            }
            None => self.rest(),
            Some(n) => {
                let span = self.peek_span(n)?;
                self.consume(span.len());
                if to_first_null {
                    strings::to_first_null(span)
                } else {
                    span
                }
            }
        };
        let bytes = strings::trim_trailing(bytes, trim_spaces, trim_nulls);
        self.values.push(Value::Str(ByteString::binary(bytes)));
        Ok(())
    }

    /// Reads `len` digits packed `per_byte` to a byte; `None` reads the rest of the input.
    fn digit_span(&mut self, len: Option<usize>, per_byte: usize) -> Result<(&'r [u8], usize), FormatError> {
        let remaining = self.source.remaining();
        let len = match len {
            None => remaining * per_byte,
            Some(n) if n.div_ceil(per_byte) > remaining => {
                if !self.lenient() {
                    return Err(FormatError::TooFewArguments);
                }
                remaining * per_byte
            }
            Some(n) => n,
        };
        let span = self.peek_span(len.div_ceil(per_byte))?;
        self.consume(span.len());
        Ok((span, len))
    }

    fn read_pointer(&mut self, limit: Option<usize>, consume_partial: bool) -> Result<(), FormatError> {
        let Some(bytes) = self.read_item(8, consume_partial)? else {
            self.push_short(consume_partial);
            return Ok(());
        };
        let address = codec::decode_u64(bytes, ByteOrder::NATIVE);
        let value = if address == 0 {
            Value::Nil
        } else {
            Value::Str(ByteString::binary(self.host.read_pointer(address, limit)?))
        };
        self.values.push(value);
        Ok(())
    }

    fn set_source_position(&mut self, position: usize) -> Result<(), FormatError> {
        let start = self.source.start();
        if position > self.source.end() - start {
            return Err(FormatError::OutsideOfString("@"));
        }
        self.source.set(start + position);
        Ok(())
    }

    fn reverse_source_position(&mut self, star: bool) -> Result<(), FormatError> {
        let back = if star { self.source.remaining() } else { 1 };
        let consumed = self.source.position() - self.source.start();
        if back > consumed {
            return Err(FormatError::OutsideOfString("X"));
        }
        self.source.set(self.source.position() - back);
        Ok(())
    }

    fn advance_source_position(&mut self, star: bool) -> Result<(), FormatError> {
        if star {
            self.source.set(self.source.end());
        } else if self.source.is_exhausted() {
            return Err(FormatError::OutsideOfString("x"));
        } else {
            self.consume(1);
        }
        Ok(())
    }
}

impl<H: UnpackHost> Machine<UnpackOp> for UnpackState<'_, '_, H> {
    fn op(&mut self, op: &UnpackOp) -> Result<(), FormatError> {
        if self.trace_mask.contains(TraceMask::OP)
            && let Some(t) = self.trace.as_mut()
        {
            let t: &mut dyn TraceSink = &mut **t;
            t.op(Mode::Unpack, op.mnemonic(), self.source.position());
        }
        match *op {
            UnpackOp::ReadInteger {
                width,
                signed,
                order,
                consume_partial,
            } => self.read_integer(width, signed, order, consume_partial),
            UnpackOp::ReadFloat {
                width,
                order,
                consume_partial,
            } => self.read_float(width, order, consume_partial),
            UnpackOp::ReadUtf8Char { consume_partial } => self.read_utf8_char(consume_partial),
            UnpackOp::ReadBer { consume_partial } => self.read_ber(consume_partial),
            UnpackOp::ReadBinaryString {
                len,
                trim_spaces,
                trim_nulls,
                to_first_null,
            } => self.read_binary_string(len, trim_spaces, trim_nulls, to_first_null),
            UnpackOp::ReadBitString { order, len } => {
                let (span, len) = self.digit_span(len, 8)?;
                let bits = strings::unpack_bits(span, len, order);
                self.values.push(Value::Str(ByteString::ascii(bits)));
                Ok(())
            }
            UnpackOp::ReadHexString { order, len } => {
                let (span, len) = self.digit_span(len, 2)?;
                let digits = strings::unpack_hex(span, len, order);
                self.values.push(Value::Str(ByteString::ascii(digits)));
                Ok(())
            }
            UnpackOp::ReadUuString => {
                let rest = self.peek_span(self.source.remaining())?;
                let (decoded, used) = encoded::uu_decode(rest);
                self.consume(used);
                self.values.push(Value::Str(ByteString::binary(decoded)));
                Ok(())
            }
            UnpackOp::ReadBase64String { strict } => {
                let decoded = if strict {
                    encoded::base64_decode_strict(self.rest())?
                } else {
                    let rest = self.peek_span(self.source.remaining())?;
                    let (decoded, used) = encoded::base64_decode_lenient(rest);
                    self.consume(used);
                    decoded
                };
                self.values.push(Value::Str(ByteString::binary(decoded)));
                Ok(())
            }
            UnpackOp::ReadMimeString => {
                let decoded = encoded::qp_decode(self.rest());
                self.values.push(Value::Str(ByteString::binary(decoded)));
                Ok(())
            }
            UnpackOp::ReadPointer {
                limit,
                consume_partial,
            } => self.read_pointer(limit, consume_partial),
            UnpackOp::SetSourcePosition(position) => self.set_source_position(position),
            UnpackOp::ReverseSourcePosition { star } => self.reverse_source_position(star),
            UnpackOp::AdvanceSourcePosition { star } => self.advance_source_position(star),
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
        if kind == LoopKind::Star {
            self.star_depth += 1;
        }
        if self.trace_mask.contains(TraceMask::LOOP)
            && let Some(t) = self.trace.as_mut()
        {
            let t: &mut dyn TraceSink = &mut **t;
            t.loop_enter(Mode::Unpack, kind);
        }
    }

    fn loop_exit(&mut self, kind: LoopKind, iterations: usize) {
        if kind == LoopKind::Star {
            self.star_depth = self.star_depth.saturating_sub(1);
        }
        if self.trace_mask.contains(TraceMask::LOOP)
            && let Some(t) = self.trace.as_mut()
        {
            let t: &mut dyn TraceSink = &mut **t;
            t.loop_exit(Mode::Unpack, kind, iterations);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Host, ValueHost};
    use crate::node::execute;
    use crate::parser::parse;
    use crate::value::Integer;
    use alloc::boxed::Box;
    use alloc::vec;

    fn bits_of(value: &Value) -> Option<u64> {
        match value {
            Value::Int(v) => Some(*v as u64),
            Value::BigInt(v) => Integer::Big(v.clone()).to_u64_bits().ok(),
            _ => None,
        }
    }

    fn build(format: &str) -> Node<UnpackOp> {
        let mut b = UnpackBuilder::new(BuildConfig::default());
        parse(format.as_bytes(), &mut b).unwrap();
        b.finish().unwrap()
    }

    fn run_with(format: &str, bytes: &[u8], short_read: ShortRead) -> Result<Vec<Value>, FormatError> {
        let root = build(format);
        let mut host = ValueHost::new();
        let mut trace = None;
        let mut state = UnpackState::new(
            &mut host,
            bytes,
            0,
            Vec::new(),
            short_read,
            1024,
            TraceMask::NONE,
            &mut trace,
        );
        execute(&root, &mut state)?;
        Ok(state.finish())
    }

    fn run(format: &str, bytes: &[u8]) -> Result<Vec<Value>, FormatError> {
        run_with(format, bytes, ShortRead::Error)
    }

    #[test]
    fn integers_star_stops_at_partial_item() {
        let values = run("S*", &[1, 0, 2, 0, 3]).unwrap();
        assert_eq!(values, [Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn starred_groups_end_on_a_partial_item() {
        assert_eq!(run("(n)*", &[0, 1, 2]).unwrap(), [Value::Int(1), Value::Nil]);
        assert_eq!(
            run("(C C)*", &[1, 2, 3]).unwrap(),
            [Value::Int(1), Value::Int(2), Value::Int(3), Value::Nil]
        );
        assert_eq!(
            run("(n2)*", &[0, 1, 0, 2, 0]).unwrap(),
            [Value::Int(1), Value::Int(2), Value::Nil, Value::Nil]
        );
        assert_eq!(
            run("(a4)*", b"abcdef").unwrap(),
            [
                Value::Str(ByteString::binary(*b"abcd")),
                Value::Str(ByteString::binary(*b"ef")),
            ]
        );
        // The loop body is lenient; reads after the loop are not.
        assert_eq!(run("(C)* C", &[1]), Err(FormatError::TooFewArguments));
    }

    #[test]
    fn fixed_reads_fail_at_the_boundary() {
        assert_eq!(run("N", &[0, 0, 1]), Err(FormatError::TooFewArguments));
        assert_eq!(run("N", &[0, 0, 0, 1]), Ok(vec![Value::Int(1)]));
    }

    #[test]
    fn lenient_policy_yields_nil() {
        let values = run_with("C2 N a5", &[7, 0, 0, b'x'], ShortRead::Nil).unwrap();
        assert_eq!(
            values,
            [
                Value::Int(7),
                Value::Int(0),
                Value::Nil,
                Value::Str(ByteString::binary(*b"\0x")),
            ]
        );
    }

    #[test]
    fn string_variants() {
        let input = b"ab \0\0cd\0ef";
        assert_eq!(
            run("A5 Z* a*", input).unwrap(),
            [
                Value::Str(ByteString::binary(*b"ab")),
                Value::Str(ByteString::binary(*b"cd")),
                Value::Str(ByteString::binary(*b"ef")),
            ]
        );
        assert_eq!(
            run("Z4", b"a\0bc").unwrap(),
            [Value::Str(ByteString::binary(*b"a"))]
        );
    }

    #[test]
    fn bits_and_hex_are_ascii() {
        assert_eq!(
            run("B8 h*", &[0x80, 0x21]).unwrap(),
            [
                Value::Str(ByteString::ascii(*b"10000000")),
                Value::Str(ByteString::ascii(*b"12")),
            ]
        );
        assert_eq!(run("B9", &[0xff]), Err(FormatError::TooFewArguments));
    }

    #[test]
    fn seeks() {
        assert_eq!(run("x2 C", &[1, 2, 3]).unwrap(), [Value::Int(3)]);
        assert_eq!(run("C X C", &[5]).unwrap(), [Value::Int(5), Value::Int(5)]);
        assert_eq!(run("@2 C @0 C", &[1, 2, 3]).unwrap(), [Value::Int(3), Value::Int(1)]);
        assert_eq!(run("X", &[1]), Err(FormatError::OutsideOfString("X")));
        assert_eq!(run("x2", &[1]), Err(FormatError::OutsideOfString("x")));
        assert_eq!(run("@4", &[1]), Err(FormatError::OutsideOfString("@")));
        assert!(run("x* C*", &[1, 2]).unwrap().is_empty());
    }

    #[test]
    fn utf8_and_ber() {
        assert_eq!(
            run("U*", "aé".as_bytes()).unwrap(),
            [Value::Int(0x61), Value::Int(0xe9)]
        );
        assert_eq!(run("U", &[]), Err(FormatError::TooFewArguments));
        assert_eq!(
            run("w w", &[0x81, 0x00, 0x05]).unwrap(),
            [Value::Int(128), Value::Int(5)]
        );
        assert_eq!(run("w", &[0x81]), Err(FormatError::TooFewArguments));
        assert_eq!(run("w*", &[0x05, 0x81]).unwrap(), [Value::Int(5)]);
    }

    #[test]
    fn unsigned_64_bit_values_promote() {
        let values = run("Q", &[0xff; 8]).unwrap();
        assert_eq!(bits_of(&values[0]), Some(u64::MAX));
        assert!(matches!(values[0], Value::BigInt(_)));
    }

    #[test]
    fn null_pointer_reads_nil() {
        assert_eq!(run("p", &[0; 8]).unwrap(), [Value::Nil]);
    }

    #[test]
    fn builder_shapes() {
        assert_eq!(
            build("x*"),
            Node::Sequence(
                vec![Node::Op(UnpackOp::AdvanceSourcePosition { star: true })].into_boxed_slice()
            )
        );
        assert_eq!(
            build("C*"),
            Node::Sequence(
                vec![Node::Star(Box::new(Node::Op(UnpackOp::ReadInteger {
                    width: IntWidth::W8,
                    signed: false,
                    order: ByteOrder::NATIVE,
                    consume_partial: true,
                })))]
                .into_boxed_slice()
            )
        );
        assert_eq!(build("@*"), Node::Sequence(Vec::new().into_boxed_slice()));
    }

    #[test]
    fn interruption_stops_loops() {
        struct Stop;
        impl Host for Stop {
            fn poll(&mut self) -> Result<(), crate::host::Interrupted> {
                Err(crate::host::Interrupted)
            }
        }
        impl UnpackHost for Stop {
            fn read_pointer(&mut self, _: u64, _: Option<usize>) -> Result<Vec<u8>, FormatError> {
                Ok(Vec::new())
            }
        }

        let root = build("C*");
        let mut host = Stop;
        let mut trace = None;
        let mut state = UnpackState::new(
            &mut host,
            &[0; 16],
            0,
            Vec::new(),
            ShortRead::Error,
            4,
            TraceMask::NONE,
            &mut trace,
        );
        assert_eq!(execute(&root, &mut state), Err(FormatError::Interrupted));
    }
}

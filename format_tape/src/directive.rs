// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Directives: the parsed units of a template.
//!
//! A directive is transient. The parser hands each one to a
//! [`DirectiveSink`](crate::parser::DirectiveSink), which folds it into a tree and drops it.

/// Repeat specifier attached to a directive or group.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Count {
    /// No count was written (`COUNT_NONE`).
    None,
    /// `*`: consume everything remaining (`COUNT_STAR`).
    Star,
    /// An explicit decimal count.
    Explicit(usize),
}

impl Count {
    /// Returns the explicit count, substituting `none` when no count was written.
    ///
    /// Returns `None` for [`Count::Star`].
    #[must_use]
    pub const fn or_none(self, none: usize) -> Option<usize> {
        match self {
            Self::None => Some(none),
            Self::Star => None,
            Self::Explicit(n) => Some(n),
        }
    }

    /// Returns `true` for [`Count::Star`].
    #[must_use]
    pub const fn is_star(self) -> bool {
        matches!(self, Self::Star)
    }
}

/// Byte order for multi-byte integers and floats.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Most significant byte first.
    Big,
    /// Least significant byte first.
    Little,
}

impl ByteOrder {
    /// The byte order of the target platform.
    pub const NATIVE: Self = if cfg!(target_endian = "big") {
        Self::Big
    } else {
        Self::Little
    };

    /// Short mnemonic (`be` / `le`).
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Big => "be",
            Self::Little => "le",
        }
    }
}

/// Bit order inside each byte of a bit string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BitOrder {
    /// `B`: most significant bit first.
    MsbFirst,
    /// `b`: least significant bit first.
    LsbFirst,
}

/// Nibble order inside each byte of a hex string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NibbleOrder {
    /// `H`: high nibble first.
    HighFirst,
    /// `h`: low nibble first.
    LowFirst,
}

/// Integer widths.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntWidth {
    /// 8 bits.
    W8,
    /// 16 bits.
    W16,
    /// 32 bits.
    W32,
    /// 64 bits.
    W64,
}

impl IntWidth {
    /// Width in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::W8 => 1,
            Self::W16 => 2,
            Self::W32 => 4,
            Self::W64 => 8,
        }
    }

    /// Width in bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        (self.bytes() * 8) as u32
    }
}

/// Float widths.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    /// IEEE-754 single precision.
    F32,
    /// IEEE-754 double precision.
    F64,
}

impl FloatWidth {
    /// The integer width carrying this float's bit pattern.
    #[must_use]
    pub const fn int_width(self) -> IntWidth {
        match self {
            Self::F32 => IntWidth::W32,
            Self::F64 => IntWidth::W64,
        }
    }
}

/// The operation family a directive selects.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// `c C s S l L q Q j J i I n N v V`.
    Integer {
        /// Width.
        width: IntWidth,
        /// Signedness (only observable when unpacking).
        signed: bool,
        /// Byte order.
        order: ByteOrder,
    },
    /// `D d F f E e G g`.
    Float {
        /// Width.
        width: FloatWidth,
        /// Byte order.
        order: ByteOrder,
    },
    /// `U`: one UTF-8 encoded code point.
    Utf8Char,
    /// `w`: BER-compressed integer.
    BerInteger,
    /// `A`: space padded string.
    StringSpacePadded,
    /// `a`: null padded string.
    StringNullPadded,
    /// `Z`: null padded, null terminated with `*`.
    StringNullStar,
    /// `B` / `b`.
    BitString(BitOrder),
    /// `H` / `h`.
    HexString(NibbleOrder),
    /// `u`.
    UuString,
    /// `M`: quoted printable.
    MimeString,
    /// `m`: base64.
    Base64String,
    /// `P`: pointer to a fixed-length structure.
    StructPointer,
    /// `p`: pointer to a null-terminated string.
    StringPointer,
    /// `@`: absolute position.
    At,
    /// `X`: back up a byte.
    Back,
    /// `x`: null byte (pack) or skip forward (unpack).
    NullByte,
}

impl DirectiveKind {
    /// Returns `true` if the letter accepts the `_ ! < >` modifiers.
    #[must_use]
    pub const fn accepts_modifiers(letter: u8) -> bool {
        matches!(
            letter,
            b's' | b'S' | b'i' | b'I' | b'l' | b'L' | b'q' | b'Q' | b'j' | b'J'
        )
    }
}

/// One parsed directive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Directive {
    /// The selected operation family.
    pub kind: DirectiveKind,
    /// Repeat specifier.
    pub count: Count,
}

const fn int(width: IntWidth, signed: bool, order: ByteOrder) -> Option<DirectiveKind> {
    Some(DirectiveKind::Integer {
        width,
        signed,
        order,
    })
}

const fn float(width: FloatWidth, order: ByteOrder) -> Option<DirectiveKind> {
    Some(DirectiveKind::Float { width, order })
}

const fn letter_kind(letter: u8) -> Option<DirectiveKind> {
    use ByteOrder::{Big, Little};
    use IntWidth::{W8, W16, W32, W64};
    const NATIVE: ByteOrder = ByteOrder::NATIVE;

    match letter {
        b'c' => int(W8, true, NATIVE),
        b'C' => int(W8, false, NATIVE),
        b's' => int(W16, true, NATIVE),
        b'S' => int(W16, false, NATIVE),
        b'l' | b'i' => int(W32, true, NATIVE),
        b'L' | b'I' => int(W32, false, NATIVE),
        b'q' | b'j' => int(W64, true, NATIVE),
        b'Q' | b'J' => int(W64, false, NATIVE),
        b'n' => int(W16, false, Big),
        b'N' => int(W32, false, Big),
        b'v' => int(W16, false, Little),
        b'V' => int(W32, false, Little),
        b'D' | b'd' => float(FloatWidth::F64, NATIVE),
        b'F' | b'f' => float(FloatWidth::F32, NATIVE),
        b'E' => float(FloatWidth::F64, Little),
        b'e' => float(FloatWidth::F32, Little),
        b'G' => float(FloatWidth::F64, Big),
        b'g' => float(FloatWidth::F32, Big),
        b'U' => Some(DirectiveKind::Utf8Char),
        b'w' => Some(DirectiveKind::BerInteger),
        b'A' => Some(DirectiveKind::StringSpacePadded),
        b'a' => Some(DirectiveKind::StringNullPadded),
        b'Z' => Some(DirectiveKind::StringNullStar),
        b'B' => Some(DirectiveKind::BitString(BitOrder::MsbFirst)),
        b'b' => Some(DirectiveKind::BitString(BitOrder::LsbFirst)),
        b'H' => Some(DirectiveKind::HexString(NibbleOrder::HighFirst)),
        b'h' => Some(DirectiveKind::HexString(NibbleOrder::LowFirst)),
        b'u' => Some(DirectiveKind::UuString),
        b'M' => Some(DirectiveKind::MimeString),
        b'm' => Some(DirectiveKind::Base64String),
        b'P' => Some(DirectiveKind::StructPointer),
        b'p' => Some(DirectiveKind::StringPointer),
        b'@' => Some(DirectiveKind::At),
        b'X' => Some(DirectiveKind::Back),
        b'x' => Some(DirectiveKind::NullByte),
        _ => None,
    }
}

const fn build_letters() -> [Option<DirectiveKind>; 128] {
    let mut table = [None; 128];
    let mut i = 0;
    while i < table.len() {
        table[i] = letter_kind(i as u8);
        i += 1;
    }
    table
}

static LETTERS: [Option<DirectiveKind>; 128] = build_letters();

/// Looks up the directive family for a template letter.
#[must_use]
pub fn lookup(letter: u8) -> Option<DirectiveKind> {
    LETTERS.get(usize::from(letter)).copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_orders_are_fixed() {
        assert_eq!(
            lookup(b'n'),
            Some(DirectiveKind::Integer {
                width: IntWidth::W16,
                signed: false,
                order: ByteOrder::Big,
            })
        );
        assert_eq!(
            lookup(b'V'),
            Some(DirectiveKind::Integer {
                width: IntWidth::W32,
                signed: false,
                order: ByteOrder::Little,
            })
        );
    }

    #[test]
    fn unknown_letters_have_no_kind() {
        assert_eq!(lookup(b'!'), None);
        assert_eq!(lookup(b'y'), None);
        assert_eq!(lookup(0xff), None);
    }

    #[test]
    fn count_defaults() {
        assert_eq!(Count::None.or_none(1), Some(1));
        assert_eq!(Count::Explicit(3).or_none(1), Some(3));
        assert_eq!(Count::Star.or_none(1), None);
    }
}

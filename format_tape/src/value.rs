// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Built-in value model.
//!
//! Unpack always produces [`Value`]s. Pack accepts any host value type through
//! [`PackHost`](crate::host::PackHost); [`ValueHost`](crate::host::ValueHost) packs [`Value`]s.

use alloc::borrow::ToOwned;
use alloc::vec::Vec;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::encoding::Encoding;
use crate::error::FormatError;

/// An integer produced by host conversion: either machine-sized or arbitrary precision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Integer {
    /// Fits in `i64`.
    Small(i64),
    /// Arbitrary precision.
    Big(BigInt),
}

impl Integer {
    /// Builds an integer from an unsigned 64-bit value, promoting to [`Integer::Big`] if needed.
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => Self::Small(v),
            Err(_) => Self::Big(BigInt::from(value)),
        }
    }

    /// Returns `true` if the integer is below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        match self {
            Self::Small(v) => *v < 0,
            Self::Big(v) => v.sign() == num_bigint::Sign::Minus,
        }
    }

    /// Returns the low 64 bits of the two's-complement representation.
    ///
    /// Values in `[-2^63, 2^64)` are accepted; anything wider is a [`FormatError::Range`].
    pub fn to_u64_bits(&self) -> Result<u64, FormatError> {
        match self {
            Self::Small(v) => Ok(*v as u64),
            Self::Big(v) => v
                .to_i64()
                .map(|v| v as u64)
                .or_else(|| v.to_u64())
                .ok_or_else(|| {
                    FormatError::Range("bignum too big to convert into 'long'".to_owned())
                }),
        }
    }

    /// Normalizes a [`BigInt`] into the smallest representation.
    #[must_use]
    pub fn normalize(value: BigInt) -> Self {
        match value.to_i64() {
            Some(v) => Self::Small(v),
            None => Self::Big(value),
        }
    }
}

impl From<Integer> for Value {
    fn from(value: Integer) -> Self {
        match value {
            Integer::Small(v) => Self::Int(v),
            Integer::Big(v) => Self::BigInt(v),
        }
    }
}

/// An encoding-tagged byte string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ByteString {
    /// Raw bytes.
    pub bytes: Vec<u8>,
    /// Encoding tag.
    pub encoding: Encoding,
}

impl ByteString {
    /// Creates a binary (`ASCII-8BIT`) string.
    #[must_use]
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            encoding: Encoding::Binary,
        }
    }

    /// Creates a `US-ASCII` string.
    #[must_use]
    pub fn ascii(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            encoding: Encoding::UsAscii,
        }
    }
}

/// A dynamically typed value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Absent value.
    Nil,
    /// Machine-sized integer.
    Int(i64),
    /// Arbitrary-precision integer.
    BigInt(BigInt),
    /// Double-precision float.
    Float(f64),
    /// Byte string.
    Str(ByteString),
}

impl Value {
    /// Creates a binary string value.
    #[must_use]
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Str(ByteString::binary(bytes))
    }

    /// Returns the type name used in conversion diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Int(_) | Self::BigInt(_) => "Integer",
            Self::Float(_) => "Float",
            Self::Str(_) => "String",
        }
    }

    /// Returns the contained bytes for string values.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Str(s) => Some(&s.bytes),
            _ => None,
        }
    }

    /// Returns the contained integer if it fits in `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::BigInt(v) => v.to_i64(),
            _ => None,
        }
    }

    /// Returns the contained float.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Integer::from_u64(value).into()
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Integer::normalize(value).into()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(ByteString {
            bytes: value.as_bytes().to_vec(),
            encoding: Encoding::Utf8,
        })
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::bytes(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_bits_accept_unsigned_range() {
        assert_eq!(Integer::Small(-1).to_u64_bits(), Ok(u64::MAX));
        let max = Integer::Big(BigInt::from(u64::MAX));
        assert_eq!(max.to_u64_bits(), Ok(u64::MAX));
        let too_big = Integer::Big(BigInt::from(u64::MAX) + 1);
        assert!(matches!(too_big.to_u64_bits(), Err(FormatError::Range(_))));
    }

    #[test]
    fn from_u64_promotes() {
        assert_eq!(Integer::from_u64(7), Integer::Small(7));
        assert!(matches!(Integer::from_u64(u64::MAX), Integer::Big(_)));
        assert_eq!(Value::from(BigInt::from(5)), Value::Int(5));
    }
}

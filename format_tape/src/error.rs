// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors raised while compiling or running a template.
//!
//! The engine never renders final user-facing diagnostics itself. Each variant carries just
//! enough payload for an embedder to map it onto its own error types.

use alloc::string::String;
use core::fmt;

use crate::host::Interrupted;

/// A compile-time or run-time failure.
///
/// Every error aborts the whole run; output produced before the failure is discarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// A mandatory read needed more values (pack) or bytes (unpack) than remained.
    TooFewArguments,
    /// A seek (`@`, `X`, `x`, or an unpack offset) moved outside of the source or output.
    OutsideOfString(&'static str),
    /// A value could not be implicitly converted to the required type.
    NoImplicitConversion {
        /// Type name of the offending value.
        from: String,
        /// Name of the target type.
        to: &'static str,
    },
    /// Generic conversion failure (malformed encoded input, missing pointer association, ...).
    CantConvert(String),
    /// A BER-compressed integer directive was asked to encode a negative number.
    CantCompressNegative,
    /// A value does not fit the representable range of its target.
    Range(String),
    /// The template itself is malformed.
    InvalidFormat(String),
    /// The host asked the run to stop.
    Interrupted,
}

impl FormatError {
    pub(crate) fn no_implicit_conversion(from: &str, to: &'static str) -> Self {
        Self::NoImplicitConversion {
            from: String::from(from),
            to,
        }
    }

    pub(crate) fn cant_convert(message: &str) -> Self {
        Self::CantConvert(String::from(message))
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewArguments => write!(f, "too few arguments"),
            Self::OutsideOfString(directive) => write!(f, "{directive} outside of string"),
            Self::NoImplicitConversion { from, to } => {
                write!(f, "no implicit conversion of {from} into {to}")
            }
            Self::CantConvert(message) | Self::Range(message) | Self::InvalidFormat(message) => {
                f.write_str(message)
            }
            Self::CantCompressNegative => write!(f, "can't compress negative numbers"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl core::error::Error for FormatError {}

impl From<Interrupted> for FormatError {
    fn from(_: Interrupted) -> Self {
        Self::Interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn messages_carry_payload() {
        assert_eq!(FormatError::TooFewArguments.to_string(), "too few arguments");
        assert_eq!(
            FormatError::OutsideOfString("X").to_string(),
            "X outside of string"
        );
        assert_eq!(
            FormatError::no_implicit_conversion("String", "Integer").to_string(),
            "no implicit conversion of String into Integer"
        );
        assert_eq!(
            FormatError::CantCompressNegative.to_string(),
            "can't compress negative numbers"
        );
    }
}

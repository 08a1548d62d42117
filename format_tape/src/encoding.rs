// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Encoding tags attached to packed byte strings.

/// The encoding a produced byte string should be tagged with.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// No directive has expressed a preference yet.
    #[default]
    Default,
    /// Raw bytes (`ASCII-8BIT`).
    Binary,
    /// 7-bit text (`US-ASCII`).
    UsAscii,
    /// UTF-8 text.
    Utf8,
}

impl Encoding {
    /// Combines two encoding preferences.
    ///
    /// `Default` defers to the other side. The ASCII family dominates UTF-8 and collapses to
    /// `Binary`; only `Utf8` with `Utf8` stays `Utf8`.
    #[must_use]
    pub const fn unify(self, other: Self) -> Self {
        match (self, other) {
            (Self::Default, other) => other,
            (this, Self::Default) => this,
            (Self::Utf8, Self::Utf8) => Self::Utf8,
            (Self::Binary | Self::UsAscii | Self::Utf8, Self::Binary | Self::UsAscii | Self::Utf8) => {
                Self::Binary
            }
        }
    }

    /// Resolves `Default` to the encoding a packed result is actually reported with.
    #[must_use]
    pub const fn resolve(self) -> Self {
        match self {
            Self::Default => Self::Binary,
            other => other,
        }
    }

    /// Returns the conventional name of the encoding.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self.resolve() {
            Self::UsAscii => "US-ASCII",
            Self::Utf8 => "UTF-8",
            Self::Default | Self::Binary => "ASCII-8BIT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Encoding;

    #[test]
    fn default_defers_to_other() {
        assert_eq!(Encoding::Default.unify(Encoding::Utf8), Encoding::Utf8);
        assert_eq!(Encoding::UsAscii.unify(Encoding::Default), Encoding::UsAscii);
        assert_eq!(Encoding::Default.unify(Encoding::Default), Encoding::Default);
    }

    #[test]
    fn ascii_family_dominates_utf8() {
        assert_eq!(Encoding::Utf8.unify(Encoding::UsAscii), Encoding::Binary);
        assert_eq!(Encoding::Binary.unify(Encoding::Utf8), Encoding::Binary);
        assert_eq!(Encoding::UsAscii.unify(Encoding::UsAscii), Encoding::Binary);
        assert_eq!(Encoding::Utf8.unify(Encoding::Utf8), Encoding::Utf8);
    }

    #[test]
    fn default_resolves_to_binary() {
        assert_eq!(Encoding::Default.resolve(), Encoding::Binary);
        assert_eq!(Encoding::Default.name(), "ASCII-8BIT");
        assert_eq!(Encoding::UsAscii.name(), "US-ASCII");
    }
}

// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Template parser.
//!
//! The parser is push-style: it never builds a syntax tree. Each directive, group boundary, and
//! error is delivered to a [`DirectiveSink`] as soon as it is recognized, so directives that were
//! already delivered stay delivered when a later token turns out to be malformed.

use alloc::format;
use alloc::string::String;
use core::fmt;

use crate::directive::{ByteOrder, Count, Directive, DirectiveKind, IntWidth, lookup};

/// Which direction a template is compiled for.
///
/// Only used to phrase diagnostics and trace events.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Values to bytes.
    Pack,
    /// Bytes to values.
    Unpack,
}

impl Mode {
    /// Returns the lowercase name of the mode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pack => "pack",
            Self::Unpack => "unpack",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives parse events in template order.
pub trait DirectiveSink {
    /// Error type produced by the sink.
    type Error;

    /// The direction this sink builds for.
    fn mode(&self) -> Mode;

    /// A complete directive.
    fn directive(&mut self, directive: Directive) -> Result<(), Self::Error>;

    /// `(`: opens a group.
    fn start_group(&mut self) -> Result<(), Self::Error>;

    /// `)`: closes the innermost group, with the count written after it.
    fn finish_group(&mut self, count: Count) -> Result<(), Self::Error>;

    /// Converts a syntax error message into the sink's error type.
    fn error(&mut self, message: String) -> Self::Error;
}

/// Counts beyond this are rejected as "pack length too big".
const MAX_COUNT: usize = i32::MAX as usize;

const MODIFIER_TYPES: &str = "sSiIlLqQjJ";

/// Parses `format`, pushing events into `sink`.
pub fn parse<S: DirectiveSink>(format: &[u8], sink: &mut S) -> Result<(), S::Error> {
    let mut pos = 0;
    let mut depth = 0_usize;

    while pos < format.len() {
        let letter = format[pos];
        pos += 1;

        match letter {
            b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r' => {}
            b'#' => {
                while pos < format.len() && format[pos] != b'\n' {
                    pos += 1;
                }
            }
            b'(' => {
                depth += 1;
                sink.start_group()?;
            }
            b')' => {
                if depth == 0 {
                    let message = format!("unmatched ')' in '{}'", Shown(format));
                    return Err(sink.error(message));
                }
                depth -= 1;
                let count = match read_count(format, &mut pos) {
                    Ok(count) => count,
                    Err(message) => return Err(sink.error(message)),
                };
                sink.finish_group(count)?;
            }
            _ => {
                let Some(kind) = lookup(letter) else {
                    let message = format!(
                        "unknown {} directive '{}' in '{}'",
                        sink.mode(),
                        Shown(&[letter]),
                        Shown(format)
                    );
                    return Err(sink.error(message));
                };
                let kind = match read_modifiers(letter, kind, format, &mut pos) {
                    Ok(kind) => kind,
                    Err(message) => return Err(sink.error(message)),
                };
                let count = match read_count(format, &mut pos) {
                    Ok(count) => count,
                    Err(message) => return Err(sink.error(message)),
                };
                sink.directive(Directive { kind, count })?;
            }
        }
    }

    if depth != 0 {
        let message = format!("unmatched '(' in '{}'", Shown(format));
        return Err(sink.error(message));
    }
    Ok(())
}

fn read_modifiers(
    letter: u8,
    mut kind: DirectiveKind,
    format: &[u8],
    pos: &mut usize,
) -> Result<DirectiveKind, String> {
    let mut native = false;
    let mut order = None;

    while let Some(&m) = format.get(*pos) {
        let requested = match m {
            b'_' | b'!' => None,
            b'<' => Some(ByteOrder::Little),
            b'>' => Some(ByteOrder::Big),
            _ => break,
        };
        if !DirectiveKind::accepts_modifiers(letter) {
            return Err(format!(
                "'{}' allowed only after types {MODIFIER_TYPES}",
                char::from(m)
            ));
        }
        match requested {
            None => native = true,
            Some(requested) => {
                if order.is_some_and(|o| o != requested) {
                    return Err(String::from("Can't use both '<' and '>'"));
                }
                order = Some(requested);
            }
        }
        *pos += 1;
    }

    if let DirectiveKind::Integer {
        width,
        order: default_order,
        signed,
    } = kind
    {
        let width = if native && matches!(letter, b'l' | b'L') {
            IntWidth::W64
        } else {
            width
        };
        kind = DirectiveKind::Integer {
            width,
            signed,
            order: order.unwrap_or(default_order),
        };
    }
    Ok(kind)
}

fn read_count(format: &[u8], pos: &mut usize) -> Result<Count, String> {
    match format.get(*pos) {
        Some(b'*') => {
            *pos += 1;
            Ok(Count::Star)
        }
        Some(c) if c.is_ascii_digit() => {
            let mut n = 0_usize;
            while let Some(&d) = format.get(*pos) {
                if !d.is_ascii_digit() {
                    break;
                }
                n = n
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(usize::from(d - b'0')))
                    .filter(|&n| n <= MAX_COUNT)
                    .ok_or_else(|| String::from("pack length too big"))?;
                *pos += 1;
            }
            Ok(Count::Explicit(n))
        }
        _ => Ok(Count::None),
    }
}

/// Renders template bytes for diagnostics, escaping anything that is not printable ASCII.
struct Shown<'a>(&'a [u8]);

impl fmt::Display for Shown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", char::from(b))?;
            } else {
                write!(f, "\\x{b:02X}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[derive(Debug, PartialEq)]
    enum Event {
        Directive(Directive),
        Start,
        Finish(Count),
    }

    struct Recorder {
        mode: Mode,
        events: Vec<Event>,
    }

    impl Recorder {
        fn new(mode: Mode) -> Self {
            Self {
                mode,
                events: Vec::new(),
            }
        }
    }

    impl DirectiveSink for Recorder {
        type Error = String;

        fn mode(&self) -> Mode {
            self.mode
        }

        fn directive(&mut self, directive: Directive) -> Result<(), String> {
            self.events.push(Event::Directive(directive));
            Ok(())
        }

        fn start_group(&mut self) -> Result<(), String> {
            self.events.push(Event::Start);
            Ok(())
        }

        fn finish_group(&mut self, count: Count) -> Result<(), String> {
            self.events.push(Event::Finish(count));
            Ok(())
        }

        fn error(&mut self, message: String) -> String {
            message
        }
    }

    fn events(format: &str) -> Vec<Event> {
        let mut r = Recorder::new(Mode::Pack);
        parse(format.as_bytes(), &mut r).unwrap();
        r.events
    }

    fn error(mode: Mode, format: &str) -> String {
        let mut r = Recorder::new(mode);
        parse(format.as_bytes(), &mut r).unwrap_err()
    }

    fn int(width: IntWidth, signed: bool, order: ByteOrder, count: Count) -> Event {
        Event::Directive(Directive {
            kind: DirectiveKind::Integer {
                width,
                signed,
                order,
            },
            count,
        })
    }

    #[test]
    fn counts_and_whitespace() {
        assert_eq!(
            events(" C n3\tN* "),
            [
                int(IntWidth::W8, false, ByteOrder::NATIVE, Count::None),
                int(IntWidth::W16, false, ByteOrder::Big, Count::Explicit(3)),
                int(IntWidth::W32, false, ByteOrder::Big, Count::Star),
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            events("C # ignore n N\nv"),
            [
                int(IntWidth::W8, false, ByteOrder::NATIVE, Count::None),
                int(IntWidth::W16, false, ByteOrder::Little, Count::None),
            ]
        );
    }

    #[test]
    fn modifiers_adjust_width_and_order() {
        assert_eq!(
            events("l_ s> L!<2"),
            [
                int(IntWidth::W64, true, ByteOrder::NATIVE, Count::None),
                int(IntWidth::W16, true, ByteOrder::Big, Count::None),
                int(IntWidth::W64, false, ByteOrder::Little, Count::Explicit(2)),
            ]
        );
    }

    #[test]
    fn groups_carry_counts() {
        assert_eq!(
            events("(CC)2"),
            [
                Event::Start,
                int(IntWidth::W8, false, ByteOrder::NATIVE, Count::None),
                int(IntWidth::W8, false, ByteOrder::NATIVE, Count::None),
                Event::Finish(Count::Explicit(2)),
            ]
        );
    }

    #[test]
    fn modifier_errors() {
        assert_eq!(
            error(Mode::Pack, "Z!"),
            "'!' allowed only after types sSiIlLqQjJ"
        );
        assert_eq!(error(Mode::Pack, "s<>"), "Can't use both '<' and '>'");
    }

    #[test]
    fn unknown_directive_names_mode() {
        assert_eq!(
            error(Mode::Unpack, "Cy"),
            "unknown unpack directive 'y' in 'Cy'"
        );
        assert_eq!(
            error(Mode::Pack, "\x01"),
            "unknown pack directive '\\x01' in '\\x01'"
        );
    }

    #[test]
    fn unbalanced_groups() {
        assert_eq!(error(Mode::Pack, "C)"), "unmatched ')' in 'C)'");
        assert_eq!(error(Mode::Pack, "(C"), "unmatched '(' in '(C'");
    }

    #[test]
    fn huge_counts_are_rejected() {
        assert_eq!(error(Mode::Pack, "C99999999999"), "pack length too big");
    }

    #[test]
    fn directives_before_an_error_are_delivered() {
        let mut r = Recorder::new(Mode::Pack);
        assert!(parse(b"CCy", &mut r).is_err());
        assert_eq!(r.events.len(), 2);
    }
}

// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-run evaluation state shared by pack and unpack.

use alloc::vec::Vec;

use crate::error::FormatError;
use crate::host::Host;

/// A cursor over `[start, end)` of a source (values for pack, bytes for unpack).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Cursor {
    start: usize,
    end: usize,
    position: usize,
}

impl Cursor {
    pub(crate) fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "cursor start past end");
        Self {
            start,
            end,
            position: start,
        }
    }

    pub(crate) fn start(&self) -> usize {
        self.start
    }

    pub(crate) fn end(&self) -> usize {
        self.end
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn remaining(&self) -> usize {
        self.end - self.position
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.position >= self.end
    }

    /// Consumes `count` items and returns where they start.
    pub(crate) fn advance(&mut self, count: usize) -> Result<usize, FormatError> {
        if count > self.remaining() {
            return Err(FormatError::TooFewArguments);
        }
        let start = self.position;
        self.position += count;
        Ok(start)
    }

    /// Like [`Cursor::advance`], but reports a short source with `None`.
    ///
    /// With `consume_partial`, a short read still moves the cursor to `end`.
    pub(crate) fn advance_no_throw(&mut self, count: usize, consume_partial: bool) -> Option<usize> {
        if count > self.remaining() {
            if consume_partial {
                self.position = self.end;
            }
            return None;
        }
        let start = self.position;
        self.position += count;
        Some(start)
    }

    /// Moves to an absolute position; callers validate the range.
    pub(crate) fn set(&mut self, position: usize) {
        debug_assert!(
            (self.start..=self.end).contains(&position),
            "cursor moved outside of its source"
        );
        self.position = position;
    }
}

/// Growable output buffer with an explicit write cursor.
///
/// `buffer.len()` is the physical capacity; bytes past `position` are scratch until written.
#[derive(Debug)]
pub(crate) struct ByteOutput {
    buffer: Vec<u8>,
    position: usize,
}

impl ByteOutput {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: alloc::vec![0; capacity],
            position: 0,
        }
    }

    /// Continues writing after the existing contents of `buffer`.
    pub(crate) fn from_buffer(mut buffer: Vec<u8>, capacity: usize) -> Self {
        let position = buffer.len();
        if capacity > position {
            buffer.resize(capacity, 0);
        }
        Self { buffer, position }
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Grows the buffer so `additional` bytes fit after the cursor: double, or fit if that is
    /// not enough.
    pub(crate) fn ensure_capacity(&mut self, additional: usize) {
        let needed = self.position + additional;
        if needed > self.buffer.len() {
            let grown = needed.max(self.buffer.len() * 2);
            self.buffer.resize(grown, 0);
        }
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        self.ensure_capacity(bytes.len());
        let end = self.position + bytes.len();
        self.buffer[self.position..end].copy_from_slice(bytes);
        self.position = end;
    }

    pub(crate) fn write_byte(&mut self, byte: u8) {
        self.ensure_capacity(1);
        self.buffer[self.position] = byte;
        self.position += 1;
    }

    /// Writes `length` copies of `byte`.
    pub(crate) fn write_repeated(&mut self, byte: u8, length: usize) {
        self.ensure_capacity(length);
        let end = self.position + length;
        self.buffer[self.position..end].fill(byte);
        self.position = end;
    }

    pub(crate) fn write_null_bytes(&mut self, length: usize) {
        self.write_repeated(0, length);
    }

    /// Moves the cursor to `position`, null-filling when moving forward.
    pub(crate) fn set_position(&mut self, position: usize) {
        if position > self.position {
            self.write_null_bytes(position - self.position);
        } else {
            self.position = position;
        }
    }

    /// Moves the cursor back by `count` bytes.
    pub(crate) fn reverse(&mut self, count: usize) -> Result<(), FormatError> {
        if count > self.position {
            return Err(FormatError::OutsideOfString("X"));
        }
        self.position -= count;
        Ok(())
    }

    /// Returns the written bytes, truncated to the cursor.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        self.buffer.truncate(self.position);
        self.buffer
    }
}

/// Counts loop iterations and polls the host every `interval` of them.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Ticker {
    interval: u32,
    until_poll: u32,
}

impl Ticker {
    pub(crate) fn new(interval: u32) -> Self {
        let interval = interval.max(1);
        Self {
            interval,
            until_poll: interval,
        }
    }

    pub(crate) fn tick<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<(), FormatError> {
        self.until_poll -= 1;
        if self.until_poll == 0 {
            self.until_poll = self.interval;
            host.poll()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Interrupted;

    #[test]
    fn advance_stops_at_end() {
        let mut c = Cursor::new(2, 5);
        assert_eq!(c.advance(2), Ok(2));
        assert_eq!(c.advance(2), Err(FormatError::TooFewArguments));
        assert_eq!(c.position(), 4);
        assert_eq!(c.advance(1), Ok(4));
        assert!(c.is_exhausted());
    }

    #[test]
    fn advance_no_throw_clamps_when_partial() {
        let mut c = Cursor::new(0, 3);
        assert_eq!(c.advance_no_throw(4, false), None);
        assert_eq!(c.position(), 0);
        assert_eq!(c.advance_no_throw(4, true), None);
        assert_eq!(c.position(), 3);
    }

    #[test]
    fn output_doubles_or_fits() {
        let mut out = ByteOutput::with_capacity(4);
        out.write_bytes(b"abc");
        out.write_bytes(b"de");
        assert_eq!(out.capacity(), 8);
        out.write_null_bytes(20);
        assert_eq!(out.capacity(), 25);
        assert_eq!(out.position(), 25);
    }

    #[test]
    fn set_position_fills_forward_and_truncates_back() {
        let mut out = ByteOutput::with_capacity(0);
        out.write_bytes(b"abcd");
        out.set_position(2);
        out.set_position(4);
        assert_eq!(out.finish(), b"ab\0\0");
    }

    #[test]
    fn reverse_past_start_fails() {
        let mut out = ByteOutput::from_buffer(b"xy".to_vec(), 0);
        assert_eq!(out.reverse(2), Ok(()));
        assert_eq!(out.reverse(1), Err(FormatError::OutsideOfString("X")));
    }

    #[test]
    fn ticker_polls_on_interval() {
        struct Counting(u32);
        impl Host for Counting {
            fn poll(&mut self) -> Result<(), Interrupted> {
                self.0 += 1;
                Ok(())
            }
        }

        let mut host = Counting(0);
        let mut ticker = Ticker::new(3);
        for _ in 0..7 {
            ticker.tick(&mut host).unwrap();
        }
        assert_eq!(host.0, 2);
    }
}

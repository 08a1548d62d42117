// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing hooks for `format_tape`.
//!
//! Tracing is optional and is designed to be `no_std` friendly.
//! The engine only emits events requested by a [`TraceMask`].
//!
//! To enable tracing, pass a [`TraceMask`] and [`TraceSink`] to [`Packer::run`] or
//! [`Unpacker::run`].

#[cfg(doc)]
use crate::vm::{Packer, Unpacker};

use crate::error::FormatError;
use crate::parser::Mode;

/// A set of trace events requested by a [`TraceSink`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TraceMask(u32);

impl core::ops::BitOr for TraceMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for TraceMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl TraceMask {
    /// No tracing.
    pub const NONE: Self = Self(0);
    /// Trace run boundaries.
    ///
    /// Enables:
    /// - [`TraceSink::run_start`]
    /// - [`TraceSink::run_end`]
    pub const RUN: Self = Self(1 << 0);
    /// Trace each executed leaf operation.
    ///
    /// Enables:
    /// - [`TraceSink::op`]
    pub const OP: Self = Self(1 << 1);
    /// Trace counted and `*` loops.
    ///
    /// Enables:
    /// - [`TraceSink::loop_enter`]
    /// - [`TraceSink::loop_exit`]
    pub const LOOP: Self = Self(1 << 2);

    /// Returns `true` if this mask includes all bits in `other`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// The kind of loop being entered/exited.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoopKind {
    /// A counted loop.
    Repeat {
        /// Iteration count.
        count: usize,
    },
    /// A loop that runs until the source is exhausted.
    Star,
}

/// Run outcome for tracing.
#[derive(Clone, Debug)]
pub enum TraceOutcome<'a> {
    /// Successful run.
    Ok {
        /// Result length (bytes for pack, values for unpack).
        length: usize,
    },
    /// Failed run.
    Error(&'a FormatError),
}

/// A trace sink that can receive engine events.
pub trait TraceSink {
    /// Returns the set of events the sink wants.
    fn mask(&self) -> TraceMask {
        TraceMask::NONE
    }

    /// Called at the start of a run.
    ///
    /// Called only if the run's mask includes [`TraceMask::RUN`].
    ///
    /// - `mode`: pack or unpack
    /// - `format`: the template the tree was compiled from
    /// - `source_len`: number of values (pack) or bytes (unpack) available
    fn run_start(&mut self, _mode: Mode, _format: &[u8], _source_len: usize) {}

    /// Called before each leaf operation.
    ///
    /// Called only if the run's mask includes [`TraceMask::OP`].
    ///
    /// - `op`: operation mnemonic
    /// - `position`: source cursor before the operation
    fn op(&mut self, _mode: Mode, _op: &'static str, _position: usize) {}

    /// Called when entering a loop.
    ///
    /// Called only if the run's mask includes [`TraceMask::LOOP`].
    fn loop_enter(&mut self, _mode: Mode, _kind: LoopKind) {}

    /// Called when a loop completes.
    ///
    /// Called only if the run's mask includes [`TraceMask::LOOP`]. Not called for loops aborted
    /// by an error.
    fn loop_exit(&mut self, _mode: Mode, _kind: LoopKind, _iterations: usize) {}

    /// Called at the end of a run.
    ///
    /// Called only if the run's mask includes [`TraceMask::RUN`].
    fn run_end(&mut self, _mode: Mode, _outcome: TraceOutcome<'_>) {}
}

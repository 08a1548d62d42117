// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `format_tape_profiling`: forwards `format_tape` trace events to `tracing`.
//!
//! [`ProfilingTraceSink`] opens a span per run and per loop within a run, emits an event per
//! executed operation, and keeps per-run counters that can be inspected after the run.
//!
//! Run labels are resolved through a [`LabelResolver`]; [`TemplateLabels`] names runs after their
//! template.

use std::collections::BTreeMap;

use format_tape::parser::Mode;
use format_tape::trace::{LoopKind, TraceMask, TraceOutcome, TraceSink};
use tracing::span::EnteredSpan;

/// Resolves human-readable labels for runs and operations.
pub trait LabelResolver {
    /// Label for a run; `None` falls back to the mode name.
    fn run_label(&mut self, _mode: Mode, _format: &[u8]) -> Option<String> {
        None
    }

    /// Label for an operation; `None` uses the mnemonic.
    fn op_label(&mut self, _mode: Mode, _op: &'static str) -> Option<String> {
        None
    }
}

/// Labels runs as `pack "<template>"` / `unpack "<template>"`.
#[derive(Clone, Debug, Default)]
pub struct TemplateLabels;

impl LabelResolver for TemplateLabels {
    fn run_label(&mut self, mode: Mode, format: &[u8]) -> Option<String> {
        Some(format!("{mode} \"{}\"", format.escape_ascii()))
    }
}

/// Counters accumulated across the runs a sink has observed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Completed runs, successful or not.
    pub runs: u64,
    /// Runs that ended with an error.
    pub errors: u64,
    /// Leaf operations executed.
    pub ops: u64,
    /// Loops completed.
    pub loops: u64,
    /// Total loop iterations.
    pub iterations: u64,
    /// Executions per operation mnemonic.
    pub per_op: BTreeMap<&'static str, u64>,
}

/// A [`TraceSink`] that reports to the current `tracing` subscriber.
#[derive(Debug)]
pub struct ProfilingTraceSink<R = TemplateLabels> {
    resolver: R,
    mask: TraceMask,
    spans: Vec<EnteredSpan>,
    stats: RunStats,
}

impl Default for ProfilingTraceSink<TemplateLabels> {
    fn default() -> Self {
        Self::with_resolver(TemplateLabels)
    }
}

impl ProfilingTraceSink<TemplateLabels> {
    /// Creates a sink that labels runs by template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: LabelResolver> ProfilingTraceSink<R> {
    /// Creates a sink with a custom label resolver.
    #[must_use]
    pub fn with_resolver(resolver: R) -> Self {
        Self {
            resolver,
            mask: TraceMask::RUN | TraceMask::OP | TraceMask::LOOP,
            spans: Vec::new(),
            stats: RunStats::default(),
        }
    }

    /// Restricts the events the sink asks for.
    #[must_use]
    pub fn with_mask(mut self, mask: TraceMask) -> Self {
        self.mask = mask;
        self
    }

    /// Counters collected so far.
    #[must_use]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Returns the counters and resets them.
    pub fn take_stats(&mut self) -> RunStats {
        std::mem::take(&mut self.stats)
    }

    /// The label resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }
}

impl<R: LabelResolver> TraceSink for ProfilingTraceSink<R> {
    fn mask(&self) -> TraceMask {
        self.mask
    }

    fn run_start(&mut self, mode: Mode, format: &[u8], source_len: usize) {
        let label = self
            .resolver
            .run_label(mode, format)
            .unwrap_or_else(|| mode.name().to_owned());
        let span = tracing::info_span!("format_tape.run", %mode, label = %label, source_len);
        self.spans.push(span.entered());
    }

    fn op(&mut self, mode: Mode, op: &'static str, position: usize) {
        self.stats.ops += 1;
        *self.stats.per_op.entry(op).or_default() += 1;
        match self.resolver.op_label(mode, op) {
            Some(label) => tracing::trace!(op = %label, position, "op"),
            None => tracing::trace!(op, position, "op"),
        }
    }

    fn loop_enter(&mut self, _mode: Mode, kind: LoopKind) {
        // Loop spans nest under the run span; only `run_end` can close them after an error.
        if self.spans.is_empty() {
            tracing::debug!(?kind, "loop");
            return;
        }
        let span = match kind {
            LoopKind::Repeat { count } => tracing::debug_span!("format_tape.repeat", count),
            LoopKind::Star => tracing::debug_span!("format_tape.star"),
        };
        self.spans.push(span.entered());
    }

    fn loop_exit(&mut self, _mode: Mode, _kind: LoopKind, iterations: usize) {
        self.stats.loops += 1;
        self.stats.iterations += iterations as u64;
        tracing::debug!(iterations, "loop done");
        if self.spans.len() > 1 {
            self.spans.pop();
        }
    }

    fn run_end(&mut self, _mode: Mode, outcome: TraceOutcome<'_>) {
        self.stats.runs += 1;
        match outcome {
            TraceOutcome::Ok { length } => tracing::info!(length, "run done"),
            TraceOutcome::Error(error) => {
                self.stats.errors += 1;
                tracing::warn!(%error, "run failed");
            }
        }
        // Loops aborted by an error never see `loop_exit`.
        while self.spans.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_labels_escape_bytes() {
        let mut labels = TemplateLabels;
        assert_eq!(
            labels.run_label(Mode::Unpack, b"C\x01*"),
            Some(String::from("unpack \"C\\x01*\""))
        );
    }

    #[test]
    fn stats_count_without_subscriber() {
        let mut sink = ProfilingTraceSink::new();
        sink.run_start(Mode::Pack, b"C2", 2);
        sink.loop_enter(Mode::Pack, LoopKind::Repeat { count: 2 });
        sink.op(Mode::Pack, "write_int", 0);
        sink.op(Mode::Pack, "write_int", 1);
        sink.loop_exit(Mode::Pack, LoopKind::Repeat { count: 2 }, 2);
        sink.run_end(Mode::Pack, TraceOutcome::Ok { length: 2 });

        let stats = sink.take_stats();
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.ops, 2);
        assert_eq!(stats.iterations, 2);
        assert_eq!(stats.per_op.get("write_int"), Some(&2));
        assert_eq!(sink.stats(), &RunStats::default());
    }

    #[test]
    fn loops_outside_a_run_open_no_spans() {
        let mut sink = ProfilingTraceSink::new().with_mask(TraceMask::OP | TraceMask::LOOP);
        sink.loop_enter(Mode::Unpack, LoopKind::Star);
        sink.loop_enter(Mode::Unpack, LoopKind::Repeat { count: 3 });
        assert!(sink.spans.is_empty());
        sink.loop_exit(Mode::Unpack, LoopKind::Repeat { count: 3 }, 3);
        assert_eq!(sink.stats().loops, 1);

        sink.run_start(Mode::Unpack, b"(C)*", 1);
        sink.loop_enter(Mode::Unpack, LoopKind::Star);
        assert_eq!(sink.spans.len(), 2);
        sink.loop_exit(Mode::Unpack, LoopKind::Star, 1);
        sink.loop_exit(Mode::Unpack, LoopKind::Star, 1);
        assert_eq!(sink.spans.len(), 1);
        sink.run_end(Mode::Unpack, TraceOutcome::Ok { length: 1 });
        assert!(sink.spans.is_empty());
    }
}

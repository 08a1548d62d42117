// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compilation entry points and the pack/unpack drivers.
//!
//! A template is compiled once into an immutable tree ([`CompiledPack`] / [`CompiledUnpack`]),
//! then run any number of times, from any number of threads, each run with fresh state.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::builder::BuildConfig;
use crate::encoding::Encoding;
use crate::error::FormatError;
use crate::host::{PackHost, UnpackHost, ValueHost};
use crate::node::{Node, execute};
use crate::pack::{PackBuilder, PackOp, PackState};
use crate::parser::{Mode, parse};
use crate::state::ByteOutput;
use crate::trace::{TraceMask, TraceOutcome, TraceSink};
use crate::unpack::{UnpackBuilder, UnpackOp, UnpackState};
use crate::value::Value;

/// What a fixed-count unpack read does when the input runs out.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ShortRead {
    /// Raise [`FormatError::TooFewArguments`].
    #[default]
    Error,
    /// Numeric and pointer reads yield nil without moving; strings return what is available;
    /// `U` and `w` stop quietly.
    Nil,
}

/// Run-time limits.
#[derive(Clone, Debug)]
pub struct Limits {
    /// Loop iterations between [`Host::poll`](crate::host::Host::poll) calls.
    pub poll_interval: u32,
    /// Short-read policy for unpack.
    pub short_read: ShortRead,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            poll_interval: 1024,
            short_read: ShortRead::Error,
        }
    }
}

/// A compiled pack template.
#[derive(Debug)]
pub struct CompiledPack {
    root: Node<PackOp>,
    encoding: Encoding,
    format: Box<[u8]>,
    output_hint: AtomicUsize,
}

impl CompiledPack {
    /// The operation tree.
    #[must_use]
    pub fn root(&self) -> &Node<PackOp> {
        &self.root
    }

    /// The unified encoding preference of the template's directives.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The template this tree was compiled from.
    #[must_use]
    pub fn format(&self) -> &[u8] {
        &self.format
    }

    /// Largest output length seen so far; used to pre-size the next run's buffer.
    #[must_use]
    pub fn output_hint(&self) -> usize {
        self.output_hint.load(Ordering::Relaxed)
    }
}

/// A compiled unpack template.
#[derive(Debug)]
pub struct CompiledUnpack {
    root: Node<UnpackOp>,
    format: Box<[u8]>,
    output_hint: AtomicUsize,
}

impl CompiledUnpack {
    /// The operation tree.
    #[must_use]
    pub fn root(&self) -> &Node<UnpackOp> {
        &self.root
    }

    /// The template this tree was compiled from.
    #[must_use]
    pub fn format(&self) -> &[u8] {
        &self.format
    }

    /// Largest value count seen so far; used to pre-size the next run's output.
    #[must_use]
    pub fn output_hint(&self) -> usize {
        self.output_hint.load(Ordering::Relaxed)
    }
}

/// Compiles a pack template.
pub fn compile_pack(format: &[u8], config: &BuildConfig) -> Result<CompiledPack, FormatError> {
    let mut builder = PackBuilder::new(*config);
    parse(format, &mut builder)?;
    let (root, encoding) = builder.finish()?;
    Ok(CompiledPack {
        root,
        encoding,
        format: format.into(),
        output_hint: AtomicUsize::new(0),
    })
}

/// Compiles an unpack template.
pub fn compile_unpack(format: &[u8], config: &BuildConfig) -> Result<CompiledUnpack, FormatError> {
    let mut builder = UnpackBuilder::new(*config);
    parse(format, &mut builder)?;
    Ok(CompiledUnpack {
        root: builder.finish()?,
        format: format.into(),
        output_hint: AtomicUsize::new(0),
    })
}

/// The output of a pack run.
#[derive(Clone, Debug)]
pub struct PackResult<R> {
    /// Packed bytes, exactly `length` long.
    pub bytes: Vec<u8>,
    /// Output length.
    pub length: usize,
    /// Encoding the bytes should be tagged with.
    pub encoding: Encoding,
    /// Handles pinned by `p`/`P`, in evaluation order; `None` if the template pinned nothing.
    pub associated: Option<Vec<R>>,
}

/// The output of an unpack run.
#[derive(Clone, Debug, PartialEq)]
pub struct UnpackResult {
    /// Unpacked values.
    pub values: Vec<Value>,
    /// Number of values.
    pub length: usize,
}

/// Runs pack trees against a host.
pub struct Packer<H: PackHost> {
    host: H,
    limits: Limits,
}

impl<H: PackHost> fmt::Debug for Packer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packer")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl<H: PackHost> Packer<H> {
    /// Creates a packer with `host` and `limits`.
    #[must_use]
    pub fn new(host: H, limits: Limits) -> Self {
        Self { host, limits }
    }

    /// The host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Consumes the packer and returns its host.
    pub fn into_host(self) -> H {
        self.host
    }

    /// Packs `values` into a fresh buffer.
    ///
    /// Tracing is controlled by `trace_mask`; pass `None` for `trace` to disable tracing.
    pub fn run(
        &mut self,
        compiled: &CompiledPack,
        values: &[H::Value],
        trace_mask: TraceMask,
        trace: Option<&mut dyn TraceSink>,
    ) -> Result<PackResult<H::Retained>, FormatError> {
        let output = ByteOutput::with_capacity(compiled.output_hint());
        self.run_with_output(compiled, values, output, trace_mask, trace)
    }

    /// Packs `values` after the existing contents of `buffer`.
    ///
    /// `@` positions stay absolute within `buffer`.
    pub fn run_into(
        &mut self,
        compiled: &CompiledPack,
        values: &[H::Value],
        buffer: Vec<u8>,
        trace_mask: TraceMask,
        trace: Option<&mut dyn TraceSink>,
    ) -> Result<PackResult<H::Retained>, FormatError> {
        let capacity = compiled.output_hint().max(buffer.len());
        let output = ByteOutput::from_buffer(buffer, capacity);
        self.run_with_output(compiled, values, output, trace_mask, trace)
    }

    fn run_with_output(
        &mut self,
        compiled: &CompiledPack,
        values: &[H::Value],
        output: ByteOutput,
        trace_mask: TraceMask,
        mut trace: Option<&mut dyn TraceSink>,
    ) -> Result<PackResult<H::Retained>, FormatError> {
        if trace_mask.contains(TraceMask::RUN)
            && let Some(t) = trace.as_mut()
        {
            let t: &mut dyn TraceSink = &mut **t;
            t.run_start(Mode::Pack, compiled.format(), values.len());
        }

        let result = self.run_body(compiled, values, output, trace_mask, &mut trace);

        if trace_mask.contains(TraceMask::RUN)
            && let Some(t) = trace.as_mut()
        {
            let outcome = match &result {
                Ok(r) => TraceOutcome::Ok { length: r.length },
                Err(e) => TraceOutcome::Error(e),
            };
            let t: &mut dyn TraceSink = &mut **t;
            t.run_end(Mode::Pack, outcome);
        }

        result
    }

    fn run_body(
        &mut self,
        compiled: &CompiledPack,
        values: &[H::Value],
        output: ByteOutput,
        trace_mask: TraceMask,
        trace: &mut Option<&mut dyn TraceSink>,
    ) -> Result<PackResult<H::Retained>, FormatError> {
        let mut state = PackState::new(
            &mut self.host,
            values,
            output,
            self.limits.poll_interval,
            trace_mask,
            trace,
        );
        execute(&compiled.root, &mut state)?;
        let (bytes, associated) = state.finish();
        compiled
            .output_hint
            .fetch_max(bytes.len(), Ordering::Relaxed);
        Ok(PackResult {
            length: bytes.len(),
            bytes,
            encoding: compiled.encoding.resolve(),
            associated,
        })
    }
}

/// Runs unpack trees against a host.
pub struct Unpacker<H: UnpackHost> {
    host: H,
    limits: Limits,
}

impl<H: UnpackHost> fmt::Debug for Unpacker<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unpacker")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl<H: UnpackHost> Unpacker<H> {
    /// Creates an unpacker with `host` and `limits`.
    #[must_use]
    pub fn new(host: H, limits: Limits) -> Self {
        Self { host, limits }
    }

    /// The host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Consumes the unpacker and returns its host.
    pub fn into_host(self) -> H {
        self.host
    }

    /// Unpacks all of `bytes`.
    pub fn run(
        &mut self,
        compiled: &CompiledUnpack,
        bytes: &[u8],
        trace_mask: TraceMask,
        trace: Option<&mut dyn TraceSink>,
    ) -> Result<UnpackResult, FormatError> {
        self.run_at(compiled, bytes, 0, trace_mask, trace)
    }

    /// Unpacks `bytes[offset..]`. `@` positions are relative to `offset`.
    pub fn run_at(
        &mut self,
        compiled: &CompiledUnpack,
        bytes: &[u8],
        offset: usize,
        trace_mask: TraceMask,
        mut trace: Option<&mut dyn TraceSink>,
    ) -> Result<UnpackResult, FormatError> {
        if trace_mask.contains(TraceMask::RUN)
            && let Some(t) = trace.as_mut()
        {
            let t: &mut dyn TraceSink = &mut **t;
            t.run_start(Mode::Unpack, compiled.format(), bytes.len());
        }

        let result = self.run_body(compiled, bytes, offset, trace_mask, &mut trace);

        if trace_mask.contains(TraceMask::RUN)
            && let Some(t) = trace.as_mut()
        {
            let outcome = match &result {
                Ok(r) => TraceOutcome::Ok { length: r.length },
                Err(e) => TraceOutcome::Error(e),
            };
            let t: &mut dyn TraceSink = &mut **t;
            t.run_end(Mode::Unpack, outcome);
        }

        result
    }

    /// Unpacks `bytes[offset..]` and returns only the first value, or nil if there is none.
    pub fn run_first(
        &mut self,
        compiled: &CompiledUnpack,
        bytes: &[u8],
        offset: usize,
        trace_mask: TraceMask,
        trace: Option<&mut dyn TraceSink>,
    ) -> Result<Value, FormatError> {
        let result = self.run_at(compiled, bytes, offset, trace_mask, trace)?;
        Ok(result.values.into_iter().next().unwrap_or(Value::Nil))
    }

    fn run_body(
        &mut self,
        compiled: &CompiledUnpack,
        bytes: &[u8],
        offset: usize,
        trace_mask: TraceMask,
        trace: &mut Option<&mut dyn TraceSink>,
    ) -> Result<UnpackResult, FormatError> {
        if offset > bytes.len() {
            return Err(FormatError::OutsideOfString("offset"));
        }
        let values = Vec::with_capacity(compiled.output_hint());
        let mut state = UnpackState::new(
            &mut self.host,
            bytes,
            offset,
            values,
            self.limits.short_read,
            self.limits.poll_interval,
            trace_mask,
            trace,
        );
        execute(&compiled.root, &mut state)?;
        let values = state.finish();
        compiled
            .output_hint
            .fetch_max(values.len(), Ordering::Relaxed);
        Ok(UnpackResult {
            length: values.len(),
            values,
        })
    }
}

/// Packs `values` with the default host and limits.
///
/// Pinned pointers stay alive through [`PackResult::associated`].
pub fn pack(
    format: impl AsRef<[u8]>,
    values: &[Value],
) -> Result<PackResult<Arc<[u8]>>, FormatError> {
    let compiled = compile_pack(format.as_ref(), &BuildConfig::default())?;
    Packer::new(ValueHost::new(), Limits::default()).run(&compiled, values, TraceMask::NONE, None)
}

/// Unpacks `bytes` with the default host and limits.
pub fn unpack(format: impl AsRef<[u8]>, bytes: &[u8]) -> Result<Vec<Value>, FormatError> {
    let compiled = compile_unpack(format.as_ref(), &BuildConfig::default())?;
    let result =
        Unpacker::new(ValueHost::new(), Limits::default()).run(&compiled, bytes, TraceMask::NONE, None)?;
    Ok(result.values)
}

/// Unpacks `bytes` and returns the first value, or nil.
pub fn unpack1(format: impl AsRef<[u8]>, bytes: &[u8]) -> Result<Value, FormatError> {
    let compiled = compile_unpack(format.as_ref(), &BuildConfig::default())?;
    Unpacker::new(ValueHost::new(), Limits::default()).run_first(
        &compiled,
        bytes,
        0,
        TraceMask::NONE,
        None,
    )
}

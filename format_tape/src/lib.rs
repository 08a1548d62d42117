// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `format_tape`: compiles `pack`/`unpack` templates into reusable operation trees and runs them.
//!
//! A template such as `"n C2 a*"` is parsed once into an immutable tree
//! ([`vm::CompiledPack`] / [`vm::CompiledUnpack`]). Each run gets fresh evaluation state, so a
//! compiled tree can be shared between threads and cached ([`cache::FormatCache`], `std` only).
//!
//! Values reach the engine through a host ([`host::PackHost`] / [`host::UnpackHost`]);
//! [`host::ValueHost`] covers the built-in [`value::Value`] model.
//!
//! ## Example
//!
//! ```
//! use format_tape::value::Value;
//! use format_tape::{pack, unpack};
//!
//! let packed = pack("n C2 a*", &[
//!     Value::Int(0x0102),
//!     Value::Int(3),
//!     Value::Int(4),
//!     Value::from("hi"),
//! ])?;
//! assert_eq!(packed.bytes, b"\x01\x02\x03\x04hi");
//!
//! let values = unpack("n C2 a*", &packed.bytes)?;
//! assert_eq!(values[0], Value::Int(0x0102));
//! assert_eq!(values[3].as_bytes(), Some(&b"hi"[..]));
//! # Ok::<(), format_tape::error::FormatError>(())
//! ```
//!
//! Embedders with their own object model implement the host traits and drive
//! [`vm::Packer`] / [`vm::Unpacker`] directly:
//!
//! ```
//! use format_tape::builder::BuildConfig;
//! use format_tape::host::ValueHost;
//! use format_tape::trace::TraceMask;
//! use format_tape::value::Value;
//! use format_tape::vm::{Limits, Packer, compile_pack};
//!
//! let compiled = compile_pack(b"N*", &BuildConfig::default())?;
//! let mut packer = Packer::new(ValueHost::new(), Limits::default());
//! let out = packer.run(&compiled, &[Value::Int(1), Value::Int(2)], TraceMask::NONE, None)?;
//! assert_eq!(out.length, 8);
//! # Ok::<(), format_tape::error::FormatError>(())
//! ```

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod builder;
#[cfg(feature = "std")]
pub mod cache;
pub mod codec;
pub mod directive;
pub mod disasm;
pub(crate) mod encoded;
pub mod encoding;
pub mod error;
pub mod host;
pub mod node;
pub mod pack;
pub mod parser;
pub(crate) mod state;
pub(crate) mod strings;
pub mod trace;
pub mod unpack;
pub(crate) mod utf8;
pub mod value;
pub mod vm;

pub use vm::{pack, unpack, unpack1};

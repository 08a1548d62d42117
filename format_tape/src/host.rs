// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host interfaces for `format_tape`.
//!
//! The engine has no object model of its own. Conversions, pointer bookkeeping, and cooperative
//! cancellation are delegated to an embedder-provided host:
//! - [`PackHost`] converts opaque values into integers, floats, and byte strings.
//! - [`UnpackHost`] resolves pointers read from a buffer.
//!
//! [`ValueHost`] implements both over the built-in [`Value`] model.

use alloc::borrow::Cow;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::ToString;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};

use crate::error::FormatError;
use crate::value::{Integer, Value};

/// The host asked the current run to stop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Interrupted;

/// Behavior shared by pack and unpack hosts.
pub trait Host {
    /// Cooperative cancellation point.
    ///
    /// Called periodically from counted and `*` loops. Returning `Err` aborts the run with
    /// [`FormatError::Interrupted`].
    fn poll(&mut self) -> Result<(), Interrupted> {
        Ok(())
    }
}

/// How a value is turned into bytes for a string directive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StrConversion {
    /// Implicit conversion (`to_str`): only string-like values are accepted.
    Implicit,
    /// Display conversion (`to_s`): numbers render as text.
    Display,
}

/// A byte string pinned for the lifetime of a pack result.
#[derive(Clone, Debug)]
pub struct Pinned<R> {
    /// Address written into the packed output.
    pub address: u64,
    /// Length of the pinned string, excluding any terminator.
    pub len: usize,
    /// Handle that keeps the pinned memory alive.
    pub retained: R,
}

/// Conversions used while packing.
pub trait PackHost: Host {
    /// The element type of the value sequence being packed.
    type Value;
    /// Handle returned for pinned pointers and collected into
    /// [`PackResult::associated`](crate::vm::PackResult::associated).
    type Retained;

    /// Implicit integer conversion.
    fn to_integer(&mut self, value: &Self::Value) -> Result<Integer, FormatError>;

    /// Implicit float conversion.
    fn to_float(&mut self, value: &Self::Value) -> Result<f64, FormatError>;

    /// String conversion.
    ///
    /// Returns `Ok(None)` for a nil value; directives decide whether nil is acceptable.
    fn to_bytes<'v>(
        &mut self,
        value: &'v Self::Value,
        conversion: StrConversion,
    ) -> Result<Option<Cow<'v, [u8]>>, FormatError>;

    /// Pins a string value so its address can be written (`p` / `P`).
    ///
    /// Returns `Ok(None)` for nil, which packs as a null pointer.
    fn pin_bytes(
        &mut self,
        value: &Self::Value,
    ) -> Result<Option<Pinned<Self::Retained>>, FormatError>;
}

/// Pointer resolution used while unpacking.
pub trait UnpackHost: Host {
    /// Reads the memory behind a non-null `address`.
    ///
    /// With `limit`, returns exactly that many bytes where available (`P`). Without, reads up
    /// to the first NUL (`p`).
    fn read_pointer(&mut self, address: u64, limit: Option<usize>) -> Result<Vec<u8>, FormatError>;
}

impl<H: Host + ?Sized> Host for &mut H {
    fn poll(&mut self) -> Result<(), Interrupted> {
        (**self).poll()
    }
}

impl<H: PackHost + ?Sized> PackHost for &mut H {
    type Value = H::Value;
    type Retained = H::Retained;

    fn to_integer(&mut self, value: &Self::Value) -> Result<Integer, FormatError> {
        (**self).to_integer(value)
    }

    fn to_float(&mut self, value: &Self::Value) -> Result<f64, FormatError> {
        (**self).to_float(value)
    }

    fn to_bytes<'v>(
        &mut self,
        value: &'v Self::Value,
        conversion: StrConversion,
    ) -> Result<Option<Cow<'v, [u8]>>, FormatError> {
        (**self).to_bytes(value, conversion)
    }

    fn pin_bytes(
        &mut self,
        value: &Self::Value,
    ) -> Result<Option<Pinned<Self::Retained>>, FormatError> {
        (**self).pin_bytes(value)
    }
}

impl<H: UnpackHost + ?Sized> UnpackHost for &mut H {
    fn read_pointer(&mut self, address: u64, limit: Option<usize>) -> Result<Vec<u8>, FormatError> {
        (**self).read_pointer(address, limit)
    }
}

/// Default host over [`Value`].
///
/// Pinned strings are copied into reference-counted, NUL-terminated buffers and registered by
/// address, so a buffer packed with `p`/`P` can be unpacked again through the same host.
///
/// The registry holds weak references only. A pointer resolves while the pack result that
/// retained it is alive; dead entries are swept on the next pin.
#[derive(Debug, Default)]
pub struct ValueHost {
    pointers: BTreeMap<u64, Weak<[u8]>>,
}

impl ValueHost {
    /// Creates a host with an empty pointer registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pinned strings still kept alive by a pack result.
    #[must_use]
    pub fn pinned_count(&self) -> usize {
        self.pointers
            .values()
            .filter(|pinned| pinned.strong_count() > 0)
            .count()
    }
}

impl Host for ValueHost {}

impl PackHost for ValueHost {
    type Value = Value;
    type Retained = Arc<[u8]>;

    fn to_integer(&mut self, value: &Value) -> Result<Integer, FormatError> {
        match value {
            Value::Int(v) => Ok(Integer::Small(*v)),
            Value::BigInt(v) => Ok(Integer::normalize(v.clone())),
            Value::Float(v) => float_to_integer(*v),
            Value::Nil | Value::Str(_) => Err(FormatError::no_implicit_conversion(
                value.type_name(),
                "Integer",
            )),
        }
    }

    fn to_float(&mut self, value: &Value) -> Result<f64, FormatError> {
        match value {
            Value::Float(v) => Ok(*v),
            #[allow(clippy::cast_precision_loss, reason = "matches host float conversion")]
            Value::Int(v) => Ok(*v as f64),
            Value::BigInt(v) => v
                .to_f64()
                .ok_or_else(|| FormatError::Range(format!("{v} out of range of Float"))),
            Value::Nil | Value::Str(_) => Err(FormatError::no_implicit_conversion(
                value.type_name(),
                "Float",
            )),
        }
    }

    fn to_bytes<'v>(
        &mut self,
        value: &'v Value,
        conversion: StrConversion,
    ) -> Result<Option<Cow<'v, [u8]>>, FormatError> {
        match (value, conversion) {
            (Value::Nil, _) => Ok(None),
            (Value::Str(s), _) => Ok(Some(Cow::Borrowed(&s.bytes))),
            (Value::Int(v), StrConversion::Display) => Ok(Some(owned(v.to_string()))),
            (Value::BigInt(v), StrConversion::Display) => Ok(Some(owned(v.to_string()))),
            (Value::Float(v), StrConversion::Display) => Ok(Some(owned(display_float(*v)))),
            (Value::Int(_) | Value::BigInt(_) | Value::Float(_), StrConversion::Implicit) => Err(
                FormatError::no_implicit_conversion(value.type_name(), "String"),
            ),
        }
    }

    fn pin_bytes(&mut self, value: &Value) -> Result<Option<Pinned<Arc<[u8]>>>, FormatError> {
        let bytes = match value {
            Value::Nil => return Ok(None),
            Value::Str(s) => &s.bytes,
            _ => {
                return Err(FormatError::no_implicit_conversion(
                    value.type_name(),
                    "String",
                ));
            }
        };
        let mut terminated = Vec::with_capacity(bytes.len() + 1);
        terminated.extend_from_slice(bytes);
        terminated.push(0);
        let pinned: Arc<[u8]> = Arc::from(terminated);
        let address = pinned.as_ptr() as usize as u64;
        self.pointers.retain(|_, pinned| pinned.strong_count() > 0);
        self.pointers.insert(address, Arc::downgrade(&pinned));
        Ok(Some(Pinned {
            address,
            len: bytes.len(),
            retained: pinned,
        }))
    }
}

impl UnpackHost for ValueHost {
    fn read_pointer(&mut self, address: u64, limit: Option<usize>) -> Result<Vec<u8>, FormatError> {
        let pinned = self
            .pointers
            .get(&address)
            .and_then(Weak::upgrade)
            .ok_or_else(|| FormatError::cant_convert("no associated pointer"))?;
        let bytes = match limit {
            Some(limit) => {
                let stored = pinned.len().saturating_sub(1);
                &pinned[..limit.min(stored)]
            }
            None => {
                let end = memchr::memchr(0, &pinned).unwrap_or(pinned.len());
                &pinned[..end]
            }
        };
        Ok(bytes.to_vec())
    }
}

fn owned(text: alloc::string::String) -> Cow<'static, [u8]> {
    Cow::Owned(text.into_bytes())
}

fn float_to_integer(value: f64) -> Result<Integer, FormatError> {
    if !value.is_finite() {
        return Err(FormatError::Range(format!(
            "float {} out of range of integer",
            display_float(value)
        )));
    }
    let truncated = value.trunc();
    match truncated.to_i64() {
        Some(v) => Ok(Integer::Small(v)),
        None => BigInt::from_f64(truncated)
            .map(Integer::Big)
            .ok_or_else(|| FormatError::Range(format!("float {value} out of range of integer"))),
    }
}

/// Renders a float the way the host language's `to_s` does for common values.
fn display_float(value: f64) -> alloc::string::String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

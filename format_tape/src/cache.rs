// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thread-safe cache of compiled templates keyed by template bytes.
//!
//! Compiling is cheap compared to the runs it serves, so two threads that miss on the same
//! template both compile it and the last insert wins. Trees are immutable, so either copy is
//! equally valid.

use alloc::boxed::Box;
use alloc::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::builder::BuildConfig;
use crate::error::FormatError;
use crate::vm::{CompiledPack, CompiledUnpack, compile_pack, compile_unpack};

/// Compiled pack and unpack trees shared across threads.
#[derive(Debug, Default)]
pub struct FormatCache {
    config: BuildConfig,
    packs: RwLock<HashMap<Box<[u8]>, Arc<CompiledPack>>>,
    unpacks: RwLock<HashMap<Box<[u8]>, Arc<CompiledUnpack>>>,
}

impl FormatCache {
    /// Creates an empty cache that compiles with `config`.
    #[must_use]
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            packs: RwLock::new(HashMap::new()),
            unpacks: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the compiled pack tree for `format`, compiling it on a miss.
    ///
    /// Invalid templates are not cached.
    pub fn pack(&self, format: &[u8]) -> Result<Arc<CompiledPack>, FormatError> {
        if let Some(hit) = self.packs.read().get(format) {
            return Ok(Arc::clone(hit));
        }
        tracing::debug!(format = %format.escape_ascii(), "compiling pack template");
        let compiled = Arc::new(compile_pack(format, &self.config)?);
        self.packs
            .write()
            .insert(format.into(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Returns the compiled unpack tree for `format`, compiling it on a miss.
    pub fn unpack(&self, format: &[u8]) -> Result<Arc<CompiledUnpack>, FormatError> {
        if let Some(hit) = self.unpacks.read().get(format) {
            return Ok(Arc::clone(hit));
        }
        tracing::debug!(format = %format.escape_ascii(), "compiling unpack template");
        let compiled = Arc::new(compile_unpack(format, &self.config)?);
        self.unpacks
            .write()
            .insert(format.into(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Number of cached pack and unpack trees.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        (self.packs.read().len(), self.unpacks.read().len())
    }

    /// Drops every cached tree.
    pub fn clear(&self) {
        self.packs.write().clear();
        self.unpacks.write().clear();
    }
}

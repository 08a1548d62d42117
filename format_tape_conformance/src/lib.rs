// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conformance tests for `format_tape` live in `tests/`.
//!
//! Run with:
//! `cargo test -p format_tape_conformance`

// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `format_tape` live in `benches/`.
//!
//! Run with:
//! `cargo bench -p format_tape_wind_tunnel`

// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Disassembler example.
//!
//! Run with:
//! `cargo run -p format_tape --example disasm -- "n2 (a3 C)8 U*"`

use format_tape::builder::BuildConfig;
use format_tape::disasm::{disassemble_pack, disassemble_unpack};
use format_tape::vm::{compile_pack, compile_unpack};

fn main() {
    let format = std::env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("N n (C a4)6 Z* m0"));
    let config = BuildConfig::default();

    match compile_pack(format.as_bytes(), &config) {
        Ok(compiled) => println!("{}", disassemble_pack(&compiled)),
        Err(e) => eprintln!("pack: {e}"),
    }
    match compile_unpack(format.as_bytes(), &config) {
        Ok(compiled) => println!("{}", disassemble_unpack(&compiled)),
        Err(e) => eprintln!("unpack: {e}"),
    }
}

// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Disassembler for compiled templates.
//!
//! This module provides a stable, human-readable text form of a compiled tree via
//! [`core::fmt::Display`]: one node per line, children indented by two spaces.

#![allow(clippy::module_name_repetitions, reason = "public API module")]

use core::fmt;

use crate::node::Node;
use crate::pack::PackOp;
use crate::parser::Mode;
use crate::unpack::UnpackOp;
use crate::vm::{CompiledPack, CompiledUnpack};

/// Disassembles a compiled pack template.
#[must_use]
pub fn disassemble_pack(compiled: &CompiledPack) -> Disassembly<'_, PackOp> {
    Disassembly {
        mode: Mode::Pack,
        format: compiled.format(),
        encoding: Some(compiled.encoding().resolve().name()),
        root: compiled.root(),
    }
}

/// Disassembles a compiled unpack template.
#[must_use]
pub fn disassemble_unpack(compiled: &CompiledUnpack) -> Disassembly<'_, UnpackOp> {
    Disassembly {
        mode: Mode::Unpack,
        format: compiled.format(),
        encoding: None,
        root: compiled.root(),
    }
}

/// A disassembled tree.
#[derive(Clone, Debug)]
pub struct Disassembly<'a, Op> {
    mode: Mode,
    format: &'a [u8],
    encoding: Option<&'static str>,
    root: &'a Node<Op>,
}

impl<'a, Op> Disassembly<'a, Op> {
    /// The root node.
    #[must_use]
    pub fn root(&self) -> &'a Node<Op> {
        self.root
    }

    /// Number of nodes in the tree, counting each unrolled copy once.
    #[must_use]
    pub fn node_count(&self) -> usize {
        count_nodes(self.root)
    }
}

fn count_nodes<Op>(node: &Node<Op>) -> usize {
    match node {
        Node::Op(_) => 1,
        Node::Sequence(children) => 1 + children.iter().map(count_nodes).sum::<usize>(),
        Node::RepeatExploded(children) => 1 + children.first().map_or(0, count_nodes),
        Node::RepeatLoop { body, .. } | Node::Star(body) => 1 + count_nodes(body),
    }
}

impl<Op: fmt::Display> fmt::Display for Disassembly<'_, Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; {} \"{}\"", self.mode, self.format.escape_ascii())?;
        if let Some(encoding) = self.encoding {
            writeln!(f, "; encoding {encoding}")?;
        }
        write_node(f, self.root, 0)
    }
}

fn write_node<Op: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    node: &Node<Op>,
    depth: usize,
) -> fmt::Result {
    let indent = depth * 2;
    match node {
        Node::Op(op) => writeln!(f, "{:indent$}{op}", ""),
        Node::Sequence(children) => {
            writeln!(f, "{:indent$}sequence", "")?;
            for child in children {
                write_node(f, child, depth + 1)?;
            }
            Ok(())
        }
        Node::RepeatExploded(children) => {
            writeln!(f, "{:indent$}unrolled {}", "", children.len())?;
            match children.first() {
                Some(child) => write_node(f, child, depth + 1),
                None => Ok(()),
            }
        }
        Node::RepeatLoop { count, body } => {
            writeln!(f, "{:indent$}repeat {count}", "")?;
            write_node(f, body, depth + 1)
        }
        Node::Star(body) => {
            writeln!(f, "{:indent$}star", "")?;
            write_node(f, body, depth + 1)
        }
    }
}

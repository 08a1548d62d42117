// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pieces shared by the pack and unpack tree builders.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::directive::Count;
use crate::error::FormatError;
use crate::node::Node;

/// Compile-time configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BuildConfig {
    /// Explicit counts up to this value are unrolled; larger counts become loops.
    ///
    /// Both shapes produce identical results.
    pub unroll_threshold: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            unroll_threshold: 4,
        }
    }
}

/// Wraps `node` according to its repeat count.
pub(crate) fn apply_count<Op: Clone>(count: Count, node: Node<Op>, config: &BuildConfig) -> Node<Op> {
    match count {
        Count::None => node,
        Count::Star => Node::Star(Box::new(node)),
        Count::Explicit(n) if n <= config.unroll_threshold => {
            Node::RepeatExploded(vec![node; n].into_boxed_slice())
        }
        Count::Explicit(n) => Node::RepeatLoop {
            count: n,
            body: Box::new(node),
        },
    }
}

/// Stack of in-progress sequences; the bottom entry is the template's top level.
#[derive(Debug)]
pub(crate) struct SequenceStack<Op> {
    stack: Vec<Vec<Node<Op>>>,
}

impl<Op: Clone> SequenceStack<Op> {
    pub(crate) fn new() -> Self {
        Self {
            stack: vec![Vec::new()],
        }
    }

    pub(crate) fn push(&mut self, node: Node<Op>) {
        if let Some(top) = self.stack.last_mut() {
            top.push(node);
        }
    }

    pub(crate) fn start_group(&mut self) {
        self.stack.push(Vec::new());
    }

    pub(crate) fn finish_group(&mut self, count: Count, config: &BuildConfig) -> Result<(), FormatError> {
        if self.stack.len() < 2 {
            return Err(unbalanced());
        }
        let children = self.stack.pop().unwrap_or_default();
        let group = Node::Sequence(children.into_boxed_slice());
        self.push(apply_count(count, group, config));
        Ok(())
    }

    /// Returns the root sequence.
    pub(crate) fn finish(mut self) -> Result<Node<Op>, FormatError> {
        if self.stack.len() != 1 {
            return Err(unbalanced());
        }
        let children = self.stack.pop().unwrap_or_default();
        Ok(Node::Sequence(children.into_boxed_slice()))
    }
}

fn unbalanced() -> FormatError {
    FormatError::InvalidFormat(String::from("unbalanced group in template"))
}

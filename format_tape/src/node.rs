// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Operation trees and the control combinators that drive them.
//!
//! Trees are shared by both directions: only the leaf operation type differs
//! ([`PackOp`](crate::pack::PackOp) or [`UnpackOp`](crate::unpack::UnpackOp)).

use alloc::boxed::Box;

use crate::error::FormatError;
use crate::trace::LoopKind;

/// A node of a compiled template.
///
/// Trees are immutable once built; runs only mutate their own evaluation state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node<Op> {
    /// A leaf operation.
    Op(Op),
    /// Children in order.
    Sequence(Box<[Node<Op>]>),
    /// Statically unrolled copies of one child.
    RepeatExploded(Box<[Node<Op>]>),
    /// A counted loop.
    RepeatLoop {
        /// Iteration count.
        count: usize,
        /// Loop body.
        body: Box<Node<Op>>,
    },
    /// Runs the body until the source is exhausted.
    Star(Box<Node<Op>>),
}

/// Evaluation state a tree runs against.
pub(crate) trait Machine<Op> {
    /// Executes one leaf.
    fn op(&mut self, op: &Op) -> Result<(), FormatError>;

    /// Current source cursor, used to detect `*` iterations that make no progress.
    fn source_position(&self) -> usize;

    /// Whether the source has nothing left.
    fn source_exhausted(&self) -> bool;

    /// Called once per loop iteration; polls the host periodically.
    fn tick(&mut self) -> Result<(), FormatError>;

    fn loop_enter(&mut self, _kind: LoopKind) {}

    fn loop_exit(&mut self, _kind: LoopKind, _iterations: usize) {}
}

/// Runs `node` against `machine`. The first error aborts the whole tree.
pub(crate) fn execute<Op, M: Machine<Op>>(node: &Node<Op>, machine: &mut M) -> Result<(), FormatError> {
    match node {
        Node::Op(op) => machine.op(op),
        Node::Sequence(children) | Node::RepeatExploded(children) => {
            for child in children {
                execute(child, machine)?;
            }
            Ok(())
        }
        Node::RepeatLoop { count, body } => {
            let kind = LoopKind::Repeat { count: *count };
            machine.loop_enter(kind);
            for _ in 0..*count {
                machine.tick()?;
                execute(body, machine)?;
            }
            machine.loop_exit(kind, *count);
            Ok(())
        }
        Node::Star(body) => {
            machine.loop_enter(LoopKind::Star);
            let mut iterations = 0;
            while !machine.source_exhausted() {
                machine.tick()?;
                let before = machine.source_position();
                execute(body, machine)?;
                iterations += 1;
                if machine.source_position() == before {
                    break;
                }
            }
            machine.loop_exit(LoopKind::Star, iterations);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    /// Consumes one unit of source per `Take`; `Stay` consumes nothing.
    #[derive(Clone, Debug, PartialEq, Eq)]
    enum TestOp {
        Take,
        Stay,
    }

    struct TestMachine {
        source: usize,
        position: usize,
        trace: Vec<TestOp>,
        ticks: usize,
    }

    impl TestMachine {
        fn new(source: usize) -> Self {
            Self {
                source,
                position: 0,
                trace: Vec::new(),
                ticks: 0,
            }
        }
    }

    impl Machine<TestOp> for TestMachine {
        fn op(&mut self, op: &TestOp) -> Result<(), FormatError> {
            if *op == TestOp::Take {
                if self.position == self.source {
                    return Err(FormatError::TooFewArguments);
                }
                self.position += 1;
            }
            self.trace.push(op.clone());
            Ok(())
        }

        fn source_position(&self) -> usize {
            self.position
        }

        fn source_exhausted(&self) -> bool {
            self.position >= self.source
        }

        fn tick(&mut self) -> Result<(), FormatError> {
            self.ticks += 1;
            Ok(())
        }
    }

    #[test]
    fn exploded_and_loop_repeat_agree() {
        let exploded = Node::RepeatExploded(vec![Node::Op(TestOp::Take); 3].into());
        let looped = Node::RepeatLoop {
            count: 3,
            body: Box::new(Node::Op(TestOp::Take)),
        };
        let mut a = TestMachine::new(5);
        let mut b = TestMachine::new(5);
        execute(&exploded, &mut a).unwrap();
        execute(&looped, &mut b).unwrap();
        assert_eq!(a.trace, b.trace);
        assert_eq!(a.position, b.position);
        assert_eq!(b.ticks, 3);
    }

    #[test]
    fn star_consumes_exactly_the_source() {
        let star = Node::Star(Box::new(Node::Op(TestOp::Take)));
        let mut m = TestMachine::new(4);
        execute(&star, &mut m).unwrap();
        assert_eq!(m.position, 4);

        let mut empty = TestMachine::new(0);
        execute(&star, &mut empty).unwrap();
        assert!(empty.trace.is_empty());
    }

    #[test]
    fn star_stops_without_progress() {
        let star = Node::Star(Box::new(Node::Op(TestOp::Stay)));
        let mut m = TestMachine::new(4);
        execute(&star, &mut m).unwrap();
        assert_eq!(m.trace, [TestOp::Stay]);
    }

    #[test]
    fn sequence_aborts_on_first_error() {
        let seq = Node::Sequence(vec![Node::Op(TestOp::Take), Node::Op(TestOp::Stay)].into());
        let mut m = TestMachine::new(0);
        assert_eq!(execute(&seq, &mut m), Err(FormatError::TooFewArguments));
        assert!(m.trace.is_empty());
    }
}

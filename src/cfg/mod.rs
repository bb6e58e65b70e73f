//! Per-function control flow graphs.
//!
//! A graph is built for one function-like body (or the top level of a file)
//! and ends in a single shared end block, which never holds elements or
//! successors.

mod builder;
pub mod liveness;

use std::fmt::Write as _;

use serde::Serialize;
use thiserror::Error;

use crate::ast::{AstNode, ClassMember, Expr, Stmt};
use crate::span::Span;

pub use liveness::{BlockLiveness, LiveVariables};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CfgError {
    #[error("a control flow graph needs a function, method, closure or file, got {kind} at {span:?}")]
    NotAFunctionBody { kind: &'static str, span: Span },
    #[error("method at {span:?} has no body")]
    MissingBody { span: Span },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlockId(u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BlockKind<'ast> {
    Simple {
        successor: BlockId,
    },
    /// Ends with the evaluation of `condition`, which is also the block's
    /// last element (or the foreach statement driving a loop).
    Branching {
        condition: AstNode<'ast>,
        true_successor: BlockId,
        false_successor: BlockId,
    },
    End,
}

#[derive(Debug, Clone)]
pub struct CfgBlock<'ast> {
    id: BlockId,
    kind: BlockKind<'ast>,
    elements: Vec<AstNode<'ast>>,
    predecessors: Vec<BlockId>,
    syntactic_successor: Option<BlockId>,
    exception_successors: Vec<BlockId>,
    exit_successors: Vec<BlockId>,
}

impl<'ast> CfgBlock<'ast> {
    fn new(id: BlockId, kind: BlockKind<'ast>) -> Self {
        Self {
            id,
            kind,
            elements: Vec::new(),
            predecessors: Vec::new(),
            syntactic_successor: None,
            exception_successors: Vec::new(),
            exit_successors: Vec::new(),
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn kind(&self) -> BlockKind<'ast> {
        self.kind
    }

    pub fn elements(&self) -> &[AstNode<'ast>] {
        &self.elements
    }

    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    /// The block following this one in source order when control never
    /// reaches it from here, as after a `return`.
    pub fn syntactic_successor(&self) -> Option<BlockId> {
        self.syntactic_successor
    }

    /// Catch or finally entries of the enclosing `try`.
    pub fn exception_successors(&self) -> &[BlockId] {
        &self.exception_successors
    }

    /// Targets of jumps that leave a `try` through this `finally` tail.
    pub fn exit_successors(&self) -> &[BlockId] {
        &self.exit_successors
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, BlockKind::End)
    }

    pub fn is_branching(&self) -> bool {
        matches!(self.kind, BlockKind::Branching { .. })
    }

    /// Successors of normal control flow.
    pub fn normal_successors(&self) -> Vec<BlockId> {
        match self.kind {
            BlockKind::Simple { successor } => vec![successor],
            BlockKind::Branching { true_successor, false_successor, .. } => {
                if true_successor == false_successor {
                    vec![true_successor]
                } else {
                    vec![true_successor, false_successor]
                }
            }
            BlockKind::End => Vec::new(),
        }
    }

    /// Every successor: normal flow, exception edges and finally exits.
    pub fn successors(&self) -> Vec<BlockId> {
        let mut successors = self.normal_successors();
        for &block in self.exception_successors.iter().chain(&self.exit_successors) {
            if !successors.contains(&block) {
                successors.push(block);
            }
        }
        successors
    }

    /// # Panics
    ///
    /// Panics on the end block.
    pub fn add_element(&mut self, node: AstNode<'ast>) {
        assert!(!self.is_end(), "the end block cannot hold elements");
        self.elements.push(node);
    }

    /// Redirects every normal edge to `from` towards `to`.
    ///
    /// # Panics
    ///
    /// Panics on the end block.
    pub fn replace_successor(&mut self, from: BlockId, to: BlockId) {
        match &mut self.kind {
            BlockKind::Simple { successor } => {
                if *successor == from {
                    *successor = to;
                }
            }
            BlockKind::Branching { true_successor, false_successor, .. } => {
                if *true_successor == from {
                    *true_successor = to;
                }
                if *false_successor == from {
                    *false_successor = to;
                }
            }
            BlockKind::End => panic!("the end block has no successors to replace"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlFlowGraph<'ast> {
    blocks: Vec<CfgBlock<'ast>>,
    start: BlockId,
    end: BlockId,
}

impl<'ast> ControlFlowGraph<'ast> {
    /// Builds the graph of a function, method, closure, arrow function or
    /// compilation unit.
    pub fn build(node: AstNode<'ast>) -> Result<Self, CfgError> {
        let body = match node {
            AstNode::Program(program) => builder::Body::Statements(program.statements),
            AstNode::Stmt(Stmt::Function { body, .. }) => builder::Body::Statements(*body),
            AstNode::Expr(Expr::Closure { body, .. }) => builder::Body::Statements(*body),
            AstNode::Expr(Expr::ArrowFunction { expr, .. }) => builder::Body::Expression(*expr),
            AstNode::ClassMember(ClassMember::Method { body: Some(body), .. }) => builder::Body::Statements(*body),
            AstNode::ClassMember(member @ ClassMember::Method { body: None, .. }) => {
                return Err(CfgError::MissingBody { span: member.span() });
            }
            other => {
                return Err(CfgError::NotAFunctionBody { kind: node_kind(other), span: other.span() });
            }
        };
        Ok(builder::CfgBuilder::new().build(body))
    }

    pub fn blocks(&self) -> &[CfgBlock<'ast>] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> &CfgBlock<'ast> {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut CfgBlock<'ast> {
        &mut self.blocks[id.index()]
    }

    pub fn start(&self) -> BlockId {
        self.start
    }

    pub fn end(&self) -> BlockId {
        self.end
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks reachable from the start through normal, exception, exit and
    /// syntactic successor links, in depth-first order.
    pub fn reachable(&self) -> Vec<BlockId> {
        let mut seen = vec![false; self.blocks.len()];
        let mut order = Vec::new();
        let mut stack = vec![self.start];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            order.push(id);
            let block = self.block(id);
            stack.extend(block.syntactic_successor);
            stack.extend(block.successors().into_iter().rev());
        }
        order
    }

    /// A line-per-block rendering: `B3 [2 elements] -> B1, B2`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for block in self.blocks.iter().rev() {
            let _ = write!(out, "B{}", block.id.0);
            match block.kind {
                BlockKind::End => out.push_str(" (end)"),
                BlockKind::Simple { successor } => {
                    let _ = write!(out, " [{}] -> B{}", block.elements.len(), successor.0);
                }
                BlockKind::Branching { true_successor, false_successor, .. } => {
                    let _ = write!(
                        out,
                        " [{}] ? B{} : B{}",
                        block.elements.len(),
                        true_successor.0,
                        false_successor.0
                    );
                }
            }
            if !block.exception_successors.is_empty() {
                let _ = write!(out, " catch {:?}", block.exception_successors.iter().map(|b| b.0).collect::<Vec<_>>());
            }
            if !block.exit_successors.is_empty() {
                let _ = write!(out, " exit {:?}", block.exit_successors.iter().map(|b| b.0).collect::<Vec<_>>());
            }
            if let Some(next) = block.syntactic_successor {
                let _ = write!(out, " then B{}", next.0);
            }
            if block.id == self.start {
                out.push_str(" (start)");
            }
            out.push('\n');
        }
        out
    }
}

fn node_kind(node: AstNode<'_>) -> &'static str {
    match node {
        AstNode::Program(_) => "program",
        AstNode::Stmt(_) => "statement",
        AstNode::Expr(_) => "expression",
        AstNode::ClassMember(_) => "class member",
        AstNode::Param(_) => "parameter",
        _ => "node",
    }
}

use std::collections::HashMap;

use crate::ast::{AstNode, NodeId, Program};

/// Back-links from every node to its parent.
///
/// The tree itself only points downwards; this side table is filled once
/// after parsing and answers `parent()` queries in constant time.
#[derive(Debug, Default)]
pub struct ParentMap<'a> {
    parents: HashMap<NodeId, AstNode<'a>>,
}

impl<'a> ParentMap<'a> {
    pub fn build(program: &'a Program<'a>) -> Self {
        Self::build_from(AstNode::Program(program))
    }

    pub fn build_from(root: AstNode<'a>) -> Self {
        let mut map = Self::default();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            for child in node.children().into_iter().flatten() {
                map.link(child, node);
                stack.push(child);
            }
        }
        map
    }

    /// # Panics
    ///
    /// Panics if `child` already has a parent.
    fn link(&mut self, child: AstNode<'a>, parent: AstNode<'a>) {
        let previous = self.parents.insert(child.id(), parent);
        assert!(previous.is_none(), "node at {:?} linked to a second parent", child.span());
    }

    pub fn parent(&self, node: AstNode<'a>) -> Option<AstNode<'a>> {
        self.parents.get(&node.id()).copied()
    }

    /// Ancestors from the direct parent up to the root.
    pub fn ancestors(&self, node: AstNode<'a>) -> impl Iterator<Item = AstNode<'a>> + '_ {
        std::iter::successors(self.parent(node), move |n| self.parent(*n))
    }

    /// The closest enclosing function, method, closure or arrow function.
    pub fn enclosing_function(&self, node: AstNode<'a>) -> Option<AstNode<'a>> {
        self.ancestors(node).find(AstNode::is_function_like)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

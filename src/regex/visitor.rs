//! Traversal over regex trees, in the same shape as the syntax tree visitor:
//! each hook defaults to descending, overrides call [`walk_regex`] to keep
//! going.

use super::ast::{GroupKind, Quantifier, RegexNode, RegexNodeKind, RegexTree};

pub trait RegexVisitor {
    fn visit_tree(&mut self, tree: &RegexTree) {
        self.visit_node(&tree.root);
    }

    /// Dispatches to the kind-specific hooks.
    fn visit_node(&mut self, node: &RegexNode) {
        match &node.kind {
            RegexNodeKind::Group { kind, body } => self.visit_group(node, kind, body),
            RegexNodeKind::Quantified { body, quantifier } => self.visit_quantified(node, body, *quantifier),
            RegexNodeKind::CharacterClass { .. } => self.visit_character_class(node),
            RegexNodeKind::Disjunction(_) => self.visit_disjunction(node),
            RegexNodeKind::Conditional { .. } => self.visit_conditional(node),
            RegexNodeKind::BackReference(_) | RegexNodeKind::SubroutineCall(_) => self.visit_reference(node),
            RegexNodeKind::PosixClass { .. } => self.visit_posix_class(node),
            _ if node.children().is_empty() => self.visit_leaf(node),
            _ => walk_regex(self, node),
        }
    }

    fn visit_group(&mut self, node: &RegexNode, _kind: &GroupKind, _body: &RegexNode) {
        walk_regex(self, node);
    }

    fn visit_quantified(&mut self, node: &RegexNode, _body: &RegexNode, _quantifier: Quantifier) {
        walk_regex(self, node);
    }

    fn visit_character_class(&mut self, node: &RegexNode) {
        walk_regex(self, node);
    }

    fn visit_disjunction(&mut self, node: &RegexNode) {
        walk_regex(self, node);
    }

    fn visit_conditional(&mut self, node: &RegexNode) {
        walk_regex(self, node);
    }

    fn visit_reference(&mut self, _node: &RegexNode) {}

    fn visit_posix_class(&mut self, _node: &RegexNode) {}

    /// Literals, anchors, escapes and every other childless node.
    fn visit_leaf(&mut self, _node: &RegexNode) {}
}

pub fn walk_regex<V: RegexVisitor + ?Sized>(visitor: &mut V, node: &RegexNode) {
    for child in node.children() {
        visitor.visit_node(child);
    }
}

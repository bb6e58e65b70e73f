use crate::ast::AstNode;

/// Finds the chain of nodes enclosing a byte offset.
pub struct Locator;

impl Locator {
    /// Path from `root` down to the innermost node whose span contains
    /// `offset`. Empty when the offset lies outside the root.
    pub fn find(root: AstNode<'_>, offset: usize) -> Vec<AstNode<'_>> {
        let mut path = Vec::new();
        let mut current = root;
        if !Self::covers(current, offset) {
            return path;
        }
        loop {
            path.push(current);
            let next = current
                .children()
                .into_iter()
                .flatten()
                .find(|child| Self::covers(*child, offset));
            match next {
                Some(child) => current = child,
                None => return path,
            }
        }
    }

    pub fn innermost(root: AstNode<'_>, offset: usize) -> Option<AstNode<'_>> {
        Self::find(root, offset).pop()
    }

    fn covers(node: AstNode<'_>, offset: usize) -> bool {
        let span = node.span();
        span.start <= offset && offset < span.end.max(span.start + 1)
    }
}

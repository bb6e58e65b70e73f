use std::collections::HashMap;

use tracing::trace;

use super::{BlockId, BlockKind, CfgBlock, ControlFlowGraph};
use crate::ast::*;
use crate::lexer::literal::integer_value;

pub(super) enum Body<'ast> {
    Statements(&'ast [StmtId<'ast>]),
    Expression(ExprId<'ast>),
}

#[derive(Debug, Clone, Copy)]
struct JumpTarget {
    break_target: BlockId,
    continue_target: BlockId,
}

/// A `finally` body that jumps out of its `try` have to pass through.
#[derive(Debug, Clone, Copy)]
struct FinallyContext {
    entry: BlockId,
    tail: BlockId,
    /// Number of enclosing loops and switches when the `try` was entered.
    loop_depth: usize,
}

/// Builds the graph back to front: statements are visited in reverse and
/// `current` is the block the previous statement falls into.
pub(super) struct CfgBuilder<'ast> {
    blocks: Vec<CfgBlock<'ast>>,
    end: BlockId,
    current: BlockId,
    jump_targets: Vec<JumpTarget>,
    throw_targets: Vec<BlockId>,
    finally_stack: Vec<FinallyContext>,
    labels: HashMap<&'ast str, BlockId>,
    gotos: Vec<(BlockId, &'ast str)>,
}

impl<'ast> CfgBuilder<'ast> {
    pub(super) fn new() -> Self {
        let end = BlockId(0);
        Self {
            blocks: vec![CfgBlock::new(end, BlockKind::End)],
            end,
            current: end,
            jump_targets: Vec::new(),
            throw_targets: Vec::new(),
            finally_stack: Vec::new(),
            labels: HashMap::new(),
            gotos: Vec::new(),
        }
    }

    pub(super) fn build(mut self, body: Body<'ast>) -> ControlFlowGraph<'ast> {
        self.current = self.simple(self.end);
        match body {
            Body::Statements(statements) => self.statements(statements),
            Body::Expression(expr) => self.prepend(AstNode::Expr(expr)),
        }
        let start = self.current;
        self.patch_gotos();

        // Elements were collected back to front.
        for block in &mut self.blocks {
            block.elements.reverse();
        }
        self.link_predecessors();

        trace!(blocks = self.blocks.len(), "control flow graph built");
        ControlFlowGraph { blocks: self.blocks, start, end: self.end }
    }

    fn create(&mut self, kind: BlockKind<'ast>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(CfgBlock::new(id, kind));
        id
    }

    fn simple(&mut self, successor: BlockId) -> BlockId {
        self.create(BlockKind::Simple { successor })
    }

    fn branching(&mut self, condition: AstNode<'ast>, true_successor: BlockId, false_successor: BlockId) -> BlockId {
        let id = self.create(BlockKind::Branching { condition, true_successor, false_successor });
        self.blocks[id.index()].add_element(condition);
        id
    }

    fn set_true_successor(&mut self, block: BlockId, target: BlockId) {
        if let BlockKind::Branching { true_successor, .. } = &mut self.blocks[block.index()].kind {
            *true_successor = target;
        }
    }

    fn prepend(&mut self, node: AstNode<'ast>) {
        let current = self.current;
        self.blocks[current.index()].add_element(node);
    }

    fn add_to(&mut self, block: BlockId, node: AstNode<'ast>) {
        self.blocks[block.index()].add_element(node);
    }

    /// Ends the current block with `node`, transferring control to
    /// `target`. What followed becomes unreachable code.
    fn jump(&mut self, node: AstNode<'ast>, target: BlockId) -> BlockId {
        let dead = self.current;
        let block = self.simple(target);
        self.blocks[block.index()].syntactic_successor = Some(dead);
        self.current = block;
        self.prepend(node);
        block
    }

    fn statements(&mut self, statements: &'ast [StmtId<'ast>]) {
        for stmt in statements.iter().rev() {
            self.statement(stmt);
        }
    }

    /// Builds a nested statement list that falls into `successor` and
    /// returns its entry block.
    fn sub_body(&mut self, statements: &'ast [StmtId<'ast>], successor: BlockId) -> BlockId {
        self.current = self.simple(successor);
        self.statements(statements);
        self.current
    }

    fn throw_target(&self) -> BlockId {
        self.throw_targets.last().copied().unwrap_or(self.end)
    }

    /// Routes a jump to `target` through the `finally` bodies it leaves and
    /// returns the block the jump enters first. `loop_index` is the jump
    /// target's position on the loop stack, `None` when leaving the function.
    fn through_finally(&mut self, target: BlockId, loop_index: Option<usize>) -> BlockId {
        let mut destination = target;
        for i in 0..self.finally_stack.len() {
            let context = self.finally_stack[i];
            if let Some(index) = loop_index
                && context.loop_depth <= index
            {
                continue;
            }
            let tail = &mut self.blocks[context.tail.index()];
            if !tail.exit_successors.contains(&destination) {
                tail.exit_successors.push(destination);
            }
            destination = context.entry;
        }
        destination
    }

    fn statement(&mut self, stmt: StmtId<'ast>) {
        let node = AstNode::Stmt(stmt);
        match *stmt {
            Stmt::If { condition, then_block, else_block, .. } => {
                let successor = self.current;
                let else_entry = match else_block {
                    Some(statements) => self.sub_body(statements, successor),
                    None => successor,
                };
                let then_entry = self.sub_body(then_block, successor);
                self.current = self.branching(AstNode::Expr(condition), then_entry, else_entry);
            }
            Stmt::While { condition, body, .. } => {
                let successor = self.current;
                let condition_block = self.branching(AstNode::Expr(condition), successor, successor);
                self.jump_targets.push(JumpTarget { break_target: successor, continue_target: condition_block });
                let body_entry = self.sub_body(body, condition_block);
                self.jump_targets.pop();
                self.set_true_successor(condition_block, body_entry);
                self.current = self.simple(condition_block);
            }
            Stmt::DoWhile { body, condition, .. } => {
                let successor = self.current;
                let condition_block = self.branching(AstNode::Expr(condition), successor, successor);
                self.jump_targets.push(JumpTarget { break_target: successor, continue_target: condition_block });
                let body_entry = self.sub_body(body, condition_block);
                self.jump_targets.pop();
                self.set_true_successor(condition_block, body_entry);
                self.current = self.simple(body_entry);
            }
            Stmt::For { init, condition, loop_expr, body, .. } => self.for_loop(init, condition, loop_expr, body),
            Stmt::Foreach { expr, body, .. } => {
                let successor = self.current;
                let loop_block = self.branching(node, successor, successor);
                self.jump_targets.push(JumpTarget { break_target: successor, continue_target: loop_block });
                let body_entry = self.sub_body(body, loop_block);
                self.jump_targets.pop();
                self.set_true_successor(loop_block, body_entry);
                self.current = self.simple(loop_block);
                self.prepend(AstNode::Expr(expr));
            }
            Stmt::Switch { condition, cases, .. } => self.switch(condition, cases),
            Stmt::Try { body, catches, finally, .. } => self.try_statement(body, catches, finally),
            Stmt::Block { statements, .. } => self.statements(statements),
            Stmt::Declare { body, .. } => self.statements(body),
            Stmt::Return { .. } => {
                let target = self.through_finally(self.end, None);
                self.jump(node, target);
            }
            Stmt::Throw { .. } => {
                let target = self.throw_target();
                self.jump(node, target);
            }
            Stmt::Expression { expr: Expr::Ternary { condition, if_true, if_false, .. }, .. } => {
                let successor = self.current;
                let else_entry = self.simple(successor);
                self.add_to(else_entry, AstNode::Expr(if_false));
                // `$a ?: b()` falls straight through when `$a` holds.
                let then_entry = match if_true {
                    Some(expr) => {
                        let block = self.simple(successor);
                        self.add_to(block, AstNode::Expr(expr));
                        block
                    }
                    None => successor,
                };
                self.current = self.branching(AstNode::Expr(condition), then_entry, else_entry);
            }
            Stmt::Expression { expr: Expr::Throw { .. }, .. } => {
                let target = self.throw_target();
                self.jump(node, target);
            }
            // `exit` does not run pending finally blocks.
            Stmt::Expression { expr: Expr::Exit { .. }, .. } | Stmt::HaltCompiler { .. } => {
                self.jump(node, self.end);
            }
            Stmt::Break { level, .. } => self.break_continue(node, level, true),
            Stmt::Continue { level, .. } => self.break_continue(node, level, false),
            Stmt::Goto { label, .. } => {
                let block = self.jump(node, self.end);
                self.gotos.push((block, label.value));
            }
            Stmt::Label { name, .. } => {
                self.prepend(node);
                self.labels.entry(name.value).or_insert(self.current);
                self.current = self.simple(self.current);
            }
            Stmt::Nop { .. } => {}
            _ => self.prepend(node),
        }
    }

    fn for_loop(
        &mut self,
        init: &'ast [ExprId<'ast>],
        condition: &'ast [ExprId<'ast>],
        update: &'ast [ExprId<'ast>],
        body: &'ast [StmtId<'ast>],
    ) {
        let successor = self.current;
        let condition_block = match condition.split_last() {
            Some((&last, rest)) => {
                let block = self.branching(AstNode::Expr(last), successor, successor);
                for &expr in rest.iter().rev() {
                    self.add_to(block, AstNode::Expr(expr));
                }
                block
            }
            // `for (;;)` only ends through a jump.
            None => self.simple(successor),
        };
        let update_block = self.simple(condition_block);
        for &expr in update.iter().rev() {
            self.add_to(update_block, AstNode::Expr(expr));
        }

        self.jump_targets.push(JumpTarget { break_target: successor, continue_target: update_block });
        let body_entry = self.sub_body(body, update_block);
        self.jump_targets.pop();

        if condition.is_empty() {
            self.blocks[condition_block.index()].kind = BlockKind::Simple { successor: body_entry };
        } else {
            self.set_true_successor(condition_block, body_entry);
        }
        self.current = self.simple(condition_block);
        for &expr in init.iter().rev() {
            self.prepend(AstNode::Expr(expr));
        }
    }

    fn switch(&mut self, condition: ExprId<'ast>, cases: &'ast [Case<'ast>]) {
        let successor = self.current;

        // `continue` inside a switch behaves like `break`.
        self.jump_targets.push(JumpTarget { break_target: successor, continue_target: successor });
        let mut bodies = vec![successor; cases.len()];
        let mut fallthrough = successor;
        for (i, case) in cases.iter().enumerate().rev() {
            fallthrough = self.sub_body(case.body, fallthrough);
            bodies[i] = fallthrough;
        }
        self.jump_targets.pop();

        let mut next_test = cases
            .iter()
            .position(|case| case.condition.is_none())
            .map_or(successor, |i| bodies[i]);
        for (i, case) in cases.iter().enumerate().rev() {
            if let Some(test) = case.condition {
                next_test = self.branching(AstNode::Expr(test), bodies[i], next_test);
            }
        }

        self.current = self.simple(next_test);
        self.prepend(AstNode::Expr(condition));
    }

    fn try_statement(
        &mut self,
        body: &'ast [StmtId<'ast>],
        catches: &'ast [Catch<'ast>],
        finally: Option<&'ast [StmtId<'ast>]>,
    ) {
        let successor = self.current;
        let outer_throw = self.throw_target();

        let finally_context = finally.map(|statements| {
            let tail = self.simple(successor);
            self.current = tail;
            self.statements(statements);
            // An exception still propagates once the finally body has run.
            self.blocks[tail.index()].exit_successors.push(outer_throw);
            FinallyContext { entry: self.current, tail, loop_depth: self.jump_targets.len() }
        });
        let after = finally_context.map_or(successor, |context| context.entry);
        if let Some(context) = finally_context {
            self.finally_stack.push(context);
        }

        self.throw_targets.push(if finally_context.is_some() { after } else { outer_throw });
        let mut handlers = Vec::with_capacity(catches.len());
        for catch in catches.iter().rev() {
            let body_entry = self.sub_body(catch.body, after);
            let entry = self.simple(body_entry);
            self.add_to(entry, AstNode::Catch(catch));
            handlers.push(entry);
        }
        self.throw_targets.pop();
        handlers.reverse();
        if handlers.is_empty() {
            handlers.push(after);
        }

        // Any statement of the body may throw into every handler.
        self.throw_targets.push(handlers[0]);
        let first = self.blocks.len();
        let body_entry = self.sub_body(body, after);
        self.throw_targets.pop();
        for block in &mut self.blocks[first..] {
            for &handler in &handlers {
                if !block.exception_successors.contains(&handler) {
                    block.exception_successors.push(handler);
                }
            }
        }

        if finally_context.is_some() {
            self.finally_stack.pop();
        }
        self.current = self.simple(body_entry);
    }

    fn break_continue(&mut self, node: AstNode<'ast>, level: Option<ExprId<'ast>>, is_break: bool) {
        let levels = match level {
            Some(Expr::Integer { value, .. }) => integer_value(value).unwrap_or(0),
            Some(_) => 0,
            None => 1,
        };
        let depth = self.jump_targets.len() as i64;
        let target = if (1..=depth).contains(&levels) {
            let index = (depth - levels) as usize;
            let targets = self.jump_targets[index];
            let block = if is_break { targets.break_target } else { targets.continue_target };
            self.through_finally(block, Some(index))
        } else {
            self.end
        };
        self.jump(node, target);
    }

    fn patch_gotos(&mut self) {
        for (block, label) in std::mem::take(&mut self.gotos) {
            let target = self.labels.get(label).copied().unwrap_or(self.end);
            self.blocks[block.index()].kind = BlockKind::Simple { successor: target };
        }
    }

    fn link_predecessors(&mut self) {
        let edges: Vec<(BlockId, BlockId)> = self
            .blocks
            .iter()
            .flat_map(|block| block.successors().into_iter().map(move |successor| (block.id, successor)))
            .collect();
        for (from, to) in edges {
            let predecessors = &mut self.blocks[to.index()].predecessors;
            if !predecessors.contains(&from) {
                predecessors.push(from);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;

    use crate::ast::{AstNode, Stmt};
    use crate::cfg::ControlFlowGraph;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn describe_function(code: &str) -> String {
        let arena = Bump::new();
        let tokens = tokenize(code);
        let program = arena.alloc(Parser::new(&tokens, &arena).parse_program());
        let function = program
            .statements
            .iter()
            .find(|stmt| matches!(stmt, Stmt::Function { .. }))
            .expect("a function");
        ControlFlowGraph::build(AstNode::Stmt(function)).expect("graph").describe()
    }

    #[test]
    fn while_loop_links_back_to_condition() {
        insta::assert_snapshot!(describe_function("<?php function f() { while ($a) { b(); } c(); }"), @r"
        B4 [0] -> B2 (start)
        B3 [1] -> B2
        B2 [1] ? B3 : B1
        B1 [1] -> B0
        B0 (end)
        ");
    }
}

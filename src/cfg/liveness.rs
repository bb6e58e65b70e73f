//! Live variable analysis.
//!
//! Backward dataflow over a [`ControlFlowGraph`]:
//!
//! ```text
//! live_out[B] = ⋃ live_in[S] for every successor S
//! live_in[B]  = gen[B] ∪ (live_out[B] − kill[B])
//! ```
//!
//! Exception and finally-exit edges count as successors, so a variable read
//! in a catch block stays live across the whole try body.

use std::collections::BTreeSet;

use tracing::trace;

use super::{BlockId, ControlFlowGraph};
use crate::ast::{ArrayItem, AstNode, Expr, ExprId, Stmt};
use crate::symbols::{SymbolId, SymbolTable};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockLiveness {
    /// Variables read before any write in the block.
    pub gen_set: BTreeSet<SymbolId>,
    /// Variables written in the block.
    pub kill: BTreeSet<SymbolId>,
    pub live_in: BTreeSet<SymbolId>,
    pub live_out: BTreeSet<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveVariables {
    blocks: Vec<BlockLiveness>,
}

impl LiveVariables {
    pub fn analyze(cfg: &ControlFlowGraph<'_>, symbols: &SymbolTable<'_>) -> Self {
        let mut blocks: Vec<BlockLiveness> = cfg
            .blocks()
            .iter()
            .map(|block| {
                let mut usage = UsageCollector { symbols, liveness: BlockLiveness::default() };
                for &element in block.elements() {
                    usage.element(element);
                }
                usage.liveness
            })
            .collect();

        let order = post_order(cfg);
        let mut rounds = 0usize;
        let mut changed = true;
        while changed {
            changed = false;
            rounds += 1;
            for &id in &order {
                let live_out: BTreeSet<SymbolId> = cfg
                    .block(id)
                    .successors()
                    .into_iter()
                    .flat_map(|successor| blocks[successor.index()].live_in.iter().copied())
                    .collect();
                let block = &mut blocks[id.index()];
                let live_in: BTreeSet<SymbolId> =
                    block.gen_set.iter().chain(live_out.difference(&block.kill)).copied().collect();
                if live_in != block.live_in || live_out != block.live_out {
                    block.live_in = live_in;
                    block.live_out = live_out;
                    changed = true;
                }
            }
        }
        trace!(blocks = blocks.len(), rounds, "liveness fixpoint reached");
        Self { blocks }
    }

    pub fn block(&self, id: BlockId) -> &BlockLiveness {
        &self.blocks[id.index()]
    }

    pub fn gen_set(&self, id: BlockId) -> &BTreeSet<SymbolId> {
        &self.block(id).gen_set
    }

    pub fn kill(&self, id: BlockId) -> &BTreeSet<SymbolId> {
        &self.block(id).kill
    }

    pub fn live_in(&self, id: BlockId) -> &BTreeSet<SymbolId> {
        &self.block(id).live_in
    }

    pub fn live_out(&self, id: BlockId) -> &BTreeSet<SymbolId> {
        &self.block(id).live_out
    }
}

/// Post-order from the start block, followed by blocks only reachable
/// through syntactic links. Successors come before their predecessors,
/// which is the fast direction for a backward analysis.
fn post_order(cfg: &ControlFlowGraph<'_>) -> Vec<BlockId> {
    let mut visited = vec![false; cfg.len()];
    let mut order = Vec::with_capacity(cfg.len());
    let mut roots = vec![cfg.start()];
    roots.extend(cfg.reachable());
    for root in roots {
        if visited[root.index()] {
            continue;
        }
        visited[root.index()] = true;
        let mut stack = vec![(root, cfg.block(root).successors(), 0usize)];
        while let Some((id, successors, next)) = stack.last_mut() {
            if let Some(&successor) = successors.get(*next) {
                *next += 1;
                if !visited[successor.index()] {
                    visited[successor.index()] = true;
                    stack.push((successor, cfg.block(successor).successors(), 0));
                }
            } else {
                order.push(*id);
                stack.pop();
            }
        }
    }
    order
}

struct UsageCollector<'t, 'ast> {
    symbols: &'t SymbolTable<'ast>,
    liveness: BlockLiveness,
}

impl<'ast> UsageCollector<'_, 'ast> {
    fn read(&mut self, expr: ExprId<'_>) {
        if let Some(id) = self.symbols.symbol_id_for(AstNode::Expr(expr))
            && !self.liveness.kill.contains(&id)
        {
            self.liveness.gen_set.insert(id);
        }
    }

    fn read_symbol(&mut self, id: SymbolId) {
        if !self.liveness.kill.contains(&id) {
            self.liveness.gen_set.insert(id);
        }
    }

    fn write(&mut self, expr: ExprId<'_>) {
        if let Some(id) = self.symbols.symbol_id_for(AstNode::Expr(expr)) {
            self.liveness.kill.insert(id);
        }
    }

    fn element(&mut self, node: AstNode<'_>) {
        match node {
            AstNode::Stmt(stmt) => self.statement(stmt),
            AstNode::Expr(expr) => self.expr(expr),
            AstNode::Catch(catch) => {
                if let Some(var) = catch.var {
                    self.write(var);
                }
            }
            _ => {}
        }
    }

    fn statement(&mut self, stmt: &Stmt<'_>) {
        match stmt {
            // A foreach element stands for the binding of the next item.
            Stmt::Foreach { key_var, value_var, .. } => {
                if let Some(key) = key_var {
                    self.target(key);
                }
                self.target(value_var);
            }
            Stmt::Unset { vars, .. } => {
                for var in *vars {
                    match var {
                        Expr::Variable { .. } => self.write(var),
                        _ => self.expr(var),
                    }
                }
            }
            Stmt::Global { vars, .. } => {
                for var in *vars {
                    self.write(var);
                }
            }
            Stmt::Static { vars, .. } => {
                for var in *vars {
                    if let Some(default) = var.default {
                        self.expr(default);
                    }
                    self.write(var.var);
                }
            }
            Stmt::Echo { exprs, .. } => {
                for expr in *exprs {
                    self.expr(expr);
                }
            }
            Stmt::Return { expr, .. } => {
                if let Some(expr) = expr {
                    self.expr(expr);
                }
            }
            Stmt::Throw { expr, .. } | Stmt::Expression { expr, .. } => self.expr(expr),
            // Conditions of branching statements are separate elements;
            // declarations have their own graphs.
            _ => {}
        }
    }

    /// Writes the variables of an assignment target. Anything that is not
    /// a plain variable or destructuring pattern is evaluated as a read.
    fn target(&mut self, expr: ExprId<'_>) {
        match expr {
            Expr::Variable { .. } => self.write(expr),
            Expr::List { items, .. } | Expr::Array { items, .. } => self.list_targets(items),
            _ => self.expr(expr),
        }
    }

    fn list_targets(&mut self, items: &[ArrayItem<'_>]) {
        for item in items {
            if let Some(key) = item.key {
                self.expr(key);
            }
            self.target(item.value);
        }
    }

    fn expr(&mut self, expr: ExprId<'_>) {
        match expr {
            Expr::Variable { .. } => self.read(expr),
            Expr::Assign { var, expr: value, .. } | Expr::AssignRef { var, expr: value, .. } => {
                self.expr(value);
                self.target(var);
            }
            Expr::AssignOp { var, expr: value, .. } => {
                self.expr(var);
                self.expr(value);
                self.target(var);
            }
            Expr::PreInc { var, .. } | Expr::PreDec { var, .. } | Expr::PostInc { var, .. } | Expr::PostDec { var, .. } => {
                self.expr(var);
                self.target(var);
            }
            Expr::Closure { .. } | Expr::ArrowFunction { .. } => {
                if let Some(scope) = self.symbols.scope_of(AstNode::Expr(expr)) {
                    for &captured in &scope.captures {
                        self.read_symbol(captured);
                    }
                }
            }
            Expr::AnonymousClass { args, .. } => {
                for arg in *args {
                    self.expr(arg.value);
                }
            }
            _ => {
                for child in AstNode::Expr(expr).children().into_iter().flatten() {
                    self.node(child);
                }
            }
        }
    }

    fn node(&mut self, node: AstNode<'_>) {
        match node {
            AstNode::Expr(expr) => self.expr(expr),
            AstNode::Stmt(_) | AstNode::ClassMember(_) => {}
            other => {
                for child in other.children().into_iter().flatten() {
                    self.node(child);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;

    use super::*;
    use crate::ast::Stmt;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn with_function<R>(code: &str, check: impl FnOnce(&ControlFlowGraph<'_>, &SymbolTable<'_>) -> R) -> R {
        let arena = Bump::new();
        let tokens = tokenize(code);
        let program = arena.alloc(Parser::new(&tokens, &arena).parse_program());
        let symbols = SymbolTable::build(program);
        let function = program
            .statements
            .iter()
            .find(|stmt| matches!(stmt, Stmt::Function { .. }))
            .expect("a function");
        let cfg = ControlFlowGraph::build(AstNode::Stmt(function)).expect("graph");
        check(&cfg, &symbols)
    }

    fn names(symbols: &SymbolTable<'_>, set: &BTreeSet<SymbolId>) -> Vec<String> {
        set.iter().map(|&id| symbols.symbol(id).name.clone()).collect()
    }

    #[test]
    fn read_before_write_is_generated() {
        with_function("<?php function f($a) { $b = $a + 1; $a = $b; return $a; }", |cfg, symbols| {
            let live = LiveVariables::analyze(cfg, symbols);
            let first = cfg.start();
            assert_eq!(names(symbols, live.gen_set(first)), ["a"]);
            assert_eq!(names(symbols, live.kill(first)), ["a", "b"]);
        });
    }

    #[test]
    fn loop_keeps_variable_live() {
        with_function("<?php function f($n) { $i = 0; while ($i < $n) { $i++; } }", |cfg, symbols| {
            let live = LiveVariables::analyze(cfg, symbols);
            let condition = cfg.blocks().iter().find(|b| b.is_branching()).expect("loop condition");
            assert_eq!(names(symbols, live.live_in(condition.id())), ["n", "i"]);
        });
    }

    #[test]
    fn analysis_is_repeatable() {
        with_function(
            "<?php function f($x) { try { $y = g($x); } catch (E $e) { $y = $e; } finally { h(); } return $y; }",
            |cfg, symbols| {
                assert_eq!(LiveVariables::analyze(cfg, symbols), LiveVariables::analyze(cfg, symbols));
            },
        );
    }
}

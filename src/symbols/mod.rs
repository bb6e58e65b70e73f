//! Scopes and symbols of one compilation unit.
//!
//! Variables follow PHP's function-level scoping: every function, method,
//! closure and arrow function body is a flat scope of its own, and the only
//! way a name crosses a scope boundary is an explicit alias (`global`, a
//! closure `use`, or the implicit by-value capture of an arrow function).

mod builder;

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::ast::{AstNode, Expr, ExprId, NodeId, Program};
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(u32);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
    Class,
    Method,
    Property,
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Global,
    Function,
    Method,
    Closure,
    ArrowFunction,
    Class,
}

#[derive(Debug)]
pub struct Scope<'ast> {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// The program, function-like node or class-like node owning the scope.
    pub node: AstNode<'ast>,
    /// The class symbol of a class scope, `None` for anonymous classes.
    pub class: Option<SymbolId>,
    /// Symbols of the enclosing scope that a closure or arrow function
    /// captures, in order of first capture.
    pub captures: Vec<SymbolId>,
    variables: IndexMap<String, SymbolId>,
    members: IndexMap<(SymbolKind, String), SymbolId>,
}

impl<'ast> Scope<'ast> {
    pub fn variables(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.variables.values().copied()
    }

    pub fn variable(&self, name: &str) -> Option<SymbolId> {
        self.variables.get(name).copied()
    }

    /// A method (case-insensitive), property or constant of a class scope.
    pub fn member(&self, kind: SymbolKind, name: &str) -> Option<SymbolId> {
        match kind {
            SymbolKind::Method => self.members.get(&(kind, name.to_ascii_lowercase())).copied(),
            _ => self.members.get(&(kind, name.to_string())).copied(),
        }
    }

    pub fn is_function_like(&self) -> bool {
        matches!(
            self.kind,
            ScopeKind::Function | ScopeKind::Method | ScopeKind::Closure | ScopeKind::ArrowFunction
        )
    }
}

#[derive(Debug)]
pub struct Symbol<'ast> {
    pub id: SymbolId,
    pub name: String,
    /// Namespace-qualified name of functions, classes and global constants.
    pub qualified_name: Option<String>,
    pub kind: SymbolKind,
    pub scope: ScopeId,
    pub declaration: AstNode<'ast>,
    /// Every later reference, in source order.
    pub usages: Vec<AstNode<'ast>>,
    /// The symbol of another scope this one stands for.
    pub alias: Option<SymbolId>,
    /// Conservative set of the values the symbol may hold: assigned
    /// expressions, parameters, foreach and catch bindings.
    pub possible_values: Vec<AstNode<'ast>>,
}

impl<'ast> Symbol<'ast> {
    pub fn declaration_span(&self) -> Span {
        declaration_name_span(self.declaration)
    }

    pub fn usage_spans(&self) -> impl Iterator<Item = Span> + '_ {
        self.usages.iter().map(|usage| usage.span())
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable | SymbolKind::Parameter)
    }
}

/// What a call expression is known to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallResolution {
    /// A function declared in the unit.
    Function(SymbolId),
    /// A method of the lexically enclosing class, reached through `self::`,
    /// `static::` or `$this->`.
    Method(SymbolId),
    /// The callee depends on a value or an external class.
    Unresolvable,
    /// A static name with no declaration in the unit.
    Unknown,
}

#[derive(Debug, Default)]
pub struct SymbolTable<'ast> {
    scopes: Vec<Scope<'ast>>,
    symbols: Vec<Symbol<'ast>>,
    bindings: HashMap<NodeId, SymbolId>,
    node_scopes: HashMap<NodeId, ScopeId>,
    functions: IndexMap<String, SymbolId>,
    classes: IndexMap<String, SymbolId>,
    constants: IndexMap<String, SymbolId>,
    calls: HashMap<NodeId, CallResolution>,
}

impl<'ast> SymbolTable<'ast> {
    pub fn build(program: &'ast Program<'ast>) -> Self {
        builder::SymbolTableBuilder::new(program).build()
    }

    pub fn symbols(&self) -> &[Symbol<'ast>] {
        &self.symbols
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol<'ast> {
        &self.symbols[id.index()]
    }

    pub fn scopes(&self) -> &[Scope<'ast>] {
        &self.scopes
    }

    pub fn scope(&self, id: ScopeId) -> &Scope<'ast> {
        &self.scopes[id.index()]
    }

    pub fn global_scope(&self) -> &Scope<'ast> {
        self.scope(ScopeId::GLOBAL)
    }

    pub fn symbols_in(&self, scope: ScopeId) -> impl Iterator<Item = &Symbol<'ast>> + '_ {
        self.symbols.iter().filter(move |symbol| symbol.scope == scope)
    }

    /// The symbol a variable, parameter, declaration or resolved name node
    /// is bound to. Dynamic variables and `$this` have none.
    pub fn symbol_for(&self, node: AstNode<'_>) -> Option<&Symbol<'ast>> {
        self.bindings.get(&node.id()).map(|&id| self.symbol(id))
    }

    pub fn symbol_id_for(&self, node: AstNode<'_>) -> Option<SymbolId> {
        self.bindings.get(&node.id()).copied()
    }

    /// The scope opened by a program, function-like or class-like node.
    pub fn scope_of(&self, node: AstNode<'_>) -> Option<&Scope<'ast>> {
        self.node_scopes.get(&node.id()).map(|&id| self.scope(id))
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol<'ast>> {
        self.scope(scope).variable(name).map(|id| self.symbol(id))
    }

    /// A declared function by qualified name, without the leading `\`.
    pub fn function(&self, name: &str) -> Option<&Symbol<'ast>> {
        self.functions.get(&name.to_ascii_lowercase()).map(|&id| self.symbol(id))
    }

    /// A declared class, interface, trait or enum by qualified name.
    pub fn class(&self, name: &str) -> Option<&Symbol<'ast>> {
        self.classes.get(&name.to_ascii_lowercase()).map(|&id| self.symbol(id))
    }

    pub fn constant(&self, name: &str) -> Option<&Symbol<'ast>> {
        self.constants.get(name).map(|&id| self.symbol(id))
    }

    /// Follows alias links to the symbol that finally owns the value.
    pub fn resolve_alias(&self, mut id: SymbolId) -> SymbolId {
        while let Some(next) = self.symbol(id).alias {
            id = next;
        }
        id
    }

    pub fn resolve_call(&self, expr: ExprId<'_>) -> CallResolution {
        if let Some(resolution) = self.calls.get(&AstNode::Expr(expr).id()) {
            return *resolution;
        }
        match expr {
            Expr::Call { .. } | Expr::MethodCall { .. } | Expr::StaticCall { .. } | Expr::New { .. } => {
                CallResolution::Unresolvable
            }
            _ => CallResolution::Unknown,
        }
    }

    fn push_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>, node: AstNode<'ast>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            id,
            kind,
            parent,
            node,
            class: None,
            captures: Vec::new(),
            variables: IndexMap::new(),
            members: IndexMap::new(),
        });
        self.node_scopes.insert(node.id(), id);
        id
    }

    fn add_symbol(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: SymbolKind,
        declaration: AstNode<'ast>,
        alias: Option<SymbolId>,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            id,
            name: name.to_string(),
            qualified_name: None,
            kind,
            scope,
            declaration,
            usages: Vec::new(),
            alias,
            possible_values: Vec::new(),
        });
        id
    }

    fn declare_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: SymbolKind,
        declaration: AstNode<'ast>,
        alias: Option<SymbolId>,
    ) -> SymbolId {
        let id = self.add_symbol(scope, name, kind, declaration, alias);
        self.scopes[scope.index()].variables.insert(name.to_string(), id);
        self.bindings.insert(declaration.id(), id);
        id
    }

    /// An implicit capture of a nested arrow function: the variable exists
    /// in `scope` but no node of that scope names it.
    fn declare_capture(&mut self, scope: ScopeId, name: &str, alias: SymbolId) -> SymbolId {
        let declaration = self.scopes[scope.index()].node;
        let id = self.add_symbol(scope, name, SymbolKind::Variable, declaration, Some(alias));
        self.scopes[scope.index()].variables.insert(name.to_string(), id);
        id
    }

    fn declare_member(&mut self, scope: ScopeId, name: &str, kind: SymbolKind, declaration: AstNode<'ast>) -> SymbolId {
        let id = self.add_symbol(scope, name, kind, declaration, None);
        self.bindings.insert(declaration.id(), id);
        let key = match kind {
            SymbolKind::Method => name.to_ascii_lowercase(),
            _ => name.to_string(),
        };
        self.scopes[scope.index()].members.entry((kind, key)).or_insert(id);
        id
    }

    fn add_usage(&mut self, id: SymbolId, node: AstNode<'ast>) {
        self.symbols[id.index()].usages.push(node);
        self.bindings.insert(node.id(), id);
    }
}

/// The span of the name a declaration introduces, for highlighting.
fn declaration_name_span(node: AstNode<'_>) -> Span {
    use crate::ast::{ClassMember, Stmt};
    match node {
        AstNode::Stmt(
            Stmt::Function { name, .. }
            | Stmt::Class { name, .. }
            | Stmt::Interface { name, .. }
            | Stmt::Trait { name, .. }
            | Stmt::Enum { name, .. },
        ) => name.span,
        AstNode::ClassMember(ClassMember::Method { name, .. } | ClassMember::Case { name, .. }) => name.span,
        AstNode::Param(param) => param.name.span,
        AstNode::PropertyEntry(entry) => entry.name.span,
        AstNode::ClassConst(constant) => constant.name.span,
        other => other.span(),
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;

    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn with_table<R>(code: &str, f: impl FnOnce(&SymbolTable<'_>) -> R) -> R {
        let arena = Bump::new();
        let tokens = tokenize(code);
        let program = arena.alloc(Parser::new(&tokens, &arena).parse_program());
        let table = SymbolTable::build(program);
        f(&table)
    }

    #[test]
    fn global_scope_is_first() {
        with_table("<?php $a = 1;", |table| {
            assert_eq!(table.global_scope().kind, ScopeKind::Global);
            assert_eq!(table.lookup(ScopeId::GLOBAL, "a").map(|s| s.kind), Some(SymbolKind::Variable));
        });
    }

    #[test]
    fn functions_resolve_case_insensitively() {
        with_table("<?php namespace App; function Helper() {} helper();", |table| {
            let function = table.function("app\\HELPER").expect("function declared");
            assert_eq!(function.qualified_name.as_deref(), Some("App\\Helper"));
            assert_eq!(function.usages.len(), 1);
        });
    }
}

use std::collections::HashMap;

use tracing::debug;

use super::{CallResolution, ScopeId, ScopeKind, SymbolId, SymbolKind, SymbolTable};
use crate::ast::visitor::{walk_expr, walk_stmt, Visitor};
use crate::ast::*;

const SUPERGLOBALS: &[&str] = &[
    "GLOBALS", "_SERVER", "_GET", "_POST", "_FILES", "_COOKIE", "_SESSION", "_REQUEST", "_ENV",
];

fn is_superglobal(name: &str) -> bool {
    SUPERGLOBALS.contains(&name)
}

/// A function or class name whose declaration may come later in the file.
struct PendingReference<'ast> {
    node: AstNode<'ast>,
    kind: SymbolKind,
    candidates: Vec<String>,
    call: Option<NodeId>,
}

#[derive(Default)]
struct Imports {
    classes: HashMap<String, String>,
    functions: HashMap<String, String>,
    constants: HashMap<String, String>,
}

pub(super) struct SymbolTableBuilder<'ast> {
    program: &'ast Program<'ast>,
    table: SymbolTable<'ast>,
    scopes: Vec<ScopeId>,
    /// Enclosing class scopes, innermost last.
    classes: Vec<ScopeId>,
    namespace: String,
    imports: Imports,
    pending: Vec<PendingReference<'ast>>,
}

impl<'ast> SymbolTableBuilder<'ast> {
    pub(super) fn new(program: &'ast Program<'ast>) -> Self {
        Self {
            program,
            table: SymbolTable::default(),
            scopes: Vec::new(),
            classes: Vec::new(),
            namespace: String::new(),
            imports: Imports::default(),
            pending: Vec::new(),
        }
    }

    pub(super) fn build(mut self) -> SymbolTable<'ast> {
        let program = self.program;
        let global = self.table.push_scope(ScopeKind::Global, None, AstNode::Program(program));
        self.scopes.push(global);
        self.visit_program(program);
        self.resolve_pending();

        debug!(
            scopes = self.table.scopes.len(),
            symbols = self.table.symbols.len(),
            "symbol table built"
        );
        self.table
    }

    fn current(&self) -> ScopeId {
        self.scopes.last().copied().unwrap_or(ScopeId::GLOBAL)
    }

    fn enter(&mut self, kind: ScopeKind, node: AstNode<'ast>) -> ScopeId {
        let id = self.table.push_scope(kind, Some(self.current()), node);
        self.scopes.push(id);
        id
    }

    fn leave(&mut self) {
        self.scopes.pop();
    }

    fn qualify(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}\\{}", self.namespace, name)
        }
    }

    fn resolve_class_name(&self, name: &Name<'_>) -> String {
        let joined = name.joined();
        match name.kind {
            NameKind::FullyQualified => joined,
            NameKind::Relative => self.qualify(&joined),
            NameKind::Unqualified | NameKind::Qualified => {
                let first = name.parts.first().map(|p| p.value).unwrap_or("");
                match self.imports.classes.get(&first.to_ascii_lowercase()) {
                    Some(target) => {
                        let rest = &joined[first.len()..];
                        format!("{target}{rest}")
                    }
                    None => self.qualify(&joined),
                }
            }
        }
    }

    /// Names a function call may refer to, most specific first; unqualified
    /// calls fall back to the global function.
    fn function_candidates(&self, name: &Name<'_>) -> Vec<String> {
        match name.kind {
            NameKind::Unqualified => {
                let local = name.last();
                if let Some(target) = self.imports.functions.get(&local.to_ascii_lowercase()) {
                    return vec![target.clone()];
                }
                let mut candidates = vec![self.qualify(local)];
                if !self.namespace.is_empty() {
                    candidates.push(local.to_string());
                }
                candidates
            }
            _ => vec![self.resolve_class_name(name)],
        }
    }

    fn constant_candidates(&self, name: &Name<'_>) -> Vec<String> {
        match name.kind {
            NameKind::Unqualified => {
                let local = name.last();
                if let Some(target) = self.imports.constants.get(local) {
                    return vec![target.clone()];
                }
                let mut candidates = vec![self.qualify(local)];
                if !self.namespace.is_empty() {
                    candidates.push(local.to_string());
                }
                candidates
            }
            _ => vec![self.resolve_class_name(name)],
        }
    }

    fn reference(&mut self, node: AstNode<'ast>, kind: SymbolKind, candidates: Vec<String>, call: Option<NodeId>) {
        self.pending.push(PendingReference { node, kind, candidates, call });
    }

    fn class_reference(&mut self, node: AstNode<'ast>, name: &Name<'ast>) {
        if name.is_special_class() {
            return;
        }
        let candidate = self.resolve_class_name(name);
        self.reference(node, SymbolKind::Class, vec![candidate], None);
    }

    /// The class operand of `new`, `::` and `instanceof`.
    fn class_expr(&mut self, class: ExprId<'ast>) {
        match class {
            Expr::Name { name, .. } => self.class_reference(AstNode::Expr(class), name),
            _ => self.visit_expr(class),
        }
    }

    fn type_references(&mut self, ty: &'ast Type<'ast>) {
        match ty {
            Type::Simple(_) => {}
            Type::Named(name) => self.class_reference(AstNode::Name(name), name),
            Type::Nullable { ty, .. } => self.type_references(ty),
            Type::Union { types, .. } | Type::Intersection { types, .. } => {
                for ty in *types {
                    self.type_references(ty);
                }
            }
        }
    }

    fn resolve_pending(&mut self) {
        for reference in std::mem::take(&mut self.pending) {
            let table = &self.table;
            let found = reference.candidates.iter().find_map(|candidate| {
                match reference.kind {
                    SymbolKind::Function => table.functions.get(&candidate.to_ascii_lowercase()),
                    SymbolKind::Constant => table.constants.get(candidate),
                    _ => table.classes.get(&candidate.to_ascii_lowercase()),
                }
                .copied()
            });
            if let Some(id) = found {
                self.table.add_usage(id, reference.node);
            }
            if let Some(call) = reference.call {
                let resolution = found.map_or(CallResolution::Unknown, CallResolution::Function);
                self.table.calls.insert(call, resolution);
            }
        }
    }

    /// Binds a variable occurrence in the current scope: the first occurrence
    /// declares, later ones are usages. `value` is recorded as a possible
    /// value when the occurrence is a write.
    fn variable(&mut self, expr: ExprId<'ast>, value: Option<AstNode<'ast>>) -> Option<SymbolId> {
        let Expr::Variable { name, .. } = expr else {
            return None;
        };
        if *name == "this" {
            return None;
        }
        let scope = if is_superglobal(name) { ScopeId::GLOBAL } else { self.current() };
        let node = AstNode::Expr(expr);
        let id = match self.table.scope(scope).variable(name) {
            Some(id) => {
                self.table.add_usage(id, node);
                id
            }
            None => {
                let alias = self.capture(scope, name);
                self.table.declare_variable(scope, name, SymbolKind::Variable, node, alias)
            }
        };
        if let Some(value) = value {
            self.table.symbols[id.index()].possible_values.push(value);
        }
        Some(id)
    }

    /// Arrow functions see the variables of their enclosing scope by value.
    /// Returns the enclosing symbol a new variable of `scope` aliases.
    fn capture(&mut self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let current = self.table.scope(scope);
        if current.kind != ScopeKind::ArrowFunction {
            return None;
        }
        let parent = current.parent?;
        let outer = match self.table.scope(parent).variable(name) {
            Some(id) => id,
            None => {
                let alias = self.capture(parent, name)?;
                self.table.declare_capture(parent, name, alias)
            }
        };
        self.table.scopes[scope.index()].captures.push(outer);
        Some(outer)
    }

    /// A write target: a variable, a destructuring list or any other
    /// assignable expression.
    fn assign_target(&mut self, target: ExprId<'ast>, value: Option<AstNode<'ast>>) {
        match target {
            Expr::Variable { .. } => {
                self.variable(target, value);
            }
            Expr::List { items, .. } | Expr::Array { items, .. } => {
                for item in *items {
                    if let Some(key) = item.key {
                        self.visit_expr(key);
                    }
                    self.assign_target(item.value, None);
                }
            }
            _ => self.visit_expr(target),
        }
    }

    fn params(&mut self, params: &'ast [Param<'ast>]) {
        let scope = self.current();
        for param in params {
            if let Some(ty) = param.ty {
                self.type_references(ty);
            }
            if let Some(default) = param.default {
                self.visit_expr(default);
            }
            let id = self
                .table
                .declare_variable(scope, param.name.value, SymbolKind::Parameter, AstNode::Param(param), None);
            self.table.symbols[id.index()].possible_values.push(AstNode::Param(param));
        }
    }

    fn function_like_body(&mut self, return_type: Option<&'ast Type<'ast>>, body: &'ast [StmtId<'ast>]) {
        if let Some(ty) = return_type {
            self.type_references(ty);
        }
        for stmt in body {
            self.visit_stmt(stmt);
        }
    }

    fn declare_named(&mut self, name: &Ident<'ast>, kind: SymbolKind, node: AstNode<'ast>) -> SymbolId {
        let qualified = self.qualify(name.value);
        let id = self.table.declare_member(ScopeId::GLOBAL, name.value, kind, node);
        self.table.symbols[id.index()].qualified_name = Some(qualified.clone());
        match kind {
            SymbolKind::Function => {
                self.table.functions.entry(qualified.to_ascii_lowercase()).or_insert(id);
            }
            SymbolKind::Class => {
                self.table.classes.entry(qualified.to_ascii_lowercase()).or_insert(id);
            }
            _ => {
                self.table.constants.entry(qualified).or_insert(id);
            }
        }
        id
    }

    fn class_like(&mut self, node: AstNode<'ast>, name: Option<&Ident<'ast>>, members: &'ast [ClassMember<'ast>]) {
        let symbol = name.map(|name| self.declare_named(name, SymbolKind::Class, node));
        let scope = self.enter(ScopeKind::Class, node);
        self.table.scopes[scope.index()].class = symbol;
        self.classes.push(scope);

        // Members first, so bodies can refer to members declared below them.
        for member in members {
            match member {
                ClassMember::Property { entries, .. } => {
                    for entry in *entries {
                        self.table
                            .declare_member(scope, entry.name.value, SymbolKind::Property, AstNode::PropertyEntry(entry));
                    }
                }
                ClassMember::Method { name, .. } => {
                    self.table.declare_member(scope, name.value, SymbolKind::Method, AstNode::ClassMember(member));
                }
                ClassMember::Const { consts, .. } => {
                    for constant in *consts {
                        self.table
                            .declare_member(scope, constant.name.value, SymbolKind::Constant, AstNode::ClassConst(constant));
                    }
                }
                ClassMember::Case { name, .. } => {
                    self.table.declare_member(scope, name.value, SymbolKind::Constant, AstNode::ClassMember(member));
                }
                ClassMember::TraitUse { .. } => {}
            }
        }

        for member in members {
            match member {
                ClassMember::Property { ty, entries, .. } => {
                    if let Some(ty) = ty {
                        self.type_references(ty);
                    }
                    for entry in *entries {
                        if let Some(default) = entry.default {
                            self.visit_expr(default);
                        }
                    }
                }
                ClassMember::Method { params, return_type, body, .. } => {
                    self.enter(ScopeKind::Method, AstNode::ClassMember(member));
                    self.params(params);
                    self.function_like_body(*return_type, body.unwrap_or(&[]));
                    self.leave();
                }
                ClassMember::Const { consts, .. } => {
                    for constant in *consts {
                        self.visit_expr(constant.value);
                    }
                }
                ClassMember::Case { value, .. } => {
                    if let Some(value) = value {
                        self.visit_expr(value);
                    }
                }
                ClassMember::TraitUse { traits, .. } => {
                    for name in *traits {
                        self.class_reference(AstNode::Name(name), name);
                    }
                }
            }
        }

        self.classes.pop();
        self.leave();
    }

    fn enclosing_class(&self) -> Option<ScopeId> {
        self.classes.last().copied()
    }

    /// Usage of a member of the enclosing class through `self::`, `static::`
    /// or `$this->`.
    fn own_member(&mut self, kind: SymbolKind, member: ExprId<'ast>, node: AstNode<'ast>) -> Option<SymbolId> {
        let class = self.enclosing_class()?;
        let name = match member {
            Expr::Identifier { name, .. } => *name,
            Expr::Variable { name, .. } if kind == SymbolKind::Property => *name,
            _ => return None,
        };
        let id = self.table.scope(class).member(kind, name)?;
        self.table.add_usage(id, node);
        Some(id)
    }

    fn is_own_class(&self, class: ExprId<'ast>) -> bool {
        match class {
            Expr::Name { name, .. } => {
                name.is_unqualified()
                    && (name.last().eq_ignore_ascii_case("self") || name.last().eq_ignore_ascii_case("static"))
            }
            _ => false,
        }
    }

    fn args(&mut self, args: &'ast [Arg<'ast>]) {
        for arg in args {
            self.visit_arg(arg);
        }
    }

    fn anonymous_class(&mut self, expr: ExprId<'ast>) {
        let Expr::AnonymousClass { args, extends, implements, members, .. } = expr else {
            return;
        };
        self.args(args);
        if let Some(extends) = extends {
            self.class_reference(AstNode::Name(extends), extends);
        }
        for name in *implements {
            self.class_reference(AstNode::Name(name), name);
        }
        self.class_like(AstNode::Expr(expr), None, members);
    }

    fn closure(&mut self, expr: ExprId<'ast>) {
        let Expr::Closure { params, uses, return_type, body, .. } = expr else {
            return;
        };
        let enclosing = self.current();
        let mut outer = Vec::with_capacity(uses.len());
        for usage in *uses {
            let Expr::Variable { name, .. } = usage.var else {
                continue;
            };
            let node = AstNode::Expr(usage.var);
            let id = match self.table.scope(enclosing).variable(name) {
                Some(id) => {
                    self.table.symbols[id.index()].usages.push(node);
                    id
                }
                None => {
                    let alias = self.capture(enclosing, name);
                    let id = self.table.add_symbol(enclosing, name, SymbolKind::Variable, node, alias);
                    self.table.scopes[enclosing.index()].variables.insert(name.to_string(), id);
                    id
                }
            };
            outer.push((usage, *name, id));
        }

        let scope = self.enter(ScopeKind::Closure, AstNode::Expr(expr));
        self.params(params);
        for (usage, name, id) in outer {
            self.table.scopes[scope.index()].captures.push(id);
            self.table
                .declare_variable(scope, name, SymbolKind::Variable, AstNode::Expr(usage.var), Some(id));
        }
        self.function_like_body(*return_type, body);
        self.leave();
    }
}

impl<'ast> Visitor<'ast> for SymbolTableBuilder<'ast> {
    fn visit_stmt(&mut self, stmt: StmtId<'ast>) {
        let node = AstNode::Stmt(stmt);
        match stmt {
            Stmt::Namespace { name, body, .. } => {
                self.namespace = name.map(|n| n.joined()).unwrap_or_default();
                self.imports = Imports::default();
                if let Some(body) = body {
                    for stmt in *body {
                        self.visit_stmt(stmt);
                    }
                    self.namespace.clear();
                    self.imports = Imports::default();
                }
            }
            Stmt::Use { prefix, uses, kind, .. } => {
                for item in *uses {
                    let kind = if *kind == UseKind::Normal { item.kind } else { *kind };
                    let full = item.full_name(prefix.as_ref());
                    let local = item.local_name();
                    match kind {
                        UseKind::Normal => self.imports.classes.insert(local.to_ascii_lowercase(), full),
                        UseKind::Function => self.imports.functions.insert(local.to_ascii_lowercase(), full),
                        UseKind::Const => self.imports.constants.insert(local.to_string(), full),
                    };
                }
            }
            Stmt::Function { name, params, return_type, body, .. } => {
                self.declare_named(name, SymbolKind::Function, node);
                self.enter(ScopeKind::Function, node);
                self.params(params);
                self.function_like_body(*return_type, body);
                self.leave();
            }
            Stmt::Class { name, extends, implements, members, .. } => {
                if let Some(extends) = extends {
                    self.class_reference(AstNode::Name(extends), extends);
                }
                for name in *implements {
                    self.class_reference(AstNode::Name(name), name);
                }
                self.class_like(node, Some(name), members);
            }
            Stmt::Interface { name, extends, members, .. } => {
                for name in *extends {
                    self.class_reference(AstNode::Name(name), name);
                }
                self.class_like(node, Some(name), members);
            }
            Stmt::Trait { name, members, .. } => self.class_like(node, Some(name), members),
            Stmt::Enum { name, implements, members, .. } => {
                for name in *implements {
                    self.class_reference(AstNode::Name(name), name);
                }
                self.class_like(node, Some(name), members);
            }
            Stmt::Const { consts, .. } => {
                for constant in *consts {
                    self.visit_expr(constant.value);
                    let qualified = self.qualify(constant.name.value);
                    let id = self.table.declare_member(
                        ScopeId::GLOBAL,
                        constant.name.value,
                        SymbolKind::Constant,
                        AstNode::ClassConst(constant),
                    );
                    self.table.symbols[id.index()].qualified_name = Some(qualified.clone());
                    self.table.constants.entry(qualified).or_insert(id);
                }
            }
            Stmt::Global { vars, .. } => {
                let scope = self.current();
                for &var in *vars {
                    let Expr::Variable { name, .. } = var else {
                        self.visit_expr(var);
                        continue;
                    };
                    if scope == ScopeId::GLOBAL || is_superglobal(name) {
                        self.variable(var, None);
                        continue;
                    }
                    let global = match self.table.global_scope().variable(name) {
                        Some(id) => id,
                        None => {
                            let id = self.table.add_symbol(
                                ScopeId::GLOBAL,
                                name,
                                SymbolKind::Variable,
                                AstNode::Expr(var),
                                None,
                            );
                            self.table.scopes[0].variables.insert(name.to_string(), id);
                            id
                        }
                    };
                    match self.table.scope(scope).variable(name) {
                        Some(local) => {
                            self.table.add_usage(local, AstNode::Expr(var));
                            self.table.symbols[local.index()].alias.get_or_insert(global);
                        }
                        None => {
                            self.table
                                .declare_variable(scope, name, SymbolKind::Variable, AstNode::Expr(var), Some(global));
                        }
                    }
                }
            }
            Stmt::Static { vars, .. } => {
                for var in *vars {
                    if let Some(default) = var.default {
                        self.visit_expr(default);
                    }
                    self.variable(var.var, var.default.map(AstNode::Expr));
                }
            }
            Stmt::Foreach { expr, key_var, value_var, body, .. } => {
                self.visit_expr(expr);
                if let Some(key) = *key_var {
                    self.assign_target(key, Some(AstNode::Expr(key)));
                }
                let value_var = *value_var;
                match value_var {
                    Expr::Variable { .. } => {
                        self.variable(value_var, Some(AstNode::Expr(value_var)));
                    }
                    _ => self.assign_target(value_var, None),
                }
                for stmt in *body {
                    self.visit_stmt(stmt);
                }
            }
            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_catch(&mut self, catch: &'ast Catch<'ast>) {
        for name in catch.types {
            self.class_reference(AstNode::Name(name), name);
        }
        if let Some(var) = catch.var {
            self.variable(var, Some(AstNode::Catch(catch)));
        }
        for stmt in catch.body {
            self.visit_stmt(stmt);
        }
    }

    fn visit_expr(&mut self, expr: ExprId<'ast>) {
        let node = AstNode::Expr(expr);
        match *expr {
            Expr::Variable { .. } => {
                self.variable(expr, None);
            }
            // The target is bound first so the leftmost occurrence declares.
            Expr::Assign { var, expr: value, .. } | Expr::AssignRef { var, expr: value, .. } => {
                self.assign_target(var, Some(AstNode::Expr(value)));
                self.visit_expr(value);
            }
            Expr::AssignOp { var, expr: value, .. } => {
                self.visit_expr(var);
                self.visit_expr(value);
                if let Some(id) = self.table.symbol_id_for(AstNode::Expr(var)) {
                    self.table.symbols[id.index()].possible_values.push(node);
                }
            }
            Expr::Closure { .. } => self.closure(expr),
            Expr::ArrowFunction { params, return_type, expr: body, .. } => {
                self.enter(ScopeKind::ArrowFunction, node);
                self.params(params);
                if let Some(ty) = return_type {
                    self.type_references(ty);
                }
                self.visit_expr(body);
                self.leave();
            }
            Expr::AnonymousClass { .. } => self.anonymous_class(expr),
            Expr::Call { func, args, .. } => {
                match func {
                    Expr::Name { name, .. } => {
                        let candidates = self.function_candidates(name);
                        self.reference(AstNode::Expr(func), SymbolKind::Function, candidates, Some(node.id()));
                    }
                    _ => {
                        self.visit_expr(func);
                        self.table.calls.insert(node.id(), CallResolution::Unresolvable);
                    }
                }
                self.args(args);
            }
            Expr::MethodCall { target, method, args, .. } => {
                let resolution = match target {
                    Expr::Variable { name, .. } if *name == "this" => self
                        .own_member(SymbolKind::Method, method, AstNode::Expr(method))
                        .map_or(CallResolution::Unknown, CallResolution::Method),
                    _ => CallResolution::Unresolvable,
                };
                self.table.calls.insert(node.id(), resolution);
                self.visit_expr(target);
                if !matches!(method, Expr::Identifier { .. }) {
                    self.visit_expr(method);
                }
                self.args(args);
            }
            Expr::StaticCall { class, method, args, .. } => {
                let resolution = if self.is_own_class(class) {
                    self.own_member(SymbolKind::Method, method, AstNode::Expr(method))
                        .map_or(CallResolution::Unknown, CallResolution::Method)
                } else {
                    CallResolution::Unresolvable
                };
                self.table.calls.insert(node.id(), resolution);
                self.class_expr(class);
                if !matches!(method, Expr::Identifier { .. } | Expr::Variable { .. }) {
                    self.visit_expr(method);
                }
                self.args(args);
            }
            Expr::PropertyFetch { target, property, .. } => {
                if let Expr::Variable { name, .. } = target
                    && *name == "this"
                {
                    self.own_member(SymbolKind::Property, property, AstNode::Expr(property));
                }
                self.visit_expr(target);
                if !matches!(property, Expr::Identifier { .. }) {
                    self.visit_expr(property);
                }
            }
            Expr::StaticPropertyFetch { class, property, .. } => {
                if self.is_own_class(class) {
                    self.own_member(SymbolKind::Property, property, AstNode::Expr(property));
                }
                self.class_expr(class);
                // `Foo::$bar` names a property, not a variable of the scope.
                if !matches!(property, Expr::Variable { .. }) {
                    self.visit_expr(property);
                }
            }
            Expr::ClassConstFetch { class, constant, .. } => {
                if self.is_own_class(class) {
                    self.own_member(SymbolKind::Constant, constant, AstNode::Expr(constant));
                }
                self.class_expr(class);
            }
            Expr::New { class, args, .. } => {
                if !matches!(class, Expr::Name { .. } | Expr::AnonymousClass { .. }) {
                    self.table.calls.insert(node.id(), CallResolution::Unresolvable);
                }
                self.class_expr(class);
                self.args(args);
            }
            Expr::InstanceOf { expr: value, class, .. } => {
                self.visit_expr(value);
                self.class_expr(class);
            }
            Expr::Name { ref name, .. } => {
                let candidates = self.constant_candidates(name);
                self.reference(node, SymbolKind::Constant, candidates, None);
            }
            _ => walk_expr(self, expr),
        }
    }
}
